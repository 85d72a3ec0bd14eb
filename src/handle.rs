//! Stable element identity.
//!
//! Every element of a store owns one [`HandleCell`] for its whole lifetime.
//! The cell records a *virtual position*: the element's logical index plus a
//! per-collection base that moves when elements are added or removed at the
//! front. Shifting a block of elements renumbers exactly the cells that moved,
//! so a [`Handle`] keeps resolving to the same element and keeps comparing in
//! collection order no matter what happens elsewhere in the collection.
//!
//! ```text
//!   base = -2
//!   virtual:   -2   -1    0    1    2
//!   logical:    0    1    2    3    4
//!   handle ──────────────────┘  (position 0, index 2)
//! ```
//!
//! A removed element's cell is marked absent and never reused.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64};

use crate::error::{CollectionError, Result};
use crate::lock::{CollectionLock, Validation};

use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

static NEXT_COLLECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a collection or view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(u64);

impl CollectionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_COLLECTION_ID.fetch_add(1, Relaxed))
    }

    /// Raw numeric identity.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Numbering context shared by all cells of one store.
#[derive(Debug)]
pub(crate) struct HandleSpace {
    id: CollectionId,
    lock: Arc<CollectionLock>,
    retries: u32,
    base: AtomicI64,
}

impl HandleSpace {
    pub(crate) fn new(id: CollectionId, lock: Arc<CollectionLock>, retries: u32) -> Self {
        Self {
            id,
            lock,
            retries,
            base: AtomicI64::new(0),
        }
    }

    #[inline]
    pub(crate) const fn id(&self) -> CollectionId {
        self.id
    }

    #[inline]
    pub(crate) fn base(&self) -> i64 {
        self.base.load(Acquire)
    }

    #[inline]
    pub(crate) fn shift_base(&self, delta: i64) {
        self.base.fetch_add(delta, Release);
    }

    #[inline]
    pub(crate) fn reset_base(&self) {
        self.base.store(0, Release);
    }

    /// Runs `read` as a structurally validated optimistic read, falling back
    /// to the store's read guard once the retry budget is spent.
    fn read<R>(&self, read: impl FnMut() -> R) -> R {
        self.lock.optimistic(self.retries, Validation::Structural, read)
    }
}

/// The mutable position cell of one element.
#[derive(Debug)]
pub(crate) struct HandleCell {
    space: Arc<HandleSpace>,
    position: AtomicI64,
    present: AtomicBool,
}

impl HandleCell {
    pub(crate) fn new(space: Arc<HandleSpace>, position: i64) -> Arc<Self> {
        Arc::new(Self {
            space,
            position: AtomicI64::new(position),
            present: AtomicBool::new(true),
        })
    }

    #[inline]
    pub(crate) fn position(&self) -> i64 {
        self.position.load(Acquire)
    }

    #[inline]
    pub(crate) fn set_position(&self, position: i64) {
        self.position.store(position, Release);
    }

    #[inline]
    pub(crate) fn renumber(&self, delta: i64) {
        self.position.fetch_add(delta, Release);
    }

    #[inline]
    pub(crate) fn is_present(&self) -> bool {
        self.present.load(Acquire)
    }

    #[inline]
    pub(crate) fn invalidate(&self) {
        self.present.store(false, Release);
    }

    #[inline]
    pub(crate) fn space_id(&self) -> CollectionId {
        self.space.id
    }

    /// Logical index relative to the current base. Only meaningful inside a
    /// validated read or under the write guard.
    #[inline]
    pub(crate) fn logical_index(&self) -> Option<usize> {
        if !self.is_present() {
            return None;
        }
        usize::try_from(self.position() - self.space.base()).ok()
    }
}

/// Stable, order-comparable reference to an element.
///
/// A handle is created when its element is inserted and stays valid until
/// that element is removed, regardless of insertions, removals, growth or
/// compaction elsewhere in the collection. Handles are cheap to clone.
///
/// Comparing handles minted by different collections is a programming error:
/// [`Handle::compare`] reports it as an error and [`Handle::order`] panics.
///
/// # Examples
///
/// ```rust
/// use stable_order::prelude::*;
///
/// let store = OrderedStore::new();
/// let b = store.push_back("b");
/// let a = store.push_front("a");
/// store.push_back("c");
///
/// assert!(a < b);
/// assert_eq!(store.index_of(&b).unwrap(), 1);
/// assert!(b.flipped() < a.flipped());
/// ```
#[derive(Clone)]
pub struct Handle {
    cell: Arc<HandleCell>,
    flipped: bool,
}

impl Handle {
    pub(crate) const fn from_cell(cell: Arc<HandleCell>) -> Self {
        Self {
            cell,
            flipped: false,
        }
    }

    #[inline]
    pub(crate) const fn cell(&self) -> &Arc<HandleCell> {
        &self.cell
    }

    /// The collection that minted this handle.
    #[inline]
    #[must_use]
    pub fn collection(&self) -> CollectionId {
        self.cell.space_id()
    }

    /// Returns `true` while the element is in its collection.
    #[inline]
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.cell.is_present()
    }

    /// Returns `true` for handles seen through an odd number of reversals.
    #[inline]
    #[must_use]
    pub const fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// The same element with inverted ordering. Constant time; nothing is
    /// copied.
    #[must_use]
    pub fn flipped(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            flipped: !self.flipped,
        }
    }

    /// Current index in the collection that minted the handle, or `None`
    /// once the element is removed.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        self.cell.space.read(|| self.cell.logical_index())
    }

    /// Returns `true` if both handles refer to the same element, regardless
    /// of orientation.
    #[inline]
    #[must_use]
    pub fn same_element(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Compares two handles by the current positions of their elements.
    ///
    /// # Errors
    ///
    /// - `IllegalArgument(WrongCollection)` if the handles come from different
    ///   collections or have different orientations.
    /// - `StaleHandle` if either element has been removed.
    pub fn compare(&self, other: &Self) -> Result<Ordering> {
        if self.collection() != other.collection() || self.flipped != other.flipped {
            return Err(crate::error::Veto::WrongCollection.into());
        }
        if self.same_element(other) {
            return Ok(Ordering::Equal);
        }
        let positions = self.cell.space.read(|| {
            (self.cell.is_present() && other.cell.is_present())
                .then(|| (self.cell.position(), other.cell.position()))
        });
        let (mine, theirs) = positions.ok_or(CollectionError::StaleHandle)?;
        let ordering = mine.cmp(&theirs);
        Ok(if self.flipped { ordering.reverse() } else { ordering })
    }

    /// Like [`compare`](Self::compare), for callers that have already
    /// established both handles are live and from the same collection.
    ///
    /// # Panics
    ///
    /// Panics if the handles come from different collections or either
    /// element has been removed.
    #[must_use]
    pub fn order(&self, other: &Self) -> Ordering {
        match self.compare(other) {
            Ok(ordering) => ordering,
            Err(error) => panic!("handles are not comparable: {error}"),
        }
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.same_element(other) && self.flipped == other.flipped
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Arc::as_ptr(&self.cell), state);
        self.flipped.hash(state);
    }
}

impl PartialOrd for Handle {
    /// `None` for handles from different collections or with a removed element.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Handle")
            .field("collection", &self.collection())
            .field("index", &self.index())
            .field("flipped", &self.flipped)
            .finish()
    }
}

/// Translation of handles between a derived collection and its sources.
///
/// A view's handles stand in for elements of the collection it was built on.
/// Layers that hand handles across collections use this to find the
/// counterpart of a handle in a named source (or of a source handle in this
/// collection), with `None` meaning "no equivalent".
pub trait HandleExchange {
    /// Identity of this collection or view.
    fn exchange_id(&self) -> CollectionId;

    /// Counterpart of `handle` (one of ours) in the collection `source`.
    fn source_handle(&self, handle: &Handle, source: CollectionId) -> Option<Handle>;

    /// Counterpart of `source_handle` (one of `source`'s) in this collection.
    fn local_handle(&self, source_handle: &Handle, source: CollectionId) -> Option<Handle>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn space() -> Arc<HandleSpace> {
        Arc::new(HandleSpace::new(
            CollectionId::next(),
            Arc::new(CollectionLock::new()),
            4,
        ))
    }

    #[rstest]
    fn test_collection_ids_are_unique() {
        assert_ne!(CollectionId::next(), CollectionId::next());
    }

    #[rstest]
    fn test_index_follows_base() {
        let space = space();
        let handle = Handle::from_cell(HandleCell::new(Arc::clone(&space), 3));
        assert_eq!(handle.index(), Some(3));
        space.shift_base(-2);
        assert_eq!(handle.index(), Some(5));
    }

    #[rstest]
    fn test_invalidated_cell_has_no_index() {
        let handle = Handle::from_cell(HandleCell::new(space(), 0));
        handle.cell().invalidate();
        assert!(!handle.is_present());
        assert_eq!(handle.index(), None);
    }

    #[rstest]
    fn test_compare_orders_by_position() {
        let space = space();
        let first = Handle::from_cell(HandleCell::new(Arc::clone(&space), 0));
        let second = Handle::from_cell(HandleCell::new(Arc::clone(&space), 1));
        assert_eq!(first.compare(&second), Ok(Ordering::Less));
        assert_eq!(
            first.flipped().compare(&second.flipped()),
            Ok(Ordering::Greater)
        );
        second.cell().renumber(-5);
        assert_eq!(first.order(&second), Ordering::Greater);
    }

    #[rstest]
    fn test_compare_rejects_other_collection() {
        let first = Handle::from_cell(HandleCell::new(space(), 0));
        let second = Handle::from_cell(HandleCell::new(space(), 1));
        assert!(first.compare(&second).is_err());
        assert_eq!(first.partial_cmp(&second), None);
    }

    #[rstest]
    fn test_compare_rejects_mixed_orientation() {
        let handle = Handle::from_cell(HandleCell::new(space(), 0));
        assert!(handle.compare(&handle.flipped()).is_err());
        assert_ne!(handle, handle.flipped());
        assert!(handle.same_element(&handle.flipped()));
    }

    #[rstest]
    fn test_compare_stale_handle() {
        let space = space();
        let first = Handle::from_cell(HandleCell::new(Arc::clone(&space), 0));
        let second = Handle::from_cell(HandleCell::new(space, 1));
        second.cell().invalidate();
        assert_eq!(first.compare(&second), Err(CollectionError::StaleHandle));
        assert_eq!(second.compare(&second), Ok(Ordering::Equal));
    }

    #[rstest]
    #[should_panic(expected = "handles are not comparable")]
    fn test_order_panics_across_collections() {
        let first = Handle::from_cell(HandleCell::new(space(), 0));
        let second = Handle::from_cell(HandleCell::new(space(), 0));
        let _ = first.order(&second);
    }
}
