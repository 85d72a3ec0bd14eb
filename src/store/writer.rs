//! Mutation under a held write guard.

use std::sync::Arc;
use std::sync::atomic::Ordering::Release;

use smallvec::SmallVec;

use super::{OrderedStore, locate_in};
use crate::error::{CollectionError, Result, Veto};
use crate::frame::{Frame, Slot};
use crate::handle::Handle;
use crate::lock::WriteGuard;

/// Exclusive access to an [`OrderedStore`].
///
/// Holds the write guard for its whole lifetime, so a `can_*` check followed
/// by the matching mutation cannot race with another writer. Optimistic
/// readers on other threads keep running and retry if they overlap with it.
///
/// # Examples
///
/// ```rust
/// use stable_order::prelude::*;
///
/// let store: OrderedStore<i32> = (1..=3).collect();
/// let handle = store.handle_at(0).unwrap();
/// let mut writer = store.write(false);
/// if writer.can_remove(&handle).is_ok() {
///     writer.remove_handle(&handle).unwrap();
/// }
/// drop(writer);
/// assert_eq!(store.to_vec(), vec![2, 3]);
/// ```
pub struct StoreWriter<'a, T> {
    pub(super) store: &'a OrderedStore<T>,
    guard: WriteGuard<'a>,
    pub(super) buffer: Arc<super::Buffer<T>>,
}

impl<'a, T> StoreWriter<'a, T> {
    pub(super) fn new(store: &'a OrderedStore<T>, guard: WriteGuard<'a>) -> Self {
        Self {
            store,
            guard,
            buffer: store.buffer.load_full(),
        }
    }

    /// The store being written.
    #[inline]
    pub const fn store(&self) -> &'a OrderedStore<T> {
        self.store
    }

    /// Returns `true` once this writer has announced a structural change.
    #[inline]
    pub const fn is_structural(&self) -> bool {
        self.guard.is_structural()
    }

    /// Checks whether `handle` could be removed.
    ///
    /// # Errors
    ///
    /// The veto that [`remove_handle`](Self::remove_handle) would fail with.
    pub fn can_remove(&self, handle: &Handle) -> std::result::Result<(), Veto> {
        self.locate(handle).map(|_| ())
    }

    /// Checks whether `handle` could be moved between `after` and `before`.
    ///
    /// # Errors
    ///
    /// The veto that [`move_between`](Self::move_between) would fail with.
    pub fn can_move(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> std::result::Result<(), Veto> {
        check_move(self, handle, after, before).map(|_| ())
    }

    /// Moves the element behind `handle` so that it lies after `after` and
    /// before `before`.
    ///
    /// An element already strictly between the two stays where it is.
    /// Otherwise it is placed immediately after `after`, or immediately
    /// before `before` when only that hint is given. The handle keeps
    /// identifying the element.
    ///
    /// # Errors
    ///
    /// `IllegalArgument` for foreign handles, inverted hints, or hints that
    /// name the moved element itself. `StaleHandle` for removed elements.
    pub fn move_between(
        &mut self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> Result<()> {
        let Some((from, target)) = check_move(self, handle, after, before)? else {
            return Ok(());
        };
        self.guard.escalate();
        if let Some(slot) = self.detach(from) {
            self.attach(target, slot);
        }
        Ok(())
    }

    /// Removes every element. All handles turn absent.
    pub fn clear(&mut self) {
        self.guard.escalate();
        let len = self.count();
        for logical in 0..len {
            if let Some(slot) = self.buffer[self.physical(logical)].swap(None) {
                slot.cell().invalidate();
            }
        }
        self.store.len.store(0, Release);
        self.store.space.reset_base();
        if self.capacity() > self.store.config.min_capacity() {
            self.reallocate(self.store.config.min_capacity());
        } else {
            self.store.offset.store(0, Release);
        }
        tracing::debug!(removed = len, "cleared ordered store");
    }

    /// Takes the element at `index` out of the sequence without invalidating
    /// its handle. It must be re-attached or invalidated before the guard is
    /// released.
    pub(crate) fn detach(&mut self, index: usize) -> Option<Arc<Slot<T>>> {
        if index >= self.count() {
            return None;
        }
        self.guard.escalate();
        self.close_gap(index, 1).pop()
    }

    /// Puts a detached element back at `index`, renumbering its handle.
    pub(crate) fn attach(&mut self, index: usize, slot: Arc<Slot<T>>) {
        self.guard.escalate();
        self.reserve(1);
        self.open_gap(index, 1);
        self.fill(index, slot);
    }

    /// Removes `count` elements at `index`, invalidating their handles.
    fn evict(&mut self, index: usize, count: usize) {
        if count == 0 {
            return;
        }
        for slot in self.close_gap(index, count) {
            slot.cell().invalidate();
        }
        tracing::trace!(index, count, "evicted elements from bounded store");
    }

    /// Makes room for one element at `index` and returns where it goes.
    fn admit_one(&mut self, index: usize) -> usize {
        self.guard.escalate();
        let len = self.count();
        if len < self.store.config.max_capacity() {
            self.reserve(1);
            return index;
        }
        if 2 * index >= len {
            self.evict(0, 1);
            index - 1
        } else {
            self.evict(len - 1, 1);
            index
        }
    }

    fn insert_unchecked(&mut self, index: usize, value: T) -> Handle {
        let index = self.admit_one(index);
        self.open_gap(index, 1);
        Handle::from_cell(self.place(index, value))
    }

    /// Appends `value`; evicts the front element first if the store is full.
    pub fn push_back(&mut self, value: T) -> Handle {
        let len = self.count();
        self.insert_unchecked(len, value)
    }

    /// Prepends `value`; evicts the back element first if the store is full.
    pub fn push_front(&mut self, value: T) -> Handle {
        self.insert_unchecked(0, value)
    }

    /// Inserts `value` at `index`.
    ///
    /// In a full fixed-capacity store one element is evicted from the end
    /// opposite `index` first.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index > len`.
    pub fn insert(&mut self, index: usize, value: T) -> Result<Handle> {
        let len = self.count();
        if index > len {
            return Err(CollectionError::IndexOutOfBounds { index, len });
        }
        Ok(self.insert_unchecked(index, value))
    }

    /// Inserts `values` at `index`, in order, and returns their handles.
    ///
    /// When the result would exceed the maximum capacity, the overflow is
    /// removed from the end opposite the insertion point: the front when
    /// `2 * index >= len`, the back otherwise. Existing elements on that side
    /// go first; if they run out, the new values nearest that end are dropped
    /// and get no handle.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index > len`.
    pub fn insert_all(
        &mut self,
        index: usize,
        values: impl IntoIterator<Item = T>,
    ) -> Result<Vec<Handle>> {
        let len = self.count();
        if index > len {
            return Err(CollectionError::IndexOutOfBounds { index, len });
        }
        let mut values: Vec<T> = values.into_iter().collect();
        if values.is_empty() {
            return Ok(Vec::new());
        }
        self.guard.escalate();
        let mut index = index;
        let overflow = (len + values.len()).saturating_sub(self.store.config.max_capacity());
        if overflow > 0 {
            if 2 * index >= len {
                let existing = overflow.min(index);
                self.evict(0, existing);
                index -= existing;
                let dropped = (overflow - existing).min(values.len());
                values.drain(..dropped);
            } else {
                let existing = overflow.min(len - index);
                self.evict(len - existing, existing);
                let dropped = (overflow - existing).min(values.len());
                values.truncate(values.len() - dropped);
            }
        }
        self.reserve(values.len());
        self.open_gap(index, values.len());
        Ok(values
            .into_iter()
            .enumerate()
            .map(|(step, value)| Handle::from_cell(self.place(index + step, value)))
            .collect())
    }

    pub(crate) fn locate(&self, handle: &Handle) -> std::result::Result<usize, Veto> {
        locate_in(
            &self.store.space,
            self.store.space.base(),
            self.count(),
            handle,
        )
    }
}

impl<T: Clone> StoreWriter<'_, T> {
    fn remove_at(&mut self, index: usize) -> Option<T> {
        let slot = self.detach(index)?;
        slot.cell().invalidate();
        self.maybe_shrink();
        Some(Slot::into_value(slot))
    }

    /// Removes and returns the first value.
    pub fn pop_front(&mut self) -> Option<T> {
        self.remove_at(0)
    }

    /// Removes and returns the last value.
    pub fn pop_back(&mut self) -> Option<T> {
        let last = self.count().checked_sub(1)?;
        self.remove_at(last)
    }

    /// Removes the value at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len`.
    pub fn remove(&mut self, index: usize) -> Result<T> {
        let len = self.count();
        self.remove_at(index)
            .ok_or(CollectionError::IndexOutOfBounds { index, len })
    }

    /// Removes the element behind `handle`.
    ///
    /// # Errors
    ///
    /// `StaleHandle` for removed elements, `IllegalArgument` for handles of
    /// another collection.
    pub fn remove_handle(&mut self, handle: &Handle) -> Result<T> {
        let index = self.locate(handle)?;
        self.remove(index)
    }

    /// Replaces the value at `index` in place and returns the old one.
    ///
    /// Only the value stamp moves, so readers that depend on positions alone
    /// keep their snapshots.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len`.
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        let old = self.slot_at(index).ok_or(CollectionError::IndexOutOfBounds {
            index,
            len: self.count(),
        })?;
        let physical = self.physical(index);
        self.buffer[physical].store(Some(Arc::new(old.with_value(value))));
        Ok(Slot::into_value(old))
    }

    /// Replaces the value behind `handle` in place and returns the old one.
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `IllegalArgument` for unusable handles.
    pub fn set_handle(&mut self, handle: &Handle, value: T) -> Result<T> {
        let index = self.locate(handle)?;
        self.set(index, value)
    }
}

impl<T> Frame<T> for StoreWriter<'_, T> {
    fn len(&self) -> usize {
        self.count()
    }

    fn slot(&self, index: usize) -> Option<Arc<Slot<T>>> {
        self.slot_at(index)
    }

    fn locate(&self, handle: &Handle) -> std::result::Result<usize, Veto> {
        StoreWriter::locate(self, handle)
    }
}

/// Resolves a move request to `(from, target)`, where `target` is the
/// insertion index once the element has been taken out. `None` means the
/// element is already in place.
pub(crate) fn check_move<T>(
    frame: &(impl Frame<T> + ?Sized),
    handle: &Handle,
    after: Option<&Handle>,
    before: Option<&Handle>,
) -> std::result::Result<Option<(usize, usize)>, Veto> {
    let from = frame.locate(handle)?;
    let hints: SmallVec<[Option<usize>; 2]> = [after, before]
        .into_iter()
        .map(|hint| hint.map(|hint| frame.locate(hint)).transpose())
        .collect::<std::result::Result<_, _>>()?;
    let (lower, upper) = (hints[0], hints[1]);
    if lower == Some(from) || upper == Some(from) {
        return Err(Veto::InvalidHint("an element cannot be placed relative to itself"));
    }
    if let (Some(lower), Some(upper)) = (lower, upper)
        && lower >= upper
    {
        return Err(Veto::InvalidHint("`after` must precede `before`"));
    }
    let in_place = lower.is_none_or(|lower| lower < from) && upper.is_none_or(|upper| from < upper);
    if in_place {
        return Ok(None);
    }
    let shifted = |index: usize| if index > from { index - 1 } else { index };
    let target = match (lower, upper) {
        (Some(lower), _) => shifted(lower) + 1,
        (None, Some(upper)) => shifted(upper),
        (None, None) => from,
    };
    Ok(Some((from, target)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::frame::OrderedAccess;
    use rstest::rstest;

    fn fixed(capacity: usize, values: impl IntoIterator<Item = i32>) -> OrderedStore<i32> {
        let store = OrderedStore::with_config(StoreConfig::fixed(capacity).unwrap()).unwrap();
        for value in values {
            store.push_back(value);
        }
        store
    }

    #[rstest]
    #[case::back_half(4, vec![10, 11], vec![3, 4, 10, 11, 5, 6, 7])]
    #[case::front_half(1, vec![10, 11], vec![1, 10, 11, 2, 3, 4, 5])]
    #[case::at_end(7, vec![10, 11], vec![3, 4, 5, 6, 7, 10, 11])]
    #[case::at_front(0, vec![10, 11], vec![10, 11, 1, 2, 3, 4, 5])]
    fn test_insert_all_evicts_opposite_end(
        #[case] index: usize,
        #[case] values: Vec<i32>,
        #[case] expected: Vec<i32>,
    ) {
        let store = fixed(7, 1..=7);
        let handles = store.insert_all(index, values.clone()).unwrap();
        assert_eq!(handles.len(), values.len());
        assert_eq!(store.to_vec(), expected);
    }

    #[rstest]
    fn test_insert_all_drops_new_values_when_overflow_exceeds_side() {
        let store = fixed(4, 1..=4);
        let handles = store.insert_all(3, 10..16).unwrap();
        assert_eq!(store.to_vec(), vec![13, 14, 15, 4]);
        assert_eq!(handles.len(), 3);
        assert_eq!(store.index_of(&handles[0]).unwrap(), 0);
    }

    #[rstest]
    fn test_insert_all_into_growable_store() {
        let store: OrderedStore<i32> = (0..4).collect();
        store.insert_all(2, 100..140).unwrap();
        assert_eq!(store.len(), 44);
        assert_eq!(store.get(2).unwrap(), 100);
        assert_eq!(store.get(42).unwrap(), 2);
    }

    #[rstest]
    #[case::forward_after(0, Some(3), None, vec![1, 2, 3, 0, 4])]
    #[case::backward_before(4, None, Some(1), vec![0, 4, 1, 2, 3])]
    #[case::between(0, Some(2), Some(3), vec![1, 2, 0, 3, 4])]
    #[case::already_between(2, Some(0), Some(4), vec![0, 1, 2, 3, 4])]
    fn test_move_between(
        #[case] from: usize,
        #[case] after: Option<usize>,
        #[case] before: Option<usize>,
        #[case] expected: Vec<i32>,
    ) {
        let store: OrderedStore<i32> = (0..5).collect();
        let handle = store.handle_at(from).unwrap();
        let after = after.map(|index| store.handle_at(index).unwrap());
        let before = before.map(|index| store.handle_at(index).unwrap());
        store
            .move_between(&handle, after.as_ref(), before.as_ref())
            .unwrap();
        assert_eq!(store.to_vec(), expected);
        assert_eq!(store.value_of(&handle).unwrap(), i32::try_from(from).unwrap());
    }

    #[rstest]
    fn test_move_between_rejects_bad_hints() {
        let store: OrderedStore<i32> = (0..5).collect();
        let handle = store.handle_at(2).unwrap();
        let first = store.handle_at(0).unwrap();
        let last = store.handle_at(4).unwrap();
        assert!(matches!(
            store.can_move(&handle, Some(&last), Some(&first)),
            Err(Veto::InvalidHint(_))
        ));
        assert!(matches!(
            store.can_move(&handle, Some(&handle), None),
            Err(Veto::InvalidHint(_))
        ));
        let error = store
            .move_between(&handle, Some(&last), Some(&first))
            .unwrap_err();
        assert!(matches!(error, CollectionError::IllegalArgument(_)));
        assert_eq!(store.to_vec(), vec![0, 1, 2, 3, 4]);
    }

    #[rstest]
    fn test_value_only_writer_keeps_structural_stamp() {
        let store: OrderedStore<i32> = (0..3).collect();
        let before = store.lock().stamps().structural();
        {
            let mut writer = store.write(false);
            writer.set(0, 9).unwrap();
            assert!(!writer.is_structural());
        }
        assert_eq!(store.lock().stamps().structural(), before);
        {
            let mut writer = store.write(false);
            writer.push_back(4);
            assert!(writer.is_structural());
        }
        assert_eq!(store.lock().stamps().structural(), before + 2);
    }

    #[rstest]
    fn test_writer_frame_sees_own_changes() {
        let store: OrderedStore<i32> = OrderedStore::new();
        let mut writer = store.write(true);
        let handle = writer.push_back(1);
        writer.push_front(0);
        assert_eq!(writer.len(), 2);
        assert_eq!(Frame::locate(&writer, &handle), Ok(1));
        assert_eq!(store.index_of(&handle).unwrap(), 1);
    }
}
