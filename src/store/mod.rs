//! Concurrent ring-buffer list with stable handles.
//!
//! [`OrderedStore`] keeps its elements in a ring buffer of atomically
//! swappable slots. One writer at a time mutates it under the write guard;
//! readers never block that writer. A point read records the store's stamps,
//! snapshots `{array, offset, len}`, does its work, and keeps the result only
//! if the stamps did not move (see [`lock`](crate::lock)).
//!
//! # Time Complexity
//!
//! | Operation                    | Complexity           |
//! |------------------------------|----------------------|
//! | `push_front` / `push_back`   | O(1) amortized       |
//! | `pop_front` / `pop_back`     | O(1) amortized       |
//! | `insert(k)` / `remove(k)`    | O(min(k, n - k))     |
//! | `get` / `handle_at`          | O(1)                 |
//! | `index_of(&Handle)`          | O(1)                 |
//! | `contains` / `position_of`   | O(n)                 |
//!
//! # Examples
//!
//! ```rust
//! use stable_order::prelude::*;
//!
//! let store = OrderedStore::new();
//! let middle = store.push_back(2);
//! store.push_back(3);
//! store.push_front(1);
//!
//! assert_eq!(store.to_vec(), vec![1, 2, 3]);
//! assert_eq!(store.index_of(&middle).unwrap(), 1);
//!
//! store.remove(0).unwrap();
//! assert_eq!(store.index_of(&middle).unwrap(), 0);
//! ```

mod ring;
mod writer;

pub use writer::StoreWriter;
pub(crate) use writer::check_move;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::Acquire;

use arc_swap::{ArcSwap, ArcSwapOption, Guard};

use crate::config::StoreConfig;
use crate::error::{Result, Veto};
use crate::frame::{Element, Frame, OrderedSource, Slot};
use crate::handle::{CollectionId, Handle, HandleExchange, HandleSpace};
use crate::lock::{CollectionLock, ReadGuard, Validation};

/// Backing array of a store.
pub(crate) struct Buffer<T> {
    slots: Box<[ArcSwapOption<Slot<T>>]>,
}

impl<T> Buffer<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: ring::empty_slots(capacity.max(1)),
        }
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [ArcSwapOption<Slot<T>>];

    fn deref(&self) -> &Self::Target {
        &self.slots
    }
}

/// Ring-buffer list with stable handles and optimistic reads.
///
/// Share it between threads with `Arc<OrderedStore<T>>`; every method takes
/// `&self`.
pub struct OrderedStore<T> {
    lock: Arc<CollectionLock>,
    space: Arc<HandleSpace>,
    buffer: ArcSwap<Buffer<T>>,
    offset: AtomicUsize,
    len: AtomicUsize,
    config: StoreConfig,
}

static_assertions::assert_impl_all!(OrderedStore<String>: Send, Sync);

impl<T> OrderedStore<T> {
    /// Creates an empty store with the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid(StoreConfig::default())
    }

    /// Creates an empty store with the given policy.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the policy is invalid.
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// Creates an empty store that starts with room for `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let defaults = StoreConfig::default();
        let config = StoreConfig::builder()
            .min_capacity(capacity.max(defaults.min_capacity()))
            .build()
            .unwrap_or(defaults);
        Self::from_valid(config)
    }

    fn from_valid(config: StoreConfig) -> Self {
        let lock = Arc::new(CollectionLock::new());
        let space = Arc::new(HandleSpace::new(
            CollectionId::next(),
            Arc::clone(&lock),
            config.optimistic_retries(),
        ));
        Self {
            lock,
            space,
            buffer: ArcSwap::from_pointee(Buffer::with_capacity(config.min_capacity())),
            offset: AtomicUsize::new(0),
            len: AtomicUsize::new(0),
            config,
        }
    }

    /// Identity of this store. Handles it mints report the same id.
    #[inline]
    pub fn id(&self) -> CollectionId {
        self.space.id()
    }

    /// The capacity policy.
    #[inline]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Size of the backing array at the moment of the call.
    pub fn capacity(&self) -> usize {
        self.buffer.load().len()
    }

    /// The lock shared by this store and everything layered on it.
    #[inline]
    pub fn lock(&self) -> &CollectionLock {
        &self.lock
    }

    /// Acquires the write guard. `structural = false` announces a value-only
    /// write; structural operations escalate the guard when they need to.
    pub fn write(&self, structural: bool) -> StoreWriter<'_, T> {
        StoreWriter::new(self, self.lock.write(structural))
    }

    /// Acquires the write guard only if it is free right now.
    pub fn try_write(&self, structural: bool) -> Option<StoreWriter<'_, T>> {
        self.lock
            .try_write(structural)
            .map(|guard| StoreWriter::new(self, guard))
    }

    /// Acquires the read guard. Writers block until it is dropped.
    pub fn read_guard(&self) -> StoreReader<'_, T> {
        let guard = self.lock.read();
        StoreReader {
            snapshot: self.snapshot(),
            _guard: guard,
        }
    }

    /// Acquires the read guard only if no writer holds the lock.
    pub fn try_read_guard(&self) -> Option<StoreReader<'_, T>> {
        self.lock.try_read().map(|guard| StoreReader {
            snapshot: self.snapshot(),
            _guard: guard,
        })
    }

    fn snapshot(&self) -> Snapshot<'_, T> {
        Snapshot {
            space: &self.space,
            buffer: self.buffer.load(),
            offset: self.offset.load(Acquire),
            len: self.len.load(Acquire),
            base: self.space.base(),
        }
    }
}

impl<T: Clone> OrderedStore<T> {
    /// Appends `value`; evicts the front element first if the store is full.
    pub fn push_back(&self, value: T) -> Handle {
        self.write(true).push_back(value)
    }

    /// Prepends `value`; evicts the back element first if the store is full.
    pub fn push_front(&self, value: T) -> Handle {
        self.write(true).push_front(value)
    }

    /// Inserts `value` at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index > len`.
    pub fn insert(&self, index: usize, value: T) -> Result<Handle> {
        self.write(true).insert(index, value)
    }

    /// Inserts every value of `values` at `index`, in order.
    ///
    /// See [`StoreWriter::insert_all`] for the eviction rule.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index > len`.
    pub fn insert_all(&self, index: usize, values: impl IntoIterator<Item = T>) -> Result<Vec<Handle>> {
        self.write(true).insert_all(index, values)
    }

    /// Removes and returns the first value.
    pub fn pop_front(&self) -> Option<T> {
        self.write(true).pop_front()
    }

    /// Removes and returns the last value.
    pub fn pop_back(&self) -> Option<T> {
        self.write(true).pop_back()
    }

    /// Removes the value at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len`.
    pub fn remove(&self, index: usize) -> Result<T> {
        self.write(true).remove(index)
    }

    /// Removes the element behind `handle`.
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `IllegalArgument` as for [`StoreWriter::remove_handle`].
    pub fn remove_handle(&self, handle: &Handle) -> Result<T> {
        self.write(true).remove_handle(handle)
    }

    /// Replaces the value at `index` in place and returns the old one.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len`.
    pub fn set(&self, index: usize, value: T) -> Result<T> {
        self.write(false).set(index, value)
    }

    /// Replaces the value behind `handle` in place and returns the old one.
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `IllegalArgument` for unusable handles.
    pub fn set_handle(&self, handle: &Handle, value: T) -> Result<T> {
        self.write(false).set_handle(handle, value)
    }

    /// Checks whether `handle` could be removed.
    ///
    /// # Errors
    ///
    /// The veto that [`remove_handle`](Self::remove_handle) would fail with.
    pub fn can_remove(&self, handle: &Handle) -> std::result::Result<(), Veto> {
        self.read(Validation::Structural, |frame| frame.locate(handle).map(|_| ()))
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
        self.read(Validation::Structural, |frame| {
            writer::check_move(frame, handle, after, before).map(|_| ())
        })
    }

    /// Moves the element behind `handle` so that it follows `after` and
    /// precedes `before`. The handle stays valid.
    ///
    /// # Errors
    ///
    /// See [`can_move`](Self::can_move).
    pub fn move_between(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> Result<()> {
        self.write(true).move_between(handle, after, before)
    }

    /// Removes every element.
    pub fn clear(&self) {
        self.write(true).clear();
    }
}

impl<T> Default for OrderedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedSource<T> for OrderedStore<T> {
    fn collection_id(&self) -> CollectionId {
        self.id()
    }

    fn read<R>(&self, validation: Validation, mut read: impl FnMut(&dyn Frame<T>) -> R) -> R {
        self.lock
            .optimistic(self.config.optimistic_retries(), validation, || {
                read(&self.snapshot())
            })
    }
}

impl<T> HandleExchange for OrderedStore<T> {
    fn exchange_id(&self) -> CollectionId {
        self.id()
    }

    fn source_handle(&self, handle: &Handle, source: CollectionId) -> Option<Handle> {
        (source == self.id() && handle.collection() == self.id() && handle.is_present())
            .then(|| handle.clone())
    }

    fn local_handle(&self, source_handle: &Handle, source: CollectionId) -> Option<Handle> {
        self.source_handle(source_handle, source)
    }
}

impl<T> FromIterator<T> for OrderedStore<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut store = Self::new();
        store.extend(iter);
        store
    }
}

impl<T> Extend<T> for OrderedStore<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let mut writer = self.write(true);
        let len = writer.count();
        let _ = writer.insert_all(len, iter);
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for OrderedStore<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::frame::OrderedAccess;
        formatter.debug_list().entries(self.to_vec()).finish()
    }
}

/// A frame read from the store's atomics. Consistent only once validated or
/// while the read guard is held.
struct Snapshot<'a, T> {
    space: &'a HandleSpace,
    buffer: Guard<Arc<Buffer<T>>>,
    offset: usize,
    len: usize,
    base: i64,
}

impl<T> Frame<T> for Snapshot<'_, T> {
    fn len(&self) -> usize {
        self.len
    }

    fn slot(&self, index: usize) -> Option<Arc<Slot<T>>> {
        if index >= self.len {
            return None;
        }
        let capacity = self.buffer.len();
        let physical = (self.offset % capacity + index % capacity) % capacity;
        self.buffer.get(physical)?.load_full()
    }

    fn locate(&self, handle: &Handle) -> std::result::Result<usize, Veto> {
        locate_in(self.space, self.base, self.len, handle)
    }
}

pub(crate) fn locate_in(
    space: &HandleSpace,
    base: i64,
    len: usize,
    handle: &Handle,
) -> std::result::Result<usize, Veto> {
    if handle.collection() != space.id() || handle.is_flipped() {
        return Err(Veto::WrongCollection);
    }
    let cell = handle.cell();
    if !cell.is_present() {
        return Err(Veto::StaleHandle);
    }
    usize::try_from(cell.position().wrapping_sub(base))
        .ok()
        .filter(|index| *index < len)
        .ok_or(Veto::StaleHandle)
}

/// Read access under the read guard. Writers wait until it is dropped, so
/// every read through it sees the same state without validation.
pub struct StoreReader<'a, T> {
    snapshot: Snapshot<'a, T>,
    _guard: ReadGuard<'a>,
}

impl<T: Clone> StoreReader<'_, T> {
    /// Value at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.snapshot.slot(index).map(|slot| slot.value().clone())
    }

    /// Elements in order.
    pub fn iter(&self) -> impl Iterator<Item = Element<T>> + '_ {
        (0..self.snapshot.len()).filter_map(|index| {
            self.snapshot.slot(index).map(|slot| Element {
                handle: slot.handle(),
                value: slot.value().clone(),
            })
        })
    }
}

impl<T> Frame<T> for StoreReader<'_, T> {
    fn len(&self) -> usize {
        self.snapshot.len()
    }

    fn slot(&self, index: usize) -> Option<Arc<Slot<T>>> {
        self.snapshot.slot(index)
    }

    fn locate(&self, handle: &Handle) -> std::result::Result<usize, Veto> {
        self.snapshot.locate(handle)
    }
}
