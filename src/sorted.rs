//! Sorted list on top of [`OrderedStore`].
//!
//! [`SortedList`] keeps its elements ordered by a [`Comparator`] and, when
//! built with [`SortedList::distinct`], free of equal elements. It shares the
//! store's locking discipline: searches are optimistic reads validated
//! against the value stamp, and every mutation runs under the write guard.
//!
//! # Mutation contract
//!
//! Every mutation has a `can_*` query returning a typed [`Veto`]. To act on
//! the answer without racing another writer, hold a [`SortedWriter`]:
//!
//! ```rust
//! use stable_order::prelude::*;
//!
//! let list: SortedList<i32> = SortedList::distinct();
//! list.add(1).unwrap();
//!
//! let mut writer = list.write();
//! if writer.can_add(&1).is_ok() {
//!     writer.add(1).unwrap();
//! }
//! assert_eq!(writer.can_add(&1), Err(Veto::Duplicate));
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::{CollectionError, Result, Veto};
use crate::frame::{Frame, OrderedSource, Slot};
use crate::handle::{CollectionId, Handle, HandleExchange};
use crate::lock::Validation;
use crate::search::{SortedSource, equal_range, equal_range_within};
use crate::store::{OrderedStore, StoreWriter, check_move};
use crate::view::{View, ViewBounds};

// =============================================================================
// Comparator
// =============================================================================

/// Total order used to sort a list.
pub trait Comparator<T> {
    /// Compares two values.
    fn compare(&self, left: &T, right: &T) -> Ordering;
}

/// Orders values by their [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<T: Ord> Comparator<T> for NaturalOrder {
    #[inline]
    fn compare(&self, left: &T, right: &T) -> Ordering {
        left.cmp(right)
    }
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, left: &T, right: &T) -> Ordering {
        self(left, right)
    }
}

// =============================================================================
// SortedMutable
// =============================================================================

/// Check a handle-addressed mutation must pass before it acts. It runs
/// against the collection's frame under the same guard as the mutation, so a
/// layer can re-validate its own constraints without racing another writer.
pub type Admission<'a, T> = &'a dyn Fn(&dyn Frame<T>) -> std::result::Result<(), Veto>;

fn admit_all<T>(_frame: &dyn Frame<T>) -> std::result::Result<(), Veto> {
    Ok(())
}

/// Mutations of a sorted collection, with their veto queries.
///
/// A `can_*` query never fails for ordinary business conditions; it returns
/// the [`Veto`] that the matching mutation would fail with.
///
/// The `*_admitted` forms are the required core: each runs an extra
/// [`Admission`] under the guard of the operation itself. Views use them to
/// check their bounds at the moment the parent acts.
pub trait SortedMutable<T>: SortedSource<T> {
    /// Checks whether `value` could be added.
    ///
    /// # Errors
    ///
    /// The veto [`add`](Self::add) would fail with.
    fn can_add(&self, value: &T) -> std::result::Result<(), Veto>;

    /// Checks whether the element behind `handle` could be removed.
    ///
    /// # Errors
    ///
    /// The veto [`remove`](Self::remove) would fail with.
    fn can_remove(&self, handle: &Handle) -> std::result::Result<(), Veto> {
        self.can_remove_admitted(handle, &admit_all::<T>)
    }

    /// [`can_remove`](Self::can_remove), also consulting `admit`.
    ///
    /// # Errors
    ///
    /// The veto of the collection, or of `admit`.
    fn can_remove_admitted(
        &self,
        handle: &Handle,
        admit: Admission<'_, T>,
    ) -> std::result::Result<(), Veto>;

    /// Checks whether the element behind `handle` could be moved between
    /// `after` and `before` without breaking the order.
    ///
    /// # Errors
    ///
    /// The veto [`move_between`](Self::move_between) would fail with.
    fn can_move(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> std::result::Result<(), Veto> {
        self.can_move_admitted(handle, after, before, &admit_all::<T>)
    }

    /// [`can_move`](Self::can_move), also consulting `admit`.
    ///
    /// # Errors
    ///
    /// The veto of the collection, or of `admit`.
    fn can_move_admitted(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
        admit: Admission<'_, T>,
    ) -> std::result::Result<(), Veto>;

    /// Inserts `value` at its sorted position, after any equal elements.
    ///
    /// # Errors
    ///
    /// `IllegalElement` if the value is refused.
    fn add(&self, value: T) -> Result<Handle>;

    /// Removes the element behind `handle`.
    ///
    /// # Errors
    ///
    /// `StaleHandle` for removed elements, `IllegalArgument` for foreign
    /// handles, `IllegalElement` for elements outside a view.
    fn remove(&self, handle: &Handle) -> Result<T> {
        self.remove_admitted(handle, &admit_all::<T>)
    }

    /// Removes the element behind `handle` if `admit` accepts the state the
    /// removal would act on.
    ///
    /// # Errors
    ///
    /// As for [`remove`](Self::remove), or the veto of `admit`.
    fn remove_admitted(&self, handle: &Handle, admit: Admission<'_, T>) -> Result<T>;

    /// Repositions an element among its equals.
    ///
    /// # Errors
    ///
    /// `IllegalElement(OrderViolation)` if the move would break the order.
    fn move_between(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> Result<()> {
        self.move_between_admitted(handle, after, before, &admit_all::<T>)
    }

    /// [`move_between`](Self::move_between), acting only if `admit` accepts.
    ///
    /// # Errors
    ///
    /// As for [`move_between`](Self::move_between), or the veto of `admit`.
    fn move_between_admitted(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
        admit: Admission<'_, T>,
    ) -> Result<()>;

    /// Returns the handle of an element equal to `value`, inserting `value`
    /// first if there is none. `on_added` runs, under the write guard, only
    /// when an insertion happened.
    ///
    /// `after` and `before` are hints that narrow the search. Stale or
    /// foreign hints are ignored; `prefer_first` picks the first rather than
    /// the last of several matches.
    ///
    /// # Errors
    ///
    /// `IllegalArgument` for inverted hints, `IllegalElement` if the value is
    /// refused.
    fn get_or_add(
        &self,
        value: T,
        after: Option<&Handle>,
        before: Option<&Handle>,
        prefer_first: bool,
        on_added: &mut dyn FnMut(&Handle),
    ) -> Result<Handle>;
}

// =============================================================================
// SortedList
// =============================================================================

/// Concurrent sorted list with stable handles.
///
/// # Examples
///
/// ```rust
/// use stable_order::prelude::*;
///
/// let list: SortedList<i32> = SortedList::new();
/// let five = list.add(5).unwrap();
/// list.add(1).unwrap();
/// list.add(3).unwrap();
///
/// assert_eq!(list.to_vec(), vec![1, 3, 5]);
/// assert_eq!(list.index_of(&five).unwrap(), 2);
/// assert!(list.contains_value(&3));
/// ```
pub struct SortedList<T, C = NaturalOrder> {
    store: OrderedStore<T>,
    comparator: C,
    distinct: bool,
}

static_assertions::assert_impl_all!(SortedList<String>: Send, Sync);

impl<T: Ord> SortedList<T> {
    /// Creates an empty list in natural order that accepts duplicates.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(OrderedStore::new(), NaturalOrder, false)
    }

    /// Creates an empty list in natural order that rejects duplicates.
    #[must_use]
    pub fn distinct() -> Self {
        Self::from_parts(OrderedStore::new(), NaturalOrder, true)
    }
}

impl<T: Ord> Default for SortedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Comparator<T>> SortedList<T, C> {
    /// Creates an empty list ordered by `comparator`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if `config` is invalid.
    pub fn with_comparator(comparator: C, distinct: bool, config: StoreConfig) -> Result<Self> {
        Ok(Self::from_parts(
            OrderedStore::with_config(config)?,
            comparator,
            distinct,
        ))
    }

    const fn from_parts(store: OrderedStore<T>, comparator: C, distinct: bool) -> Self {
        Self {
            store,
            comparator,
            distinct,
        }
    }

    /// The comparator.
    #[inline]
    pub const fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Acquires the write guard.
    pub fn write(&self) -> SortedWriter<'_, T, C> {
        SortedWriter {
            list: self,
            inner: self.store.write(false),
        }
    }

    /// Acquires the write guard only if it is free right now.
    pub fn try_write(&self) -> Option<SortedWriter<'_, T, C>> {
        self.store.try_write(false).map(|inner| SortedWriter { list: self, inner })
    }

    /// A bounded view. See [`View`].
    ///
    /// # Errors
    ///
    /// `IllegalArgument(InvalidHint)` if the lower bound follows the upper.
    pub fn view(&self, bounds: ViewBounds<T>) -> Result<View<'_, T, Self>> {
        View::bounded(self, bounds)
    }

    /// The list in reverse order, without copying.
    pub fn reversed(&self) -> View<'_, T, Self> {
        View::reversing(self)
    }

    #[inline]
    pub(crate) fn fits(&self, left: &T, right: &T) -> bool {
        match self.comparator.compare(left, right) {
            Ordering::Less => true,
            Ordering::Equal => !self.distinct,
            Ordering::Greater => false,
        }
    }
}

impl<T: Clone, C: Comparator<T>> SortedList<T, C> {
    /// Adds every value, all or nothing.
    ///
    /// # Errors
    ///
    /// `IllegalElement(Duplicate)` if a distinct list would receive a value
    /// equal to an existing element or to another value of the batch. Nothing
    /// is inserted in that case.
    pub fn add_all(&self, values: impl IntoIterator<Item = T>) -> Result<Vec<Handle>> {
        self.write().add_all(values)
    }

    /// Removes the first element equal to `value`.
    pub fn remove_value(&self, value: &T) -> Option<T> {
        self.write().remove_value(value)
    }

    /// Replaces the value behind `handle`, moving the element if the new
    /// value sorts elsewhere. The handle stays valid.
    ///
    /// # Errors
    ///
    /// `IllegalElement(Duplicate)` if a distinct list already holds an equal
    /// value elsewhere. Handle errors as for [`SortedMutable::remove`].
    pub fn replace(&self, handle: &Handle, value: T) -> Result<T> {
        self.write().replace(handle, value)
    }

    /// Applies `update` to the value behind `handle` in place.
    ///
    /// The element is not moved, so an update that changes the sort key can
    /// leave the list inconsistent until [`repair`](Self::repair) runs.
    ///
    /// # Errors
    ///
    /// Handle errors as for [`SortedMutable::remove`].
    pub fn update_in_place(&self, handle: &Handle, update: impl FnOnce(&mut T)) -> Result<()> {
        self.write().update_in_place(handle, update)
    }

    /// Removes and returns the least element.
    pub fn pop_first(&self) -> Option<T> {
        self.write().pop_first()
    }

    /// Removes and returns the greatest element.
    pub fn pop_last(&self) -> Option<T> {
        self.write().pop_last()
    }
}

impl<T, C: Comparator<T>> OrderedSource<T> for SortedList<T, C> {
    fn collection_id(&self) -> CollectionId {
        self.store.id()
    }

    fn read<R>(&self, validation: Validation, read: impl FnMut(&dyn Frame<T>) -> R) -> R {
        self.store.read(validation, read)
    }
}

impl<T, C: Comparator<T>> SortedSource<T> for SortedList<T, C> {
    fn compare(&self, left: &T, right: &T) -> Ordering {
        self.comparator.compare(left, right)
    }

    fn is_distinct(&self) -> bool {
        self.distinct
    }
}

impl<T: Clone, C: Comparator<T>> SortedMutable<T> for SortedList<T, C> {
    fn can_add(&self, value: &T) -> std::result::Result<(), Veto> {
        self.read(Validation::Values, |frame| self.veto_add(frame, value))
    }

    fn can_remove_admitted(
        &self,
        handle: &Handle,
        admit: Admission<'_, T>,
    ) -> std::result::Result<(), Veto> {
        self.read(Validation::Values, |frame| {
            admit(frame)?;
            frame.locate(handle).map(|_| ())
        })
    }

    fn can_move_admitted(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
        admit: Admission<'_, T>,
    ) -> std::result::Result<(), Veto> {
        self.read(Validation::Values, |frame| {
            admit(frame)?;
            self.veto_move(frame, handle, after, before).map(|_| ())
        })
    }

    fn add(&self, value: T) -> Result<Handle> {
        self.write().add(value)
    }

    fn remove_admitted(&self, handle: &Handle, admit: Admission<'_, T>) -> Result<T> {
        let mut writer = self.write();
        admit(&writer.inner)?;
        writer.remove(handle)
    }

    fn move_between_admitted(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
        admit: Admission<'_, T>,
    ) -> Result<()> {
        let mut writer = self.write();
        admit(&writer.inner)?;
        writer.move_between(handle, after, before)
    }

    fn get_or_add(
        &self,
        value: T,
        after: Option<&Handle>,
        before: Option<&Handle>,
        prefer_first: bool,
        on_added: &mut dyn FnMut(&Handle),
    ) -> Result<Handle> {
        self.write()
            .get_or_add(value, after, before, prefer_first, |handle| on_added(handle))
    }
}

impl<T, C: Comparator<T>> SortedList<T, C> {
    fn veto_add(&self, frame: &(impl Frame<T> + ?Sized), value: &T) -> std::result::Result<(), Veto> {
        let probe = |candidate: &T| self.comparator.compare(value, candidate);
        if self.distinct && !equal_range(frame, &probe).is_empty() {
            return Err(Veto::Duplicate);
        }
        Ok(())
    }

    /// Resolves a move and checks that the element still sorts correctly at
    /// its target.
    fn veto_move(
        &self,
        frame: &(impl Frame<T> + ?Sized),
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> std::result::Result<Option<(usize, usize)>, Veto> {
        let Some((from, target)) = check_move(frame, handle, after, before)? else {
            return Ok(None);
        };
        let original = |index: usize| if index < from { index } else { index + 1 };
        let value = frame.slot(from).ok_or(Veto::StaleHandle)?;
        let previous = target.checked_sub(1).and_then(|index| frame.slot(original(index)));
        let next = frame.slot(original(target));
        let ordered = previous
            .as_ref()
            .is_none_or(|previous| self.fits(previous.value(), value.value()))
            && next
                .as_ref()
                .is_none_or(|next| self.fits(value.value(), next.value()));
        if ordered {
            Ok(Some((from, target)))
        } else {
            Err(Veto::OrderViolation)
        }
    }

    /// Returns `true` if the element at `index` is ordered with respect to
    /// both neighbours.
    pub(crate) fn consistent_at(&self, frame: &(impl Frame<T> + ?Sized), index: usize) -> bool {
        let Some(slot) = frame.slot(index) else {
            return false;
        };
        let previous = index.checked_sub(1).and_then(|index| frame.slot(index));
        let next = frame.slot(index + 1);
        previous
            .as_ref()
            .is_none_or(|previous| self.fits(previous.value(), slot.value()))
            && next
                .as_ref()
                .is_none_or(|next| self.fits(slot.value(), next.value()))
    }
}

impl<T, C: Comparator<T>> HandleExchange for SortedList<T, C> {
    fn exchange_id(&self) -> CollectionId {
        self.store.exchange_id()
    }

    fn source_handle(&self, handle: &Handle, source: CollectionId) -> Option<Handle> {
        self.store.source_handle(handle, source)
    }

    fn local_handle(&self, source_handle: &Handle, source: CollectionId) -> Option<Handle> {
        self.store.local_handle(source_handle, source)
    }
}

impl<T: Ord + Clone> FromIterator<T> for SortedList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.extend(iter);
        list
    }
}

/// Values equal to an existing element of a distinct list are skipped.
impl<T: Clone, C: Comparator<T>> Extend<T> for SortedList<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let mut writer = self.write();
        for value in iter {
            if writer.can_add(&value).is_ok() {
                let _ = writer.add(value);
            }
        }
    }
}

impl<T: Clone + fmt::Debug, C: Comparator<T>> fmt::Debug for SortedList<T, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::frame::OrderedAccess;
        formatter.debug_list().entries(self.to_vec()).finish()
    }
}

// =============================================================================
// SortedWriter
// =============================================================================

/// Exclusive access to a [`SortedList`], for check-then-act sequences.
pub struct SortedWriter<'a, T, C> {
    list: &'a SortedList<T, C>,
    pub(crate) inner: StoreWriter<'a, T>,
}

impl<'a, T, C: Comparator<T>> SortedWriter<'a, T, C> {
    /// The list being written.
    #[inline]
    pub const fn list(&self) -> &'a SortedList<T, C> {
        self.list
    }

    /// Checks whether `value` could be added.
    ///
    /// # Errors
    ///
    /// `Duplicate` if a distinct list already holds an equal value.
    pub fn can_add(&self, value: &T) -> std::result::Result<(), Veto> {
        self.list.veto_add(&self.inner, value)
    }

    /// Checks whether the element behind `handle` could be removed.
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `WrongCollection`.
    pub fn can_remove(&self, handle: &Handle) -> std::result::Result<(), Veto> {
        self.inner.can_remove(handle)
    }

    /// Checks whether a move would keep the list sorted.
    ///
    /// # Errors
    ///
    /// `OrderViolation`, or a handle or hint veto.
    pub fn can_move(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> std::result::Result<(), Veto> {
        self.list
            .veto_move(&self.inner, handle, after, before)
            .map(|_| ())
    }

    /// Index range of the elements equal to `value`.
    pub(crate) fn equal_range(&self, value: &T) -> std::ops::Range<usize> {
        equal_range(&self.inner, &|candidate: &T| {
            self.list.comparator.compare(value, candidate)
        })
    }

    /// Inserts `value` at its sorted position, after any equal elements.
    ///
    /// # Errors
    ///
    /// `IllegalElement(Duplicate)` for a value a distinct list already holds.
    pub fn add(&mut self, value: T) -> Result<Handle> {
        let range = self.equal_range(&value);
        if self.list.distinct && !range.is_empty() {
            return Err(Veto::Duplicate.into());
        }
        self.inner.insert(range.end, value)
    }

    /// Returns the existing element equal to `value`, or inserts `value`.
    ///
    /// See [`SortedMutable::get_or_add`].
    ///
    /// # Errors
    ///
    /// `IllegalArgument(InvalidHint)` if `after` follows `before`.
    pub fn get_or_add(
        &mut self,
        value: T,
        after: Option<&Handle>,
        before: Option<&Handle>,
        prefer_first: bool,
        on_added: impl FnOnce(&Handle),
    ) -> Result<Handle> {
        let lower = after.and_then(|hint| self.inner.locate(hint).ok());
        let upper = before.and_then(|hint| self.inner.locate(hint).ok());
        if let (Some(lower), Some(upper)) = (lower, upper)
            && lower >= upper
        {
            return Err(Veto::InvalidHint("`after` must precede `before`").into());
        }
        let compare = |candidate: &T| self.list.comparator.compare(&value, candidate);
        let len = self.inner.len();
        let start = lower
            .filter(|&index| {
                self.inner
                    .slot(index)
                    .is_some_and(|slot| compare(slot.value()) != Ordering::Less)
            })
            .unwrap_or(0);
        let end = upper
            .filter(|&index| {
                self.inner
                    .slot(index)
                    .is_some_and(|slot| compare(slot.value()) != Ordering::Greater)
            })
            .map_or(len, |index| index + 1);
        let range = equal_range_within(&self.inner, &compare, start..end);
        if !range.is_empty() {
            let index = if prefer_first { range.start } else { range.end - 1 };
            return self
                .inner
                .slot(index)
                .map(|slot| slot.handle())
                .ok_or(CollectionError::StaleHandle);
        }
        let handle = self.inner.insert(range.start, value)?;
        on_added(&handle);
        Ok(handle)
    }

    /// Moves an element among its equals.
    ///
    /// # Errors
    ///
    /// See [`can_move`](Self::can_move).
    pub fn move_between(
        &mut self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> Result<()> {
        self.list.veto_move(&self.inner, handle, after, before)?;
        self.inner.move_between(handle, after, before)
    }

    /// Returns `true` if the element behind `handle` is ordered with respect
    /// to its neighbours.
    ///
    /// # Errors
    ///
    /// Handle errors as for [`remove`](Self::remove).
    pub fn is_consistent(&self, handle: &Handle) -> Result<bool> {
        let index = self.inner.locate(handle)?;
        Ok(self.list.consistent_at(&self.inner, index))
    }

    /// Returns `true` if every adjacent pair is ordered. O(n).
    pub fn check_consistency(&self) -> bool {
        check_frame(self.list, &self.inner)
    }
}

impl<T: Clone, C: Comparator<T>> SortedWriter<'_, T, C> {
    /// Adds every value, all or nothing.
    ///
    /// # Errors
    ///
    /// See [`SortedList::add_all`].
    pub fn add_all(&mut self, values: impl IntoIterator<Item = T>) -> Result<Vec<Handle>> {
        let list = self.list;
        let mut batch: Vec<T> = values.into_iter().collect();
        let comparator = &list.comparator;
        batch.sort_by(|left, right| comparator.compare(left, right));
        if list.distinct {
            let repeated = batch
                .windows(2)
                .any(|pair| comparator.compare(&pair[0], &pair[1]) == Ordering::Equal);
            if repeated || batch.iter().any(|value| self.can_add(value).is_err()) {
                return Err(Veto::Duplicate.into());
            }
        }
        batch.into_iter().map(|value| self.add(value)).collect()
    }

    /// Removes the element behind `handle`.
    ///
    /// # Errors
    ///
    /// `StaleHandle` for removed elements, `IllegalArgument` for foreign
    /// handles.
    pub fn remove(&mut self, handle: &Handle) -> Result<T> {
        self.inner.remove_handle(handle)
    }

    /// Removes the first element equal to `value`.
    pub fn remove_value(&mut self, value: &T) -> Option<T> {
        let range = self.equal_range(value);
        if range.is_empty() {
            return None;
        }
        self.inner.remove(range.start).ok()
    }

    /// Removes and returns the least element.
    pub fn pop_first(&mut self) -> Option<T> {
        self.inner.pop_front()
    }

    /// Removes and returns the greatest element.
    pub fn pop_last(&mut self) -> Option<T> {
        self.inner.pop_back()
    }

    /// See [`SortedList::replace`].
    ///
    /// # Errors
    ///
    /// See [`SortedList::replace`].
    pub fn replace(&mut self, handle: &Handle, value: T) -> Result<T> {
        let index = self.inner.locate(handle)?;
        let previous = index.checked_sub(1).and_then(|index| self.inner.slot(index));
        let next = self.inner.slot(index + 1);
        let stays = previous
            .as_ref()
            .is_none_or(|previous| self.list.fits(previous.value(), &value))
            && next
                .as_ref()
                .is_none_or(|next| self.list.fits(&value, next.value()));
        if stays {
            return self.inner.set(index, value);
        }
        let range = self.equal_range(&value);
        if self.list.distinct && !range.is_empty() {
            return Err(Veto::Duplicate.into());
        }
        let Some(old) = self.inner.detach(index) else {
            return Err(CollectionError::StaleHandle);
        };
        let replacement = Arc::new(old.with_value(value));
        let target = self.equal_range(replacement.value()).end;
        self.inner.attach(target, replacement);
        Ok(Slot::into_value(old))
    }

    /// See [`SortedList::update_in_place`].
    ///
    /// # Errors
    ///
    /// See [`SortedList::update_in_place`].
    pub fn update_in_place(&mut self, handle: &Handle, update: impl FnOnce(&mut T)) -> Result<()> {
        let index = self.inner.locate(handle)?;
        let mut value = self
            .inner
            .slot(index)
            .map(|slot| slot.value().clone())
            .ok_or(CollectionError::StaleHandle)?;
        update(&mut value);
        self.inner.set(index, value).map(|_| ())
    }
}

impl<T, C> Frame<T> for SortedWriter<'_, T, C> {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn slot(&self, index: usize) -> Option<Arc<Slot<T>>> {
        self.inner.slot(index)
    }

    fn locate(&self, handle: &Handle) -> std::result::Result<usize, Veto> {
        self.inner.locate(handle)
    }
}

/// Returns `true` if every adjacent pair of `frame` is ordered for `list`.
pub(crate) fn check_frame<T, C: Comparator<T>>(
    list: &SortedList<T, C>,
    frame: &(impl Frame<T> + ?Sized),
) -> bool {
    let mut previous: Option<Arc<Slot<T>>> = None;
    for index in 0..frame.len() {
        let Some(slot) = frame.slot(index) else {
            return false;
        };
        if let Some(previous) = &previous
            && !list.fits(previous.value(), slot.value())
        {
            return false;
        }
        previous = Some(slot);
    }
    true
}
