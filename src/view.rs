//! Bounded and reversed views.
//!
//! A [`View`] presents a sorted parent restricted to a value range, in the
//! parent's order or reversed. It copies nothing: every read runs inside the
//! parent's own [`read`](OrderedSource::read) and translates indices on the
//! way through, so a view gives exactly the parent's consistency guarantees.
//!
//! ```text
//!   parent:   [ 1  3  5  7  9 ]        bounds 3..=7
//!   view:        [ 3  5  7 ]           index i -> start + i
//!   reversed:    [ 7  5  3 ]           index i -> end - 1 - i
//! ```
//!
//! Views nest, and every view is itself a [`SortedSource`], so a reversed
//! view can be bounded again in its own order.
//!
//! Handles handed out by a reversed view are flipped: they compare in the
//! view's order, and the parent rejects them until flipped back.
//!
//! # Examples
//!
//! ```rust
//! use std::ops::Bound;
//! use stable_order::prelude::*;
//!
//! let list: SortedList<i32> = [1, 3, 5, 7, 9].into_iter().collect();
//! let middle = list.view(ViewBounds::from_range(3..=7)).unwrap();
//! assert_eq!(middle.to_vec(), vec![3, 5, 7]);
//! assert!(middle.add(8).unwrap_err().is_illegal_element());
//!
//! let descending = list.reversed();
//! assert_eq!(descending.to_vec(), vec![9, 7, 5, 3, 1]);
//! let top = descending
//!     .view(ViewBounds::new(Bound::Unbounded, Bound::Excluded(5)))
//!     .unwrap();
//! assert_eq!(top.to_vec(), vec![9, 7]);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

use crate::error::{CollectionError, RangePosition, Result, Veto};
use crate::frame::{Frame, OrderedAccess, OrderedSource, Slot};
use crate::handle::{CollectionId, Handle, HandleExchange};
use crate::lock::Validation;
use crate::search::{SortedSource, partition_point};
use crate::sorted::{Admission, SortedMutable};

/// Value range of a view, in the order of the collection it is taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewBounds<T> {
    lower: Bound<T>,
    upper: Bound<T>,
}

impl<T> ViewBounds<T> {
    /// Bounds from explicit ends.
    #[inline]
    pub const fn new(lower: Bound<T>, upper: Bound<T>) -> Self {
        Self { lower, upper }
    }

    /// No bounds at all.
    #[inline]
    pub const fn unbounded() -> Self {
        Self::new(Bound::Unbounded, Bound::Unbounded)
    }

    /// Bounds copied from a range expression such as `3..7` or `..=9`.
    pub fn from_range(range: impl RangeBounds<T>) -> Self
    where
        T: Clone,
    {
        Self::new(range.start_bound().cloned(), range.end_bound().cloned())
    }

    /// The lower end.
    #[inline]
    pub const fn lower(&self) -> &Bound<T> {
        &self.lower
    }

    /// The upper end.
    #[inline]
    pub const fn upper(&self) -> &Bound<T> {
        &self.upper
    }

    /// Returns `true` if neither end is bounded.
    #[inline]
    pub const fn is_unbounded(&self) -> bool {
        matches!(
            (&self.lower, &self.upper),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }

    /// Where `value` falls under `compare`.
    fn position(&self, value: &T, compare: impl Fn(&T, &T) -> Ordering) -> RangePosition {
        let below = match &self.lower {
            Bound::Unbounded => false,
            Bound::Included(lower) => compare(value, lower) == Ordering::Less,
            Bound::Excluded(lower) => compare(value, lower) != Ordering::Greater,
        };
        let above = match &self.upper {
            Bound::Unbounded => false,
            Bound::Included(upper) => compare(value, upper) == Ordering::Greater,
            Bound::Excluded(upper) => compare(value, upper) != Ordering::Less,
        };
        match (below, above) {
            (true, _) => RangePosition::Below,
            (false, true) => RangePosition::Above,
            (false, false) => RangePosition::Within,
        }
    }
}

impl<T> Default for ViewBounds<T> {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// A bounded and/or reversed window onto a sorted parent.
///
/// Mutations are checked against the bounds before they reach the parent: a
/// value outside the range fails with `IllegalElement(OutOfRange)` and leaves
/// the parent untouched. A [`read_only`](Self::read_only) view refuses every
/// mutation with `Unsupported`.
pub struct View<'p, T, P: ?Sized> {
    parent: &'p P,
    bounds: ViewBounds<T>,
    reversed: bool,
    read_only: bool,
    id: CollectionId,
}

impl<'p, T, P: SortedSource<T> + ?Sized> View<'p, T, P> {
    pub(crate) fn bounded(parent: &'p P, bounds: ViewBounds<T>) -> Result<Self> {
        if let (
            Bound::Included(lower) | Bound::Excluded(lower),
            Bound::Included(upper) | Bound::Excluded(upper),
        ) = (&bounds.lower, &bounds.upper)
            && parent.compare(lower, upper) == Ordering::Greater
        {
            return Err(CollectionError::IllegalArgument(Veto::InvalidHint(
                "lower bound follows upper bound",
            )));
        }
        Ok(Self::build(parent, bounds, false))
    }

    pub(crate) fn reversing(parent: &'p P) -> Self {
        Self::build(parent, ViewBounds::unbounded(), true)
    }

    fn build(parent: &'p P, bounds: ViewBounds<T>, reversed: bool) -> Self {
        Self {
            parent,
            bounds,
            reversed,
            read_only: false,
            id: CollectionId::next(),
        }
    }

    /// The same view, refusing every mutation.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// The collection this view is taken from.
    #[inline]
    pub const fn parent(&self) -> &'p P {
        self.parent
    }

    /// The value range, in the parent's order.
    #[inline]
    pub const fn bounds(&self) -> &ViewBounds<T> {
        &self.bounds
    }

    /// Returns `true` if this view reverses its parent.
    #[inline]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Returns `true` if mutations are refused.
    #[inline]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Where `value` falls relative to this view's range, in this view's
    /// order.
    pub fn range_test(&self, value: &T) -> RangePosition {
        let position = self
            .bounds
            .position(value, |left, right| self.parent.compare(left, right));
        orient(position, self.reversed)
    }

    /// A bounded view of this view, with bounds in this view's order.
    ///
    /// # Errors
    ///
    /// `IllegalArgument(InvalidHint)` if the lower bound follows the upper.
    pub fn view(&self, bounds: ViewBounds<T>) -> Result<View<'_, T, Self>> {
        View::bounded(self, bounds)
    }

    /// This view in reverse order.
    pub fn reversed(&self) -> View<'_, T, Self> {
        View::reversing(self)
    }

    /// Translates a handle between this view's orientation and the parent's.
    #[inline]
    fn translate(&self, handle: &Handle) -> Handle {
        if self.reversed {
            handle.flipped()
        } else {
            handle.clone()
        }
    }

    fn window(&self, frame: &dyn Frame<T>) -> (usize, usize) {
        let compare = |left: &T, right: &T| self.parent.compare(left, right);
        let start = match &self.bounds.lower {
            Bound::Unbounded => 0,
            Bound::Included(lower) => {
                partition_point(frame, |candidate| compare(candidate, lower) == Ordering::Less)
            }
            Bound::Excluded(lower) => {
                partition_point(frame, |candidate| compare(candidate, lower) != Ordering::Greater)
            }
        };
        let end = match &self.bounds.upper {
            Bound::Unbounded => frame.len(),
            Bound::Included(upper) => {
                partition_point(frame, |candidate| compare(candidate, upper) != Ordering::Greater)
            }
            Bound::Excluded(upper) => {
                partition_point(frame, |candidate| compare(candidate, upper) == Ordering::Less)
            }
        };
        (start, end.max(start))
    }

    fn check_writable(&self) -> std::result::Result<(), Veto> {
        if self.read_only {
            Err(Veto::Unsupported("mutation through a read-only view"))
        } else {
            Ok(())
        }
    }

    fn check_value(&self, value: &T) -> std::result::Result<(), Veto> {
        self.check_writable()?;
        match self.range_test(value) {
            RangePosition::Within => Ok(()),
            position => Err(Veto::OutOfRange(position)),
        }
    }

    /// Runs `read` on `frame` as seen through this view.
    fn within<R>(&self, frame: &dyn Frame<T>, read: impl FnOnce(&dyn Frame<T>) -> R) -> R {
        let (start, end) = self.window(frame);
        read(&ViewFrame {
            parent: frame,
            start,
            end,
            reversed: self.reversed,
        })
    }

    /// Requires `handles` to lie inside this view, then consults `admit` on
    /// the view's frame.
    fn admit_handles(
        &self,
        frame: &dyn Frame<T>,
        handles: &[Option<&Handle>],
        admit: Admission<'_, T>,
    ) -> std::result::Result<(), Veto> {
        self.within(frame, |frame| {
            for handle in handles.iter().flatten() {
                frame.locate(handle)?;
            }
            admit(frame)
        })
    }

    /// Parent-order `(after, before)` for view-order hints.
    fn translate_hints(
        &self,
        after: Option<&Handle>,
        before: Option<&Handle>,
    ) -> (Option<Handle>, Option<Handle>) {
        let after = after.map(|hint| self.translate(hint));
        let before = before.map(|hint| self.translate(hint));
        if self.reversed {
            (before, after)
        } else {
            (after, before)
        }
    }
}

const fn orient(position: RangePosition, reversed: bool) -> RangePosition {
    match (position, reversed) {
        (RangePosition::Below, true) => RangePosition::Above,
        (RangePosition::Above, true) => RangePosition::Below,
        (position, _) => position,
    }
}

impl<T, P: SortedSource<T> + ?Sized> OrderedSource<T> for View<'_, T, P> {
    fn collection_id(&self) -> CollectionId {
        self.id
    }

    fn read<R>(&self, validation: Validation, mut read: impl FnMut(&dyn Frame<T>) -> R) -> R {
        let validation = if self.bounds.is_unbounded() {
            validation
        } else {
            Validation::Values
        };
        self.parent
            .read(validation, |frame| self.within(frame, |frame| read(frame)))
    }
}

impl<T, P: SortedSource<T> + ?Sized> SortedSource<T> for View<'_, T, P> {
    fn compare(&self, left: &T, right: &T) -> Ordering {
        if self.reversed {
            self.parent.compare(right, left)
        } else {
            self.parent.compare(left, right)
        }
    }

    fn is_distinct(&self) -> bool {
        self.parent.is_distinct()
    }
}

impl<T, P: SortedMutable<T> + ?Sized> SortedMutable<T> for View<'_, T, P> {
    fn can_add(&self, value: &T) -> std::result::Result<(), Veto> {
        self.check_value(value)?;
        self.parent.can_add(value)
    }

    fn can_remove_admitted(
        &self,
        handle: &Handle,
        admit: Admission<'_, T>,
    ) -> std::result::Result<(), Veto> {
        self.check_writable()?;
        self.parent.can_remove_admitted(&self.translate(handle), &|frame| {
            self.admit_handles(frame, &[Some(handle)], admit)
        })
    }

    fn can_move_admitted(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
        admit: Admission<'_, T>,
    ) -> std::result::Result<(), Veto> {
        self.check_writable()?;
        let (parent_after, parent_before) = self.translate_hints(after, before);
        self.parent.can_move_admitted(
            &self.translate(handle),
            parent_after.as_ref(),
            parent_before.as_ref(),
            &|frame| self.admit_handles(frame, &[Some(handle), after, before], admit),
        )
    }

    fn add(&self, value: T) -> Result<Handle> {
        self.check_value(&value)?;
        self.parent
            .add(value)
            .map(|handle| self.translate(&handle))
    }

    fn remove_admitted(&self, handle: &Handle, admit: Admission<'_, T>) -> Result<T> {
        self.check_writable()?;
        self.parent.remove_admitted(&self.translate(handle), &|frame| {
            self.admit_handles(frame, &[Some(handle)], admit)
        })
    }

    fn move_between_admitted(
        &self,
        handle: &Handle,
        after: Option<&Handle>,
        before: Option<&Handle>,
        admit: Admission<'_, T>,
    ) -> Result<()> {
        self.check_writable()?;
        let (parent_after, parent_before) = self.translate_hints(after, before);
        self.parent.move_between_admitted(
            &self.translate(handle),
            parent_after.as_ref(),
            parent_before.as_ref(),
            &|frame| self.admit_handles(frame, &[Some(handle), after, before], admit),
        )
    }

    fn get_or_add(
        &self,
        value: T,
        after: Option<&Handle>,
        before: Option<&Handle>,
        prefer_first: bool,
        on_added: &mut dyn FnMut(&Handle),
    ) -> Result<Handle> {
        self.check_value(&value)?;
        let (after, before) = self.translate_hints(after, before);
        let prefer_first = prefer_first != self.reversed;
        self.parent
            .get_or_add(
                value,
                after.as_ref(),
                before.as_ref(),
                prefer_first,
                &mut |handle| on_added(&self.translate(handle)),
            )
            .map(|handle| self.translate(&handle))
    }
}

impl<T, P: SortedSource<T> + HandleExchange + ?Sized> HandleExchange for View<'_, T, P> {
    fn exchange_id(&self) -> CollectionId {
        self.id
    }

    fn source_handle(&self, handle: &Handle, source: CollectionId) -> Option<Handle> {
        if !self.contains_handle(handle) {
            return None;
        }
        if source == self.id {
            return Some(handle.clone());
        }
        let parent_handle = self.translate(handle);
        if source == self.parent.exchange_id() {
            return Some(parent_handle);
        }
        self.parent.source_handle(&parent_handle, source)
    }

    fn local_handle(&self, source_handle: &Handle, source: CollectionId) -> Option<Handle> {
        let parent_handle = if source == self.id {
            return self
                .contains_handle(source_handle)
                .then(|| source_handle.clone());
        } else if source == self.parent.exchange_id() {
            source_handle.clone()
        } else {
            self.parent.local_handle(source_handle, source)?
        };
        let local = self.translate(&parent_handle);
        self.contains_handle(&local).then_some(local)
    }
}

impl<T: Clone + fmt::Debug, P: SortedSource<T> + ?Sized> fmt::Debug for View<'_, T, P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.to_vec()).finish()
    }
}

/// A parent frame seen through a view's index transform.
struct ViewFrame<'f, T> {
    parent: &'f dyn Frame<T>,
    start: usize,
    end: usize,
    reversed: bool,
}

impl<T> Frame<T> for ViewFrame<'_, T> {
    fn len(&self) -> usize {
        self.end - self.start
    }

    fn slot(&self, index: usize) -> Option<Arc<Slot<T>>> {
        if index >= self.len() {
            return None;
        }
        let parent_index = if self.reversed {
            self.end - 1 - index
        } else {
            self.start + index
        };
        self.parent.slot(parent_index)
    }

    fn locate(&self, handle: &Handle) -> std::result::Result<usize, Veto> {
        let parent_handle = if self.reversed {
            handle.flipped()
        } else {
            handle.clone()
        };
        let index = self.parent.locate(&parent_handle)?;
        if index < self.start {
            return Err(Veto::OutOfRange(orient(RangePosition::Below, self.reversed)));
        }
        if index >= self.end {
            return Err(Veto::OutOfRange(orient(RangePosition::Above, self.reversed)));
        }
        Ok(if self.reversed {
            self.end - 1 - index
        } else {
            index - self.start
        })
    }

    fn is_flipped(&self) -> bool {
        self.reversed != self.parent.is_flipped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sorted::SortedList;
    use rstest::rstest;

    fn odds() -> SortedList<i32> {
        [1, 3, 5, 7, 9].into_iter().collect()
    }

    #[rstest]
    #[case::closed(ViewBounds::from_range(3..=7), vec![3, 5, 7])]
    #[case::half_open(ViewBounds::from_range(3..7), vec![3, 5])]
    #[case::between_elements(ViewBounds::from_range(4..8), vec![5, 7])]
    #[case::excluded_lower(ViewBounds::new(Bound::Excluded(3), Bound::Unbounded), vec![5, 7, 9])]
    #[case::empty(ViewBounds::from_range(5..5), vec![])]
    #[case::unbounded(ViewBounds::unbounded(), vec![1, 3, 5, 7, 9])]
    fn test_bounded_view_contents(#[case] bounds: ViewBounds<i32>, #[case] expected: Vec<i32>) {
        let list = odds();
        let view = list.view(bounds).unwrap();
        assert_eq!(view.to_vec(), expected);
        assert_eq!(view.len(), expected.len());
    }

    #[rstest]
    fn test_inverted_bounds_rejected() {
        let list = odds();
        let error = list.view(ViewBounds::from_range(7..=3)).unwrap_err();
        assert!(matches!(error, CollectionError::IllegalArgument(Veto::InvalidHint(_))));
    }

    #[rstest]
    fn test_out_of_range_insert_leaves_parent_unmodified() {
        let list = odds();
        let view = list.view(ViewBounds::from_range(3..7)).unwrap();
        assert_eq!(view.can_add(&7), Err(Veto::OutOfRange(RangePosition::Above)));
        assert_eq!(view.can_add(&0), Err(Veto::OutOfRange(RangePosition::Below)));
        assert!(view.add(7).unwrap_err().is_illegal_element());
        assert_eq!(list.to_vec(), vec![1, 3, 5, 7, 9]);
        let handle = view.add(4).unwrap();
        assert_eq!(view.index_of(&handle).unwrap(), 1);
        assert_eq!(list.index_of(&handle).unwrap(), 2);
    }

    #[rstest]
    fn test_removal_window_checked_on_guarded_frame() {
        let list = odds();
        let view = list.view(ViewBounds::from_range(3..=7)).unwrap();
        let five = list.handle_at(2).unwrap();
        let seen = std::cell::Cell::new(None);
        let error = view
            .remove_admitted(&five, &|frame| {
                seen.set(Some((frame.len(), frame.locate(&five))));
                Err(Veto::Unsupported("held for inspection"))
            })
            .unwrap_err();
        assert!(error.is_unsupported());
        assert_eq!(seen.take(), Some((3, Ok(1))));
        assert_eq!(list.len(), 5);
    }

    #[rstest]
    fn test_element_moved_out_of_window_is_not_removed() {
        let list = odds();
        let view = list.view(ViewBounds::from_range(3..=7)).unwrap();
        let five = list.handle_at(2).unwrap();
        list.replace(&five, 8).unwrap();
        assert_eq!(
            view.can_remove(&five),
            Err(Veto::OutOfRange(RangePosition::Above))
        );
        assert!(view.remove(&five).unwrap_err().is_illegal_element());
        assert!(view.move_between(&five, None, None).is_err());
        assert_eq!(list.to_vec(), vec![1, 3, 7, 8, 9]);
    }

    #[rstest]
    fn test_index_translation_and_out_of_range_handles() {
        let list = odds();
        let view = list.view(ViewBounds::from_range(3..=7)).unwrap();
        let nine = list.handle_at(4).unwrap();
        let five = list.handle_at(2).unwrap();
        assert_eq!(view.index_of(&five).unwrap(), 1);
        assert!(view.index_of(&nine).unwrap_err().is_illegal_element());
        assert!(!view.contains_handle(&nine));
        assert!(view.remove(&nine).is_err());
        assert_eq!(list.len(), 5);
    }

    #[rstest]
    fn test_reversed_view_order_and_handles() {
        let list = odds();
        let reversed = list.reversed();
        assert_eq!(reversed.to_vec(), vec![9, 7, 5, 3, 1]);
        let first = reversed.handle_at(0).unwrap();
        let second = reversed.handle_at(1).unwrap();
        assert!(first.is_flipped());
        assert!(first < second);
        assert_eq!(reversed.value_of(&first).unwrap(), 9);
        assert!(list.index_of(&first).is_err());
        assert_eq!(list.index_of(&first.flipped()).unwrap(), 4);
        assert_eq!(reversed.range_test(&4), RangePosition::Within);
    }

    #[rstest]
    fn test_reversed_view_mutations_reach_parent() {
        let list = odds();
        let reversed = list.reversed();
        let handle = reversed.add(4).unwrap();
        assert_eq!(reversed.index_of(&handle).unwrap(), 3);
        assert_eq!(list.to_vec(), vec![1, 3, 4, 5, 7, 9]);
        assert_eq!(reversed.remove(&handle).unwrap(), 4);
        assert_eq!(list.to_vec(), vec![1, 3, 5, 7, 9]);
    }

    #[rstest]
    fn test_reversed_get_or_add_prefers_in_view_order() {
        let list = SortedList::with_comparator(
            |left: &(i32, char), right: &(i32, char)| left.0.cmp(&right.0),
            false,
            crate::config::StoreConfig::default(),
        )
        .unwrap();
        list.add_all([(1, 'a'), (1, 'b')]).unwrap();
        let reversed = list.reversed();
        let handle = reversed
            .get_or_add((1, 'x'), None, None, true, &mut |_| {})
            .unwrap();
        assert_eq!(reversed.value_of(&handle).unwrap(), (1, 'b'));
    }

    #[rstest]
    fn test_nested_views() {
        let list: SortedList<i32> = (0..20).collect();
        let outer = list.view(ViewBounds::from_range(5..15)).unwrap();
        let reversed = outer.reversed();
        let inner = reversed
            .view(ViewBounds::new(Bound::Included(12), Bound::Excluded(8)))
            .unwrap();
        assert_eq!(inner.to_vec(), vec![12, 11, 10, 9]);
        assert_eq!(inner.range_test(&13), RangePosition::Below);
        assert_eq!(inner.range_test(&3), RangePosition::Above);
        assert!(inner.add(13).is_err());
        let handle = inner.add(10).unwrap();
        assert_eq!(list.len(), 21);
        assert!(inner.contains_handle(&handle));
    }

    #[rstest]
    fn test_read_only_view_refuses_mutation() {
        let list = odds();
        let view = list.view(ViewBounds::unbounded()).unwrap().read_only();
        let handle = list.handle_at(0).unwrap();
        assert_eq!(view.can_add(&4), Err(Veto::Unsupported("mutation through a read-only view")));
        assert!(view.add(4).unwrap_err().is_unsupported());
        assert!(view.remove(&handle).unwrap_err().is_unsupported());
        assert_eq!(view.to_vec(), list.to_vec());
    }

    #[rstest]
    fn test_handle_exchange_through_views() {
        let list = odds();
        let reversed = list.reversed();
        let view_handle = reversed.handle_at(0).unwrap();
        let list_handle = reversed
            .source_handle(&view_handle, list.exchange_id())
            .unwrap();
        assert_eq!(list.value_of(&list_handle).unwrap(), 9);
        assert_eq!(
            reversed.local_handle(&list_handle, list.exchange_id()),
            Some(view_handle.clone())
        );

        let bounded = reversed.view(ViewBounds::from_range(7..=3)).unwrap();
        let outside = list.handle_at(0).unwrap();
        assert_eq!(bounded.local_handle(&outside, list.exchange_id()), None);
        let inside = list.handle_at(2).unwrap();
        let local = bounded.local_handle(&inside, list.exchange_id()).unwrap();
        assert_eq!(bounded.value_of(&local).unwrap(), 5);
        assert_eq!(bounded.source_handle(&local, list.exchange_id()), Some(inside));
    }

    #[rstest]
    fn test_views_see_parent_changes() {
        let list = odds();
        let view = list.view(ViewBounds::from_range(2..=6)).unwrap();
        list.add(4).unwrap();
        list.remove_value(&3);
        assert_eq!(view.to_vec(), vec![4, 5]);
        assert_eq!(format!("{view:?}"), "[4, 5]");
    }
}
