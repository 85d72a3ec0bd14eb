//! Binary search over sorted frames.
//!
//! A *probe* is a one-sided comparison: called with a candidate element it
//! answers where the sought value lies relative to that candidate.
//!
//! | `probe(candidate)` | Meaning                                  |
//! |--------------------|------------------------------------------|
//! | `Less`             | the sought value precedes the candidate  |
//! | `Equal`            | the candidate matches                    |
//! | `Greater`          | the sought value follows the candidate   |
//!
//! In a sorted frame the probe answers `Greater` for a prefix, `Equal` for a
//! (possibly empty) run, and `Less` for the rest. [`equal_range`] finds that
//! run in O(log n); [`SearchFilter`] decides what to return when it is empty.
//!
//! # Examples
//!
//! ```rust
//! use stable_order::prelude::*;
//!
//! let list: SortedList<i32> = [1, 3, 5, 7].into_iter().collect();
//! let probe = |candidate: &i32| 4.cmp(candidate);
//!
//! assert_eq!(list.search(probe, SearchFilter::Less).map(|e| e.value), Some(3));
//! assert_eq!(list.search(probe, SearchFilter::Greater).map(|e| e.value), Some(5));
//! assert_eq!(list.search(probe, SearchFilter::OnlyMatch), None);
//! ```

use std::cmp::Ordering;
use std::ops::Range;

use crate::frame::{Element, Frame, OrderedSource};
use crate::lock::Validation;

/// What a search returns when the probe matches nothing.
///
/// An exact match satisfies every filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchFilter {
    /// The greatest element strictly before the sought value.
    Less,
    /// As `Less`, falling back to `Greater` when nothing precedes.
    PreferLess,
    /// Exact matches only.
    OnlyMatch,
    /// As `Greater`, falling back to `Less` when nothing follows.
    PreferGreater,
    /// The least element strictly after the sought value.
    Greater,
}

/// First index in `frame` whose element does not satisfy `predicate`.
///
/// The frame must be partitioned by `predicate`. Missing slots of a torn
/// frame count as not satisfying it.
pub fn partition_point<T>(
    frame: &(impl Frame<T> + ?Sized),
    mut predicate: impl FnMut(&T) -> bool,
) -> usize {
    bisect(0..frame.len(), |index| {
        frame
            .slot(index)
            .is_some_and(|slot| predicate(slot.value()))
    })
}

/// First index of `range` for which `holds` is false.
fn bisect(range: Range<usize>, mut holds: impl FnMut(usize) -> bool) -> usize {
    let Range {
        start: mut low,
        end: mut high,
    } = range;
    while low < high {
        let middle = low + (high - low) / 2;
        if holds(middle) {
            low = middle + 1;
        } else {
            high = middle;
        }
    }
    low
}

/// Index range of the elements `probe` answers `Equal` for.
///
/// An empty range starts at the insertion point.
pub fn equal_range<T>(
    frame: &(impl Frame<T> + ?Sized),
    probe: &impl Fn(&T) -> Ordering,
) -> Range<usize> {
    equal_range_within(frame, probe, 0..frame.len())
}

/// Windows at most this long are scanned linearly.
const LINEAR_WINDOW: usize = 16;

/// As [`equal_range`], restricted to `window`.
pub(crate) fn equal_range_within<T>(
    frame: &(impl Frame<T> + ?Sized),
    probe: &impl Fn(&T) -> Ordering,
    window: Range<usize>,
) -> Range<usize> {
    let end = window.end.min(frame.len());
    let start = window.start.min(end);
    let ordering = |index: usize| frame.slot(index).map(|slot| probe(slot.value()));
    if end - start <= LINEAR_WINDOW {
        let lower = (start..end)
            .find(|&index| ordering(index) != Some(Ordering::Greater))
            .unwrap_or(end);
        let upper = (lower..end)
            .find(|&index| ordering(index) != Some(Ordering::Equal))
            .unwrap_or(end);
        return lower..upper;
    }
    let lower = bisect(start..end, |index| ordering(index) == Some(Ordering::Greater));
    let upper = bisect(lower..end, |index| ordering(index) == Some(Ordering::Equal));
    lower..upper
}

/// Resolves a search to an index according to `filter`.
pub fn search_index<T>(
    frame: &(impl Frame<T> + ?Sized),
    probe: &impl Fn(&T) -> Ordering,
    filter: SearchFilter,
) -> Option<usize> {
    let len = frame.len();
    let Range { start, end } = equal_range(frame, probe);
    if start < end {
        return Some(start);
    }
    let below = start.checked_sub(1);
    let above = (end < len).then_some(end);
    match filter {
        SearchFilter::OnlyMatch => None,
        SearchFilter::Less => below,
        SearchFilter::Greater => above,
        SearchFilter::PreferLess => below.or(above),
        SearchFilter::PreferGreater => above.or(below),
    }
}

/// Index of the first match as `Ok`, or the insertion point as `Err`.
///
/// # Errors
///
/// `Err(insertion_point)` when nothing matches.
pub fn index_for<T>(
    frame: &(impl Frame<T> + ?Sized),
    probe: &impl Fn(&T) -> Ordering,
) -> Result<usize, usize> {
    let Range { start, end } = equal_range(frame, probe);
    if start < end { Ok(start) } else { Err(start) }
}

// =============================================================================
// Capability traits
// =============================================================================

/// An ordered source whose elements are sorted by a known comparison.
pub trait SortedSource<T>: OrderedSource<T> {
    /// The governing comparison.
    fn compare(&self, left: &T, right: &T) -> Ordering;

    /// Returns `true` if equal elements are rejected.
    fn is_distinct(&self) -> bool;
}

/// Searches available on every [`SortedSource`].
pub trait SortedAccess<T>: SortedSource<T> {
    /// Element selected by `probe` and `filter`. O(log n).
    fn search(&self, probe: impl Fn(&T) -> Ordering, filter: SearchFilter) -> Option<Element<T>>
    where
        T: Clone,
    {
        let slot = self.read(Validation::Values, |frame| {
            search_index(frame, &probe, filter)
                .and_then(|index| frame.slot(index))
                .map(|slot| (frame.handle_of(&slot), slot))
        });
        slot.map(|(handle, slot)| Element {
            handle,
            value: slot.value().clone(),
        })
    }

    /// Index of the first element `probe` matches, or the insertion point.
    ///
    /// # Errors
    ///
    /// `Err(insertion_point)` when nothing matches.
    fn index_for(&self, probe: impl Fn(&T) -> Ordering) -> Result<usize, usize> {
        self.read(Validation::Values, |frame| index_for(frame, &probe))
    }

    /// First element equal to `value` under the governing comparison.
    fn find(&self, value: &T) -> Option<Element<T>>
    where
        T: Clone,
    {
        self.search(|candidate| self.compare(value, candidate), SearchFilter::OnlyMatch)
    }

    /// Returns `true` if an element equal to `value` is present. O(log n).
    fn contains_value(&self, value: &T) -> bool {
        self.index_for(|candidate| self.compare(value, candidate))
            .is_ok()
    }

    /// Number of elements equal to `value`.
    fn count_of(&self, value: &T) -> usize {
        self.read(Validation::Values, |frame| {
            equal_range(frame, &|candidate: &T| self.compare(value, candidate)).len()
        })
    }
}

impl<T, S: SortedSource<T> + ?Sized> SortedAccess<T> for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Veto;
    use crate::frame::Slot;
    use crate::handle::Handle;
    use rstest::rstest;
    use std::sync::Arc;

    /// Detached frame over plain values.
    struct Values(Vec<Arc<Slot<i32>>>);

    impl Values {
        fn of(values: &[i32]) -> Self {
            let store: crate::store::OrderedStore<i32> = values.iter().copied().collect();
            let writer = store.write(false);
            Self((0..writer.len()).filter_map(|index| writer.slot(index)).collect())
        }
    }

    impl Frame<i32> for Values {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn slot(&self, index: usize) -> Option<Arc<Slot<i32>>> {
            self.0.get(index).cloned()
        }

        fn locate(&self, _: &Handle) -> Result<usize, Veto> {
            Err(Veto::WrongCollection)
        }
    }

    fn probe(sought: i32) -> impl Fn(&i32) -> Ordering {
        move |candidate| sought.cmp(candidate)
    }

    #[rstest]
    #[case::less(SearchFilter::Less, Some(1))]
    #[case::greater(SearchFilter::Greater, Some(2))]
    #[case::only_match(SearchFilter::OnlyMatch, None)]
    #[case::prefer_less(SearchFilter::PreferLess, Some(1))]
    #[case::prefer_greater(SearchFilter::PreferGreater, Some(2))]
    fn test_filters_between_elements(#[case] filter: SearchFilter, #[case] expected: Option<usize>) {
        let frame = Values::of(&[1, 3, 5, 7]);
        assert_eq!(search_index(&frame, &probe(4), filter), expected);
    }

    #[rstest]
    #[case(SearchFilter::Less)]
    #[case(SearchFilter::PreferLess)]
    #[case(SearchFilter::OnlyMatch)]
    #[case(SearchFilter::PreferGreater)]
    #[case(SearchFilter::Greater)]
    fn test_exact_match_satisfies_every_filter(#[case] filter: SearchFilter) {
        let frame = Values::of(&[1, 3, 5, 7]);
        assert_eq!(search_index(&frame, &probe(3), filter), Some(1));
    }

    #[rstest]
    #[case::below_all(0, SearchFilter::Less, None)]
    #[case::below_all_prefer(0, SearchFilter::PreferLess, Some(0))]
    #[case::above_all(9, SearchFilter::Greater, None)]
    #[case::above_all_prefer(9, SearchFilter::PreferGreater, Some(3))]
    fn test_prefer_falls_back_at_the_ends(
        #[case] sought: i32,
        #[case] filter: SearchFilter,
        #[case] expected: Option<usize>,
    ) {
        let frame = Values::of(&[1, 3, 5, 7]);
        assert_eq!(search_index(&frame, &probe(sought), filter), expected);
    }

    #[rstest]
    fn test_empty_frame_yields_nothing() {
        let frame = Values::of(&[]);
        for filter in [
            SearchFilter::Less,
            SearchFilter::PreferLess,
            SearchFilter::OnlyMatch,
            SearchFilter::PreferGreater,
            SearchFilter::Greater,
        ] {
            assert_eq!(search_index(&frame, &probe(1), filter), None);
        }
    }

    #[rstest]
    fn test_equal_range_spans_duplicates() {
        let frame = Values::of(&[1, 2, 2, 2, 3]);
        assert_eq!(equal_range(&frame, &probe(2)), 1..4);
        assert_eq!(equal_range(&frame, &probe(0)), 0..0);
        assert_eq!(index_for(&frame, &probe(2)), Ok(1));
        assert_eq!(index_for(&frame, &probe(4)), Err(5));
    }

    #[rstest]
    fn test_equal_range_within_large_and_small_windows() {
        let values: Vec<i32> = (0..100).map(|value| value / 4).collect();
        let frame = Values::of(&values);
        assert_eq!(equal_range_within(&frame, &probe(10), 0..100), 40..44);
        assert_eq!(equal_range_within(&frame, &probe(10), 38..50), 40..44);
        assert_eq!(equal_range_within(&frame, &probe(10), 42..50), 42..44);
        assert_eq!(equal_range_within(&frame, &probe(11), 0..10), 10..10);
    }
}
