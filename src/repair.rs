//! Consistency checks and repair for sorted lists.
//!
//! Bulk edits, in-place updates that change a sort key, or bugs in a layer
//! above can leave a [`SortedList`] out of order, or with equal elements in a
//! distinct list. [`SortedList::check_consistency`] finds out in O(n);
//! [`SortedList::repair`] restores the order.
//!
//! # Algorithm
//!
//! A global repair keeps the longest run of elements that is already ordered
//! (strictly, for distinct lists) where it is, and reinserts every other
//! element at its sorted position. The [`RepairListener`] hears at most once
//! about each reinserted element:
//!
//! - `transferred(handle, value, from, to)` when it was kept and its index
//!   changed (an element can land back on its old index once the elements
//!   around it have moved, and is then not reported);
//! - `removed(handle, value, from)` then `disposed(value)` when a distinct
//!   list already held an equal value and the element was dropped.
//!
//! Repairing a consistent list moves nothing and calls the listener never.
//! Listener callbacks run under the write guard. They may read the list but
//! must not try to write it.
//!
//! # Examples
//!
//! ```rust
//! use stable_order::prelude::*;
//!
//! let list: SortedList<i32> = [1, 2, 3, 4].into_iter().collect();
//! let first = list.handle_at(0).unwrap();
//! list.update_in_place(&first, |value| *value = 9).unwrap();
//! assert!(!list.check_consistency());
//!
//! let mut events: Vec<RepairEvent<i32>> = Vec::new();
//! let report = list.repair(None, &mut events).unwrap();
//! assert_eq!(report.transferred, 1);
//! assert_eq!(list.to_vec(), vec![2, 3, 4, 9]);
//! assert_eq!(list.index_of(&first).unwrap(), 3);
//! assert!(list.repair(None, &mut ()).unwrap().is_clean());
//! ```

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{CollectionError, Result};
use crate::frame::{Frame, OrderedSource, Slot};
use crate::handle::Handle;
use crate::lock::Validation;
use crate::search::SortedSource;
use crate::sorted::{Comparator, SortedList, SortedWriter, check_frame};

// =============================================================================
// Listener
// =============================================================================

/// Receives one notification per element a repair relocates or drops.
///
/// All methods default to doing nothing.
pub trait RepairListener<T> {
    /// The element behind `handle` moved from index `from` to index `to`.
    fn transferred(&mut self, _handle: &Handle, _value: &T, _from: usize, _to: usize) {}

    /// The element behind `handle`, formerly at `from`, was dropped. Its
    /// handle is already absent.
    fn removed(&mut self, _handle: &Handle, _value: &T, _from: usize) {}

    /// Takes ownership of a dropped value. Always follows `removed`.
    fn disposed(&mut self, _value: T) {}
}

impl<T> RepairListener<T> for () {}

/// A recorded listener notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairEvent<T> {
    /// See [`RepairListener::transferred`].
    Transferred {
        /// The relocated element.
        handle: Handle,
        /// Its value.
        value: T,
        /// Index before the repair.
        from: usize,
        /// Index after the repair.
        to: usize,
    },
    /// See [`RepairListener::removed`].
    Removed {
        /// The dropped element.
        handle: Handle,
        /// Its value.
        value: T,
        /// Index before the repair.
        from: usize,
    },
    /// See [`RepairListener::disposed`].
    Disposed(T),
}

impl<T: Clone> RepairListener<T> for Vec<RepairEvent<T>> {
    fn transferred(&mut self, handle: &Handle, value: &T, from: usize, to: usize) {
        self.push(RepairEvent::Transferred {
            handle: handle.clone(),
            value: value.clone(),
            from,
            to,
        });
    }

    fn removed(&mut self, handle: &Handle, value: &T, from: usize) {
        self.push(RepairEvent::Removed {
            handle: handle.clone(),
            value: value.clone(),
            from,
        });
    }

    fn disposed(&mut self, value: T) {
        self.push(RepairEvent::Disposed(value));
    }
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Elements found out of place.
    pub violations: usize,
    /// Elements that ended at a different index.
    pub transferred: usize,
    /// Elements dropped because an equal value was already present.
    pub removed: usize,
}

impl RepairReport {
    /// Returns `true` if nothing was out of place.
    #[inline]
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.violations == 0
    }
}

// =============================================================================
// SortedList entry points
// =============================================================================

impl<T: Clone, C: Comparator<T>> SortedList<T, C> {
    /// Returns `true` if the element behind `handle` is ordered with respect
    /// to its neighbours. O(1).
    ///
    /// # Errors
    ///
    /// `StaleHandle` or `IllegalArgument` for unusable handles.
    pub fn is_consistent(&self, handle: &Handle) -> Result<bool> {
        self.read(Validation::Values, |frame| {
            frame
                .locate(handle)
                .map(|index| self.consistent_at(frame, index))
        })
        .map_err(CollectionError::from)
    }

    /// Returns `true` if every adjacent pair is ordered. O(n).
    pub fn check_consistency(&self) -> bool {
        self.read(Validation::Values, |frame| check_frame(self, frame))
    }

    /// Restores the order, globally or for the element behind `scope`.
    ///
    /// # Errors
    ///
    /// Handle errors for an unusable `scope`.
    pub fn repair(
        &self,
        scope: Option<&Handle>,
        listener: &mut dyn RepairListener<T>,
    ) -> Result<RepairReport> {
        self.write().repair(scope, listener)
    }
}

// =============================================================================
// Repair under the write guard
// =============================================================================

impl<T: Clone, C: Comparator<T>> SortedWriter<'_, T, C> {
    /// See [`SortedList::repair`].
    ///
    /// # Errors
    ///
    /// Handle errors for an unusable `scope`.
    pub fn repair(
        &mut self,
        scope: Option<&Handle>,
        listener: &mut dyn RepairListener<T>,
    ) -> Result<RepairReport> {
        let report = match scope {
            Some(handle) => self.repair_element(handle, listener)?,
            None => self.repair_all(listener),
        };
        if report.is_clean() {
            tracing::debug!("repair found the list consistent");
        } else {
            tracing::info!(
                violations = report.violations,
                transferred = report.transferred,
                removed = report.removed,
                "repaired sorted list"
            );
        }
        if report.removed > 0 {
            tracing::warn!(removed = report.removed, "repair dropped duplicate elements");
        }
        Ok(report)
    }

    fn repair_all(&mut self, listener: &mut dyn RepairListener<T>) -> RepairReport {
        let list = self.list();
        let slots: Vec<Arc<Slot<T>>> = (0..self.inner.len())
            .filter_map(|index| self.inner.slot(index))
            .collect();
        let kept = longest_ordered_run(&slots, |left, right| list.fits(left, right));
        let misplaced: SmallVec<[usize; 8]> = (0..slots.len()).filter(|&index| !kept[index]).collect();
        drop(slots);
        if misplaced.is_empty() {
            return RepairReport::default();
        }
        let mut detached: SmallVec<[(usize, Arc<Slot<T>>); 8]> = misplaced
            .iter()
            .rev()
            .filter_map(|&index| self.inner.detach(index).map(|slot| (index, slot)))
            .collect();
        detached.reverse();

        let mut report = RepairReport {
            violations: misplaced.len(),
            ..RepairReport::default()
        };
        let mut moved: SmallVec<[(usize, Arc<Slot<T>>); 8]> = SmallVec::new();
        for (from, slot) in detached {
            if let Some(slot) = self.reinsert(from, slot, listener, &mut report) {
                moved.push((from, slot));
            }
        }
        for (from, slot) in moved {
            self.report_transfer(from, &slot, listener, &mut report);
        }
        report
    }

    fn repair_element(
        &mut self,
        handle: &Handle,
        listener: &mut dyn RepairListener<T>,
    ) -> Result<RepairReport> {
        let index = self.inner.locate(handle)?;
        if self.list().consistent_at(&self.inner, index) {
            return Ok(RepairReport::default());
        }
        let slot = self
            .inner
            .detach(index)
            .ok_or(CollectionError::StaleHandle)?;
        let mut report = RepairReport {
            violations: 1,
            ..RepairReport::default()
        };
        if let Some(slot) = self.reinsert(index, slot, listener, &mut report) {
            self.report_transfer(index, &slot, listener, &mut report);
        }
        Ok(report)
    }

    /// Puts a detached element back at its sorted position, or drops it if a
    /// distinct list already holds an equal value. Returns the slot if it was
    /// kept.
    fn reinsert(
        &mut self,
        from: usize,
        slot: Arc<Slot<T>>,
        listener: &mut dyn RepairListener<T>,
        report: &mut RepairReport,
    ) -> Option<Arc<Slot<T>>> {
        let range = self.equal_range(slot.value());
        if self.list().is_distinct() && !range.is_empty() {
            let handle = slot.handle();
            slot.cell().invalidate();
            listener.removed(&handle, slot.value(), from);
            listener.disposed(Slot::into_value(slot));
            report.removed += 1;
            return None;
        }
        self.inner.attach(range.end, Arc::clone(&slot));
        Some(slot)
    }

    fn report_transfer(
        &self,
        from: usize,
        slot: &Slot<T>,
        listener: &mut dyn RepairListener<T>,
        report: &mut RepairReport,
    ) {
        let handle = slot.handle();
        let to = self.inner.locate(&handle).unwrap_or(from);
        if to == from {
            return;
        }
        listener.transferred(&handle, slot.value(), from, to);
        report.transferred += 1;
    }
}

/// Marks the elements of a longest subsequence whose consecutive members
/// satisfy `fits`. O(n log n) patience sorting.
fn longest_ordered_run<T>(slots: &[Arc<Slot<T>>], fits: impl Fn(&T, &T) -> bool) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut previous: Vec<Option<usize>> = vec![None; slots.len()];
    for (index, slot) in slots.iter().enumerate() {
        let position = tails.partition_point(|&tail| fits(slots[tail].value(), slot.value()));
        previous[index] = position.checked_sub(1).map(|before| tails[before]);
        if position == tails.len() {
            tails.push(index);
        } else {
            tails[position] = index;
        }
    }
    let mut kept = vec![false; slots.len()];
    let mut cursor = tails.last().copied();
    while let Some(index) = cursor {
        kept[index] = true;
        cursor = previous[index];
    }
    kept
}
