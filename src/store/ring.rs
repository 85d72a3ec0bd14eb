//! Ring-buffer core: index translation, block shifts, growth and compaction.
//!
//! Logical index `i` lives at physical index `(offset + i) % capacity`.
//!
//! ```text
//!   capacity = 8, offset = 6, len = 5
//!   physical:  0   1   2   3   4   5   6   7
//!            [ c   d   e   .   .   .   a   b ]
//!   logical:   2   3   4               0   1
//! ```
//!
//! Opening or closing a gap at logical index `k` moves whichever side of `k`
//! is shorter, so the work is `O(min(k, len - k))`. Every moved slot's
//! handle cell is renumbered by the distance it travelled.
//!
//! Only a [`StoreWriter`] calls into this module, so plain loads of the
//! shared atomics see the writer's own latest stores.

use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::Ordering::{Relaxed, Release};

use arc_swap::ArcSwapOption;

use super::StoreWriter;
use crate::frame::Slot;
use crate::handle::HandleCell;

/// Contiguous run of a block move: `count` slots from `source` to `target`,
/// neither of which crosses the end of the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Segment {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) count: usize,
}

/// Splits a move of `count` slots from physical `source` to physical
/// `target` into runs that do not wrap, in ascending logical order.
pub(super) fn segments(
    source: usize,
    target: usize,
    count: usize,
    capacity: usize,
) -> SmallVec<[Segment; 3]> {
    let mut runs = SmallVec::new();
    if count == 0 {
        return runs;
    }
    let source_wraps = source + count > capacity;
    let target_wraps = target + count > capacity;
    match (source_wraps, target_wraps) {
        (false, false) => runs.push(Segment {
            source,
            target,
            count,
        }),
        (true, false) => {
            let head = capacity - source;
            runs.push(Segment {
                source,
                target,
                count: head,
            });
            runs.push(Segment {
                source: 0,
                target: target + head,
                count: count - head,
            });
        }
        (false, true) => {
            let head = capacity - target;
            runs.push(Segment {
                source,
                target,
                count: head,
            });
            runs.push(Segment {
                source: source + head,
                target: 0,
                count: count - head,
            });
        }
        (true, true) => {
            let source_head = capacity - source;
            let target_head = capacity - target;
            let first = source_head.min(target_head);
            runs.push(Segment {
                source,
                target,
                count: first,
            });
            if source_head < target_head {
                runs.push(Segment {
                    source: 0,
                    target: target + first,
                    count: target_head - first,
                });
                runs.push(Segment {
                    source: target_head - first,
                    target: 0,
                    count: count - target_head,
                });
            } else if target_head < source_head {
                runs.push(Segment {
                    source: source + first,
                    target: 0,
                    count: source_head - first,
                });
                runs.push(Segment {
                    source: 0,
                    target: source_head - first,
                    count: count - source_head,
                });
            } else {
                runs.push(Segment {
                    source: 0,
                    target: 0,
                    count: count - first,
                });
            }
        }
    }
    runs
}

pub(super) fn empty_slots<T>(capacity: usize) -> Box<[ArcSwapOption<Slot<T>>]> {
    (0..capacity).map(|_| ArcSwapOption::empty()).collect()
}

impl<T> StoreWriter<'_, T> {
    #[inline]
    pub(super) fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub(super) fn offset(&self) -> usize {
        self.store.offset.load(Relaxed)
    }

    #[inline]
    pub(super) fn count(&self) -> usize {
        self.store.len.load(Relaxed)
    }

    #[inline]
    pub(super) fn physical(&self, logical: usize) -> usize {
        (self.offset() + logical) % self.capacity()
    }

    #[inline]
    pub(super) fn slot_at(&self, logical: usize) -> Option<Arc<Slot<T>>> {
        if logical >= self.count() {
            return None;
        }
        self.buffer[self.physical(logical)].load_full()
    }

    /// Virtual position of logical index `logical`.
    #[inline]
    pub(super) fn virtual_position(&self, logical: usize) -> i64 {
        self.store.space.base() + to_delta(logical)
    }

    /// Moves `count` slots from physical `source` to physical `target`,
    /// renumbering each moved cell by `delta`. Safe for overlapping ranges in
    /// either direction.
    fn move_block(&self, source: usize, target: usize, count: usize, delta: i64) {
        let runs = segments(source, target, count, self.capacity());
        if delta > 0 {
            for run in runs.iter().rev() {
                for step in (0..run.count).rev() {
                    self.move_slot(run.source + step, run.target + step, delta);
                }
            }
        } else {
            for run in &runs {
                for step in 0..run.count {
                    self.move_slot(run.source + step, run.target + step, delta);
                }
            }
        }
    }

    fn move_slot(&self, source: usize, target: usize, delta: i64) {
        let slot = self.buffer[source].swap(None);
        if let Some(moved) = &slot {
            moved.cell().renumber(delta);
        }
        self.buffer[target].store(slot);
    }

    /// Makes `count` empty slots at logical `index`. Capacity must already be
    /// at least `len + count`.
    pub(super) fn open_gap(&self, index: usize, count: usize) {
        let len = self.count();
        let capacity = self.capacity();
        debug_assert!(len + count <= capacity);
        if count == 0 {
            return;
        }
        let offset = self.offset();
        if index < len - index {
            let new_offset = (offset + capacity - count % capacity) % capacity;
            self.move_block(offset, new_offset, index, -to_delta(count));
            self.store.offset.store(new_offset, Release);
            self.store.space.shift_base(-to_delta(count));
        } else {
            let source = (offset + index) % capacity;
            let target = (offset + index + count) % capacity;
            self.move_block(source, target, len - index, to_delta(count));
        }
        self.store.len.store(len + count, Release);
    }

    /// Removes the `count` slots starting at logical `index` and closes the
    /// gap. The returned slots keep their cells untouched.
    pub(super) fn close_gap(&self, index: usize, count: usize) -> SmallVec<[Arc<Slot<T>>; 4]> {
        let len = self.count();
        let capacity = self.capacity();
        debug_assert!(index + count <= len);
        let taken: SmallVec<[Arc<Slot<T>>; 4]> = (index..index + count)
            .filter_map(|logical| self.buffer[self.physical(logical)].swap(None))
            .collect();
        if count == 0 {
            return taken;
        }
        let offset = self.offset();
        let trailing = len - index - count;
        if index < trailing {
            let target = (offset + count) % capacity;
            self.move_block(offset, target, index, to_delta(count));
            self.store.offset.store(target, Release);
            self.store.space.shift_base(to_delta(count));
        } else {
            let source = (offset + index + count) % capacity;
            let target = (offset + index) % capacity;
            self.move_block(source, target, trailing, -to_delta(count));
        }
        self.store.len.store(len - count, Release);
        taken
    }

    /// Stores `slot` at logical `index`, which must be an open gap, and
    /// numbers its cell for that position.
    pub(super) fn fill(&self, index: usize, slot: Arc<Slot<T>>) {
        slot.cell().set_position(self.virtual_position(index));
        self.buffer[self.physical(index)].store(Some(slot));
    }

    /// Creates a new element at the open gap `index`.
    pub(super) fn place(&self, index: usize, value: T) -> Arc<HandleCell> {
        let cell = HandleCell::new(
            Arc::clone(&self.store.space),
            self.virtual_position(index),
        );
        let slot = Arc::new(Slot::new(value, Arc::clone(&cell)));
        self.buffer[self.physical(index)].store(Some(slot));
        cell
    }

    /// Grows the backing array so that `additional` more slots fit.
    pub(super) fn reserve(&mut self, additional: usize) {
        let needed = self.count() + additional;
        let capacity = self.capacity();
        if needed <= capacity {
            return;
        }
        let grown = self.store.config.grown_capacity(capacity, needed);
        debug_assert!(grown >= needed);
        tracing::debug!(from = capacity, to = grown, "growing ordered store");
        self.reallocate(grown);
    }

    /// Compacts the backing array when occupancy has fallen too low.
    pub(super) fn maybe_shrink(&mut self) {
        let capacity = self.capacity();
        if let Some(shrunk) = self
            .store
            .config
            .shrunk_capacity(capacity, self.count())
        {
            tracing::debug!(from = capacity, to = shrunk, "compacting ordered store");
            self.reallocate(shrunk);
        }
    }

    /// Copies the live slots, in logical order, to the start of a fresh
    /// array of `capacity` slots. Cells keep their virtual positions.
    pub(super) fn reallocate(&mut self, capacity: usize) {
        let len = self.count();
        debug_assert!(capacity >= len);
        let slots = empty_slots(capacity.max(1));
        for logical in 0..len {
            slots[logical].store(self.buffer[self.physical(logical)].load_full());
        }
        let buffer = Arc::new(super::Buffer { slots });
        self.store.buffer.store(Arc::clone(&buffer));
        self.store.offset.store(0, Release);
        self.buffer = buffer;
    }
}

#[inline]
pub(super) fn to_delta(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn expand(runs: &[Segment]) -> Vec<(usize, usize)> {
        runs.iter()
            .flat_map(|run| (0..run.count).map(move |step| (run.source + step, run.target + step)))
            .collect()
    }

    fn expected(source: usize, target: usize, count: usize, capacity: usize) -> Vec<(usize, usize)> {
        (0..count)
            .map(|step| ((source + step) % capacity, (target + step) % capacity))
            .collect()
    }

    #[rstest]
    #[case::neither_wraps(1, 3, 4, 8)]
    #[case::source_wraps(6, 1, 4, 8)]
    #[case::target_wraps(1, 6, 4, 8)]
    #[case::both_wrap_source_first(7, 5, 4, 8)]
    #[case::both_wrap_target_first(5, 7, 4, 8)]
    #[case::both_wrap_together(6, 6, 4, 8)]
    #[case::empty(3, 4, 0, 8)]
    fn test_segments_cover_block_without_wrapping(
        #[case] source: usize,
        #[case] target: usize,
        #[case] count: usize,
        #[case] capacity: usize,
    ) {
        let runs = segments(source, target, count, capacity);
        for run in &runs {
            assert!(run.source + run.count <= capacity);
            assert!(run.target + run.count <= capacity);
        }
        assert_eq!(expand(&runs), expected(source, target, count, capacity));
    }

    #[rstest]
    fn test_segments_exhaustive_small_ring() {
        let capacity = 5;
        for source in 0..capacity {
            for target in 0..capacity {
                for count in 0..=capacity {
                    let runs = segments(source, target, count, capacity);
                    assert!(runs.len() <= 3);
                    assert_eq!(expand(&runs), expected(source, target, count, capacity));
                }
            }
        }
    }
}
