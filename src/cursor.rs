//! Handle-anchored cursors.
//!
//! A cursor remembers the handle of the element it yielded last. Each step
//! is a separate validated read: the cursor resolves its anchor in a fresh
//! frame and moves one index from there. Concurrent inserts and removals
//! elsewhere therefore never make it skip or repeat an element that stayed in
//! place. If the anchor itself is removed, the cursor continues from the index
//! the anchor occupied.

use std::iter::FusedIterator;
use std::marker::PhantomData;

use crate::frame::{Element, OrderedSource};
use crate::handle::Handle;
use crate::lock::Validation;

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Index 0 towards the end.
    Forward,
    /// Last index towards 0.
    Backward,
}

/// Weakly consistent cursor over an [`OrderedSource`].
///
/// Every yielded [`Element`] existed, with that value, at some instant during
/// the step that produced it.
///
/// # Examples
///
/// ```rust
/// use stable_order::prelude::*;
///
/// let store: OrderedStore<i32> = (1..=3).collect();
/// let values: Vec<i32> = store.cursor_back().map(|element| element.value).collect();
/// assert_eq!(values, vec![3, 2, 1]);
/// ```
pub struct Cursor<'a, T, S: ?Sized> {
    source: &'a S,
    direction: Direction,
    anchor: Option<Handle>,
    resume: usize,
    finished: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, S: OrderedSource<T> + ?Sized> Cursor<'a, T, S> {
    pub(crate) const fn new(source: &'a S, direction: Direction) -> Self {
        Self {
            source,
            direction,
            anchor: None,
            resume: match direction {
                Direction::Forward => 0,
                Direction::Backward => usize::MAX,
            },
            finished: false,
            _marker: PhantomData,
        }
    }

    /// The direction this cursor walks in.
    #[inline]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Handle of the element yielded last.
    #[inline]
    pub const fn anchor(&self) -> Option<&Handle> {
        self.anchor.as_ref()
    }
}

impl<T: Clone, S: OrderedSource<T> + ?Sized> Iterator for Cursor<'_, T, S> {
    type Item = Element<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let direction = self.direction;
        let anchor = self.anchor.as_ref();
        let resume = self.resume;
        let step = self.source.read(Validation::Structural, |frame| {
            let target = match (anchor.map(|handle| frame.locate(handle)), direction) {
                (Some(Ok(index)), Direction::Forward) => index.checked_add(1),
                (Some(Ok(index)), Direction::Backward) => index.checked_sub(1),
                (_, Direction::Forward) => Some(resume),
                (_, Direction::Backward) => resume.min(frame.len()).checked_sub(1),
            }?;
            let slot = frame.slot(target)?;
            Some((target, frame.handle_of(&slot), slot))
        });
        let Some((index, handle, slot)) = step else {
            self.finished = true;
            return None;
        };
        self.resume = index;
        self.anchor = Some(handle.clone());
        Some(Element {
            handle,
            value: slot.value().clone(),
        })
    }
}

impl<T: Clone, S: OrderedSource<T> + ?Sized> FusedIterator for Cursor<'_, T, S> {}
