//! Capability traits shared by stores, sorted lists and views.
//!
//! A [`Frame`] is one consistent look at an ordered collection: a length, the
//! slots at each index, and a way to resolve a [`Handle`] to an index. Every
//! collection is an [`OrderedSource`]: it knows how to produce a frame and run
//! a closure against it, optimistically or under its read guard. Everything a
//! reader can ask of an ordered collection is then written once, as default
//! methods of [`OrderedAccess`], and works the same on a store, a sorted list,
//! or any view stacked on top of them.
//!
//! ```text
//!   OrderedSource ──read(f)──► Frame ── len / slot(i) / locate(h)
//!        │
//!        └── OrderedAccess (blanket): get, handle_at, index_of, cursor, ...
//! ```

use std::fmt;
use std::sync::Arc;

use crate::cursor::{Cursor, Direction};
use crate::error::{CollectionError, Result, Veto};
use crate::handle::{CollectionId, Handle, HandleCell};
use crate::lock::Validation;

/// One element's storage: its value and its identity cell.
pub struct Slot<T> {
    value: T,
    cell: Arc<HandleCell>,
}

impl<T> Slot<T> {
    pub(crate) const fn new(value: T, cell: Arc<HandleCell>) -> Self {
        Self { value, cell }
    }

    /// The stored value.
    #[inline]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// A handle to this element in its own collection's orientation.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Handle {
        Handle::from_cell(Arc::clone(&self.cell))
    }

    #[inline]
    pub(crate) const fn cell(&self) -> &Arc<HandleCell> {
        &self.cell
    }

    /// A new slot for the same element holding `value`.
    pub(crate) fn with_value(&self, value: T) -> Self {
        Self {
            value,
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone> Slot<T> {
    /// Takes the value out of a shared slot, cloning only if a reader still
    /// holds the slot.
    pub(crate) fn into_value(slot: Arc<Self>) -> T {
        Arc::try_unwrap(slot).map_or_else(|shared| shared.value.clone(), |slot| slot.value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("Slot").field(&self.value).finish()
    }
}

/// A value paired with the handle that identifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element<T> {
    /// Identity of the element.
    pub handle: Handle,
    /// Value at the time of the read.
    pub value: T,
}

/// A consistent look at an ordered collection.
///
/// Frames handed to [`OrderedSource::read`] closures may be torn on attempts
/// that later fail validation. Implementations never panic on torn input;
/// they return `None` or an error instead.
pub trait Frame<T> {
    /// Number of elements.
    fn len(&self) -> usize;

    /// Returns `true` if there are no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The slot at `index`, or `None` past the end.
    fn slot(&self, index: usize) -> Option<Arc<Slot<T>>>;

    /// Index of the element behind `handle`.
    ///
    /// # Errors
    ///
    /// `WrongCollection` for foreign or wrongly oriented handles,
    /// `StaleHandle` for removed elements, `OutOfRange` for elements a
    /// bounded frame excludes.
    fn locate(&self, handle: &Handle) -> std::result::Result<usize, Veto>;

    /// Returns `true` if this frame presents its parent in reverse.
    fn is_flipped(&self) -> bool {
        false
    }

    /// The handle for `slot` in this frame's orientation.
    fn handle_of(&self, slot: &Slot<T>) -> Handle {
        let handle = slot.handle();
        if self.is_flipped() {
            handle.flipped()
        } else {
            handle
        }
    }
}

/// Anything that can run a read against a consistent [`Frame`].
pub trait OrderedSource<T> {
    /// Identity used for handle exchange.
    fn collection_id(&self) -> CollectionId;

    /// Runs `read` against a frame that is consistent under `validation`.
    ///
    /// The closure may run more than once; only the result of the validated
    /// run is returned.
    fn read<R>(&self, validation: Validation, read: impl FnMut(&dyn Frame<T>) -> R) -> R;
}

/// Read operations available on every [`OrderedSource`].
pub trait OrderedAccess<T>: OrderedSource<T> {
    /// Number of elements.
    fn len(&self) -> usize {
        self.read(Validation::Structural, |frame| frame.len())
    }

    /// Returns `true` if there are no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len`.
    fn get(&self, index: usize) -> Result<T>
    where
        T: Clone,
    {
        self.element(index).map(|element| element.value)
    }

    /// Value and handle at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len`.
    fn element(&self, index: usize) -> Result<Element<T>>
    where
        T: Clone,
    {
        let (slot, handle) = self
            .read(Validation::Structural, |frame| {
                frame
                    .slot(index)
                    .map(|slot| {
                        let handle = frame.handle_of(&slot);
                        (slot, handle)
                    })
                    .ok_or(CollectionError::IndexOutOfBounds {
                        index,
                        len: frame.len(),
                    })
            })?;
        Ok(Element {
            handle,
            value: slot.value().clone(),
        })
    }

    /// Handle of the element at `index`.
    ///
    /// # Errors
    ///
    /// `IndexOutOfBounds` if `index >= len`.
    fn handle_at(&self, index: usize) -> Result<Handle> {
        self.read(Validation::Structural, |frame| {
            frame
                .slot(index)
                .map(|slot| frame.handle_of(&slot))
                .ok_or(CollectionError::IndexOutOfBounds {
                    index,
                    len: frame.len(),
                })
        })
    }

    /// First value, if any.
    fn first(&self) -> Option<T>
    where
        T: Clone,
    {
        self.read(Validation::Structural, |frame| frame.slot(0))
            .map(|slot| slot.value().clone())
    }

    /// Last value, if any.
    fn last(&self) -> Option<T>
    where
        T: Clone,
    {
        self.read(Validation::Structural, |frame| {
            frame.len().checked_sub(1).and_then(|index| frame.slot(index))
        })
        .map(|slot| slot.value().clone())
    }

    /// Current index of the element behind `handle`.
    ///
    /// # Errors
    ///
    /// `StaleHandle` if the element was removed, `IllegalArgument` for a
    /// handle from another collection, `IllegalElement` for an element
    /// outside a view's bounds.
    fn index_of(&self, handle: &Handle) -> Result<usize> {
        self.read(Validation::Structural, |frame| frame.locate(handle))
            .map_err(CollectionError::from)
    }

    /// Current value of the element behind `handle`.
    ///
    /// # Errors
    ///
    /// As for [`index_of`](Self::index_of).
    fn value_of(&self, handle: &Handle) -> Result<T>
    where
        T: Clone,
    {
        self.read(Validation::Structural, |frame| {
            frame
                .locate(handle)
                .map_err(CollectionError::from)
                .and_then(|index| frame.slot(index).ok_or(CollectionError::StaleHandle))
        })
        .map(|slot| slot.value().clone())
    }

    /// Returns `true` if `handle` resolves to an element visible here.
    fn contains_handle(&self, handle: &Handle) -> bool {
        self.index_of(handle).is_ok()
    }

    /// Index of the first element equal to `value`. Linear scan.
    fn position_of(&self, value: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.read(Validation::Values, |frame| {
            (0..frame.len()).find(|&index| {
                frame
                    .slot(index)
                    .is_some_and(|slot| slot.value() == value)
            })
        })
    }

    /// Returns `true` if an element equal to `value` is present. Linear scan.
    fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.position_of(value).is_some()
    }

    /// All values, from one consistent frame.
    fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let slots = self.read(Validation::Values, |frame| {
            (0..frame.len())
                .filter_map(|index| frame.slot(index))
                .collect::<Vec<_>>()
        });
        slots.iter().map(|slot| slot.value().clone()).collect()
    }

    /// Front-to-back cursor.
    fn cursor(&self) -> Cursor<'_, T, Self>
    where
        Self: Sized,
    {
        Cursor::new(self, Direction::Forward)
    }

    /// Back-to-front cursor.
    fn cursor_back(&self) -> Cursor<'_, T, Self>
    where
        Self: Sized,
    {
        Cursor::new(self, Direction::Backward)
    }
}

impl<T, S: OrderedSource<T> + ?Sized> OrderedAccess<T> for S {}
