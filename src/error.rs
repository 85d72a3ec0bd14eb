//! Error and veto types.
//!
//! Every mutating operation has a `can_*` counterpart that reports a [`Veto`]
//! before anything is touched. The acting operation fails with a
//! [`CollectionError`] only when the caller skipped the check, or when the
//! collection changed between the check and the act.
//!
//! # Examples
//!
//! ```rust
//! use stable_order::error::{CollectionError, Veto};
//!
//! let error: CollectionError = Veto::Duplicate.into();
//! assert!(error.is_illegal_element());
//! ```

use crate::config::ConfigError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CollectionError>;

/// Which side of a bounded range a value falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangePosition {
    /// The value precedes the lower bound.
    Below,
    /// The value is inside the range.
    Within,
    /// The value follows the upper bound.
    Above,
}

/// Reason a mutation would be refused.
///
/// Returned by `can_add`, `can_remove` and `can_move`. Converting a veto into
/// a [`CollectionError`] keeps the distinction between "try another value"
/// (illegal element) and "this kind of mutation is never accepted here"
/// (unsupported).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Veto {
    /// The value lies outside a bounded view.
    #[error("value is {0:?} the range of this view")]
    OutOfRange(RangePosition),
    /// An equal value already exists in a collection that enforces uniqueness.
    #[error("an equal value is already present")]
    Duplicate,
    /// The target position would break the collection's ordering.
    #[error("position conflicts with the collection's ordering")]
    OrderViolation,
    /// The collection refuses this class of mutation entirely.
    #[error("{0} is not supported by this collection")]
    Unsupported(&'static str),
    /// The handle refers to an element that has been removed.
    #[error("element is no longer present")]
    StaleHandle,
    /// The handle was minted by a different collection.
    #[error("handle belongs to another collection")]
    WrongCollection,
    /// The position hints are inverted or otherwise unusable.
    #[error("invalid position hint: {0}")]
    InvalidHint(&'static str),
}

/// Errors reported by collection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// A logical index was outside `0..len` (or `0..=len` for insertion).
    #[error("index {index} out of range for length {len}")]
    IndexOutOfBounds {
        /// The rejected index.
        index: usize,
        /// The length at the time of the call.
        len: usize,
    },
    /// The value cannot live in this collection at the requested place.
    #[error("illegal element: {0}")]
    IllegalElement(Veto),
    /// An argument was malformed independently of collection contents.
    #[error("illegal argument: {0}")]
    IllegalArgument(Veto),
    /// The collection refuses this class of mutation.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// The handle's element has been removed.
    #[error("stale handle: element is no longer present")]
    StaleHandle,
    /// The store configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CollectionError {
    /// Returns `true` for errors where a different value might succeed.
    #[must_use]
    pub const fn is_illegal_element(&self) -> bool {
        matches!(self, Self::IllegalElement(_))
    }

    /// Returns `true` when the whole class of mutation is refused.
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }

    /// Returns `true` when a handle was used after its element was removed.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleHandle)
    }
}

impl From<Veto> for CollectionError {
    fn from(veto: Veto) -> Self {
        match veto {
            Veto::OutOfRange(_) | Veto::Duplicate | Veto::OrderViolation => {
                Self::IllegalElement(veto)
            }
            Veto::WrongCollection | Veto::InvalidHint(_) => Self::IllegalArgument(veto),
            Veto::Unsupported(operation) => Self::Unsupported(operation),
            Veto::StaleHandle => Self::StaleHandle,
        }
    }
}
