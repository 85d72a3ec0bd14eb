//! # stable-order
//!
//! Ordered collections whose elements keep a stable identity while the
//! collection around them changes, readable concurrently without blocking.
//!
//! ## Overview
//!
//! - **Handles**: every insertion returns a [`Handle`](handle::Handle) that
//!   keeps resolving to the same element through shifts, growth and moves,
//!   and reports itself absent once the element leaves the collection.
//! - **Ordered store**: [`OrderedStore`](store::OrderedStore) is a ring
//!   buffer with O(1) insertion at both ends, block moves that shift the
//!   shorter side, and an optional fixed capacity that evicts on overflow.
//! - **Sorted list**: [`SortedList`](sorted::SortedList) keeps its elements
//!   ordered by a [`Comparator`](sorted::Comparator), with binary search,
//!   bounded and reversed views, and repair of broken order.
//! - **Optimistic reads**: readers run against a stamp-validated snapshot and
//!   take the shared lock only after repeated interference.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────────┐
//!                 │  View (bounds, reversal)  │
//!                 └─────────────┬─────────────┘
//!                               │
//!                 ┌─────────────▼─────────────┐
//!                 │  SortedList + repair      │
//!                 └─────────────┬─────────────┘
//!                               │
//!   ┌──────────┐  ┌─────────────▼─────────────┐  ┌──────────────┐
//!   │  Handle  │◄─┤  OrderedStore (ring)      ├─►│ CollectionLock│
//!   └──────────┘  └───────────────────────────┘  └──────────────┘
//! ```
//!
//! ## Feature Flags
//!
//! - `sorted` (default): [`SortedList`](sorted::SortedList), views and repair
//! - `serde`: `Serialize`/`Deserialize` for [`StoreConfig`](config::StoreConfig)
//! - `full`: every feature
//!
//! ## Example
//!
//! ```rust
//! use stable_order::prelude::*;
//!
//! let store = OrderedStore::new();
//! let middle = store.push_back("b");
//! store.push_front("a");
//! store.push_back("c");
//!
//! assert_eq!(store.index_of(&middle).unwrap(), 1);
//! store.remove(0).unwrap();
//! assert_eq!(store.index_of(&middle).unwrap(), 0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use stable_order::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigError, StoreConfig, StoreConfigBuilder};
    pub use crate::cursor::{Cursor, Direction};
    pub use crate::error::{CollectionError, RangePosition, Result, Veto};
    pub use crate::frame::{Element, Frame, OrderedAccess, OrderedSource};
    pub use crate::handle::{CollectionId, Handle, HandleExchange};
    pub use crate::lock::Validation;
    pub use crate::search::{SearchFilter, SortedAccess, SortedSource};
    pub use crate::store::{OrderedStore, StoreReader, StoreWriter};

    #[cfg(feature = "sorted")]
    pub use crate::repair::{RepairEvent, RepairListener, RepairReport};
    #[cfg(feature = "sorted")]
    pub use crate::sorted::{Admission, Comparator, NaturalOrder, SortedList, SortedMutable, SortedWriter};
    #[cfg(feature = "sorted")]
    pub use crate::view::{View, ViewBounds};
}

pub mod config;
pub mod cursor;
pub mod error;
pub mod frame;
pub mod handle;
pub mod lock;
pub mod search;
pub mod store;

#[cfg(feature = "sorted")]
pub mod repair;

#[cfg(feature = "sorted")]
pub mod sorted;

#[cfg(feature = "sorted")]
pub mod view;
