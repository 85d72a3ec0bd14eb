//! Locking discipline shared by every collection.
//!
//! A [`CollectionLock`] combines a `parking_lot` reader-writer gate with two
//! sequence stamps:
//!
//! - the **structural** stamp moves whenever element count or order changes;
//! - the **value** stamp moves on every write, including in-place updates.
//!
//! Both stamps are odd while a write section is open. An optimistic reader
//! records the stamps, reads without locking, and keeps its result only if the
//! stamps are unchanged afterwards. Readers that only depend on positions
//! validate the structural stamp; readers that also depend on values validate
//! both.
//!
//! ```text
//!   writer:  stamp=odd ─ fence ─ mutate ─ stamp=even
//!   reader:  s1=stamp ─ read ─ fence ─ s2=stamp ─ keep iff s1 == s2 && even
//! ```
//!
//! # Examples
//!
//! ```rust
//! use stable_order::lock::CollectionLock;
//!
//! let lock = CollectionLock::new();
//! let before = lock.stamps().structural();
//! {
//!     let _guard = lock.write(true);
//! }
//! assert_eq!(lock.stamps().structural(), before + 2);
//! ```

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::hint;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering, fence};

thread_local! {
    /// Stamps whose write section is open on this thread.
    static HELD_SECTIONS: RefCell<SmallVec<[usize; 4]>> = RefCell::new(SmallVec::new());
}

/// Pair of sequence stamps.
#[derive(Debug, Default)]
pub struct Stamps {
    structural: AtomicU64,
    values: AtomicU64,
}

impl Stamps {
    /// Current structural stamp.
    #[inline]
    pub fn structural(&self) -> u64 {
        self.structural.load(Ordering::Acquire)
    }

    /// Current value stamp.
    #[inline]
    pub fn values(&self) -> u64 {
        self.values.load(Ordering::Acquire)
    }

    /// Starts an optimistic read, or returns `None` if a write section that
    /// the reader would have to observe is open.
    #[inline]
    pub fn begin_read(&self) -> Option<OptimisticRead> {
        let structural = self.structural.load(Ordering::Acquire);
        let values = self.values.load(Ordering::Acquire);
        (structural & 1 == 0 && values & 1 == 0).then_some(OptimisticRead { structural, values })
    }

    fn key(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    /// Returns `true` if the current thread holds the write guard these
    /// stamps belong to. Reads on that thread see a stable state directly.
    pub(crate) fn held_here(&self) -> bool {
        let key = self.key();
        HELD_SECTIONS.with(|held| held.borrow().contains(&key))
    }

    fn enter(&self) {
        let key = self.key();
        HELD_SECTIONS.with(|held| held.borrow_mut().push(key));
    }

    fn leave(&self) {
        let key = self.key();
        HELD_SECTIONS.with(|held| {
            let mut held = held.borrow_mut();
            if let Some(position) = held.iter().rposition(|entry| *entry == key) {
                held.remove(position);
            }
        });
    }

    fn open(stamp: &AtomicU64) {
        stamp.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::Release);
    }

    fn close(stamp: &AtomicU64) {
        stamp.fetch_add(1, Ordering::Release);
    }
}

/// Token recorded at the start of an optimistic read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimisticRead {
    structural: u64,
    values: u64,
}

impl OptimisticRead {
    /// Returns `true` if no structural write happened since the token was taken.
    #[inline]
    #[must_use]
    pub fn validate(&self, stamps: &Stamps) -> bool {
        fence(Ordering::Acquire);
        stamps.structural.load(Ordering::Relaxed) == self.structural
    }

    /// Returns `true` if no write of any kind happened since the token was taken.
    #[inline]
    #[must_use]
    pub fn validate_values(&self, stamps: &Stamps) -> bool {
        fence(Ordering::Acquire);
        stamps.structural.load(Ordering::Relaxed) == self.structural
            && stamps.values.load(Ordering::Relaxed) == self.values
    }
}

/// How strictly an optimistic read must be validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Positions and count only.
    Structural,
    /// Positions, count, and values.
    Values,
}

/// Reader-writer gate plus sequence stamps.
#[derive(Debug, Default)]
pub struct CollectionLock {
    gate: RwLock<()>,
    stamps: Arc<Stamps>,
}

impl CollectionLock {
    /// Creates an unlocked gate with zeroed stamps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The stamps, shared with handles minted under this lock.
    #[inline]
    pub fn stamps(&self) -> &Arc<Stamps> {
        &self.stamps
    }

    /// Blocks until shared read access is available.
    pub fn read(&self) -> ReadGuard<'_> {
        ReadGuard {
            _gate: self.gate.read(),
        }
    }

    /// Returns shared read access only if it is immediately available.
    pub fn try_read(&self) -> Option<ReadGuard<'_>> {
        self.gate.try_read().map(|gate| ReadGuard { _gate: gate })
    }

    /// Blocks until exclusive write access is available.
    ///
    /// `structural` opens the structural section immediately; a value-only
    /// guard can be escalated later with [`WriteGuard::escalate`].
    pub fn write(&self, structural: bool) -> WriteGuard<'_> {
        WriteGuard::open(self.gate.write(), &self.stamps, structural)
    }

    /// Returns exclusive write access only if it is immediately available.
    pub fn try_write(&self, structural: bool) -> Option<WriteGuard<'_>> {
        self.gate
            .try_write()
            .map(|gate| WriteGuard::open(gate, &self.stamps, structural))
    }

    /// Runs `read` optimistically, retrying up to `retries` times on stamp
    /// mismatch, then once more under the read guard.
    ///
    /// `read` may observe a torn state on any attempt that later fails
    /// validation; it must not panic on such input, and its result is
    /// discarded.
    pub fn optimistic<R>(
        &self,
        retries: u32,
        validation: Validation,
        mut read: impl FnMut() -> R,
    ) -> R {
        if self.stamps.held_here() {
            return read();
        }
        for _ in 0..retries {
            let Some(token) = self.stamps.begin_read() else {
                hint::spin_loop();
                continue;
            };
            let result = read();
            let valid = match validation {
                Validation::Structural => token.validate(&self.stamps),
                Validation::Values => token.validate_values(&self.stamps),
            };
            if valid {
                return result;
            }
        }
        tracing::trace!(retries, "optimistic read fell back to the read guard");
        let _guard = self.read();
        read()
    }
}

/// Shared read access. Released on drop.
#[must_use = "the read gate is released as soon as the guard is dropped"]
pub struct ReadGuard<'a> {
    _gate: RwLockReadGuard<'a, ()>,
}

/// Exclusive write access. Closes its stamp sections and releases the gate on
/// drop, including during unwinding.
#[must_use = "the write gate is released as soon as the guard is dropped"]
pub struct WriteGuard<'a> {
    _gate: RwLockWriteGuard<'a, ()>,
    stamps: &'a Stamps,
    structural: bool,
}

impl<'a> WriteGuard<'a> {
    fn open(gate: RwLockWriteGuard<'a, ()>, stamps: &'a Stamps, structural: bool) -> Self {
        stamps.enter();
        Stamps::open(&stamps.values);
        if structural {
            Stamps::open(&stamps.structural);
        }
        Self {
            _gate: gate,
            stamps,
            structural,
        }
    }

    /// Returns `true` once the structural section is open.
    #[inline]
    pub const fn is_structural(&self) -> bool {
        self.structural
    }

    /// Opens the structural section if it is not open yet.
    pub fn escalate(&mut self) {
        if !self.structural {
            Stamps::open(&self.stamps.structural);
            self.structural = true;
        }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.structural {
            Stamps::close(&self.stamps.structural);
        }
        Stamps::close(&self.stamps.values);
        self.stamps.leave();
    }
}
