//! Capacity policy for [`OrderedStore`](crate::store::OrderedStore).
//!
//! | Parameter            | Meaning                                                    | Default      |
//! |----------------------|------------------------------------------------------------|--------------|
//! | `min_capacity`       | Smallest backing array the store shrinks to                | 16           |
//! | `max_capacity`       | Hard cap; once reached, inserts evict from the far end     | `usize::MAX` |
//! | `min_occupancy`      | Fraction below which the store compacts itself             | 0.25         |
//! | `growth_factor`      | `new = old + growth_factor * old` when growing             | 1.0          |
//! | `optimistic_retries` | Failed stamp checks before a reader takes the read guard   | 8            |
//!
//! # Examples
//!
//! ```rust
//! use stable_order::config::StoreConfig;
//!
//! let config = StoreConfig::builder()
//!     .min_capacity(4)
//!     .max_capacity(64)
//!     .growth_factor(0.5)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_capacity(), 64);
//! assert!(config.is_bounded());
//! ```

/// Largest accepted `min_occupancy`. Above one half, a grow followed by a
/// single removal could immediately trigger a shrink.
pub const MAX_MIN_OCCUPANCY: f64 = 0.5;

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// `min_capacity` exceeds `max_capacity`.
    #[error("min_capacity {min} exceeds max_capacity {max}")]
    CapacityInverted {
        /// Requested minimum.
        min: usize,
        /// Requested maximum.
        max: usize,
    },
    /// `max_capacity` of zero can hold nothing.
    #[error("max_capacity must be at least 1")]
    ZeroMaxCapacity,
    /// `min_occupancy` outside `[0, 0.5]` or not finite.
    #[error("min_occupancy must be a finite value within [0, 0.5]")]
    Occupancy,
    /// `growth_factor` not strictly positive or not finite.
    #[error("growth_factor must be a finite value greater than 0")]
    GrowthFactor,
}

/// Capacity and read-retry policy of a store.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StoreConfig {
    min_capacity: usize,
    max_capacity: usize,
    min_occupancy: f64,
    growth_factor: f64,
    optimistic_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_capacity: 16,
            max_capacity: usize::MAX,
            min_occupancy: 0.25,
            growth_factor: 1.0,
            optimistic_retries: 8,
        }
    }
}

impl StoreConfig {
    /// Starts a builder from the default policy.
    #[must_use]
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder {
            config: Self::default(),
        }
    }

    /// Fixed-capacity, drop-oldest policy holding at most `capacity` elements.
    ///
    /// The backing array is allocated at full size and never shrinks.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroMaxCapacity`] when `capacity` is zero.
    pub fn fixed(capacity: usize) -> Result<Self, ConfigError> {
        Self::builder()
            .min_capacity(capacity)
            .max_capacity(capacity)
            .min_occupancy(0.0)
            .build()
    }

    /// Smallest backing array size.
    #[inline]
    #[must_use]
    pub const fn min_capacity(&self) -> usize {
        self.min_capacity
    }

    /// Largest element count before eviction starts.
    #[inline]
    #[must_use]
    pub const fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Occupancy fraction below which the store compacts.
    #[inline]
    #[must_use]
    pub const fn min_occupancy(&self) -> f64 {
        self.min_occupancy
    }

    /// Growth multiplier.
    #[inline]
    #[must_use]
    pub const fn growth_factor(&self) -> f64 {
        self.growth_factor
    }

    /// Stamp-check failures tolerated before falling back to the read guard.
    #[inline]
    #[must_use]
    pub const fn optimistic_retries(&self) -> u32 {
        self.optimistic_retries
    }

    /// Returns `true` if inserts can evict.
    #[inline]
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.max_capacity != usize::MAX
    }

    /// Checks the invariants that [`StoreConfigBuilder::build`] enforces.
    ///
    /// Deserialized configurations bypass the builder, so stores call this
    /// again on construction.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_capacity == 0 {
            return Err(ConfigError::ZeroMaxCapacity);
        }
        if self.min_capacity > self.max_capacity {
            return Err(ConfigError::CapacityInverted {
                min: self.min_capacity,
                max: self.max_capacity,
            });
        }
        if !self.min_occupancy.is_finite()
            || !(0.0..=MAX_MIN_OCCUPANCY).contains(&self.min_occupancy)
        {
            return Err(ConfigError::Occupancy);
        }
        if !self.growth_factor.is_finite() || self.growth_factor <= 0.0 {
            return Err(ConfigError::GrowthFactor);
        }
        Ok(())
    }

    /// Capacity to grow to when `needed` slots are required and `current`
    /// are allocated: `min(max, max(needed, current + growth * current))`.
    #[must_use]
    pub(crate) fn grown_capacity(&self, current: usize, needed: usize) -> usize {
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let increment = (current as f64 * self.growth_factor).ceil() as usize;
        let target = current.saturating_add(increment.max(1)).max(needed);
        target.min(self.max_capacity).max(self.min_capacity.min(self.max_capacity))
    }

    /// Returns the compacted capacity when `len` elements occupy `capacity`
    /// slots sparsely enough to shrink, `None` otherwise.
    #[must_use]
    pub(crate) fn shrunk_capacity(&self, capacity: usize, len: usize) -> Option<usize> {
        if capacity <= self.min_capacity || self.min_occupancy == 0.0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let occupancy = len as f64 / capacity as f64;
        (occupancy < self.min_occupancy).then(|| len.max(self.min_capacity))
    }
}

/// Consuming builder for [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Sets the smallest backing array size.
    #[must_use]
    pub const fn min_capacity(mut self, value: usize) -> Self {
        self.config.min_capacity = value;
        self
    }

    /// Sets the eviction threshold.
    #[must_use]
    pub const fn max_capacity(mut self, value: usize) -> Self {
        self.config.max_capacity = value;
        self
    }

    /// Sets the compaction threshold. Zero disables shrinking.
    #[must_use]
    pub const fn min_occupancy(mut self, value: f64) -> Self {
        self.config.min_occupancy = value;
        self
    }

    /// Sets the growth multiplier.
    #[must_use]
    pub const fn growth_factor(mut self, value: f64) -> Self {
        self.config.growth_factor = value;
        self
    }

    /// Sets how many stamp-check failures a reader tolerates.
    #[must_use]
    pub const fn optimistic_retries(mut self, value: u32) -> Self {
        self.config.optimistic_retries = value;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::validate`].
    pub fn build(self) -> Result<StoreConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
