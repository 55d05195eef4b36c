//! Per-entry expiration options.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::clock::add_duration;
use crate::error::StoreError;

/// Expiration options applied to a single stored entry.
///
/// When several options are set the precedence is fixed:
/// - a relative-to-now duration wins over an absolute instant;
/// - a sliding window is additionally capped by the resulting absolute deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOptions {
    absolute_expiration: Option<DateTime<Utc>>,
    absolute_expiration_relative_to_now: Option<Duration>,
    sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Options for an entry that never expires.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expires the entry at a fixed instant.
    pub fn with_absolute_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.absolute_expiration = Some(at);
        self
    }

    /// Expires the entry a fixed duration after it is written.
    pub fn with_absolute_expiration_relative_to_now(mut self, ttl: Duration) -> Self {
        self.absolute_expiration_relative_to_now = Some(ttl);
        self
    }

    /// Expires the entry once it has not been read for `window`.
    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// Returns the absolute expiration instant.
    pub fn absolute_expiration(&self) -> Option<DateTime<Utc>> {
        self.absolute_expiration
    }

    /// Returns the relative-to-now expiration.
    pub fn absolute_expiration_relative_to_now(&self) -> Option<Duration> {
        self.absolute_expiration_relative_to_now
    }

    /// Returns the sliding expiration window.
    pub fn sliding_expiration(&self) -> Option<Duration> {
        self.sliding_expiration
    }

    /// Returns true if no expiration is configured.
    pub fn is_persistent(&self) -> bool {
        self.absolute_expiration.is_none()
            && self.absolute_expiration_relative_to_now.is_none()
            && self.sliding_expiration.is_none()
    }

    /// Effective absolute deadline for an entry written at `now`.
    pub fn absolute_deadline(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.absolute_expiration_relative_to_now {
            Some(ttl) => add_duration(now, ttl),
            None => self.absolute_expiration,
        }
    }

    /// Checks that durations are positive.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidOptions` for zero durations.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.absolute_expiration_relative_to_now == Some(Duration::ZERO) {
            return Err(StoreError::invalid_options(
                "relative expiration must be positive",
            ));
        }
        if self.sliding_expiration == Some(Duration::ZERO) {
            return Err(StoreError::invalid_options(
                "sliding expiration must be positive",
            ));
        }
        Ok(())
    }
}
