//! Wall-clock gate for playtime accrual and flushing.
//!
//! The host ticks many times per second, but playtime is credited and
//! written to disk only once per save interval. This bounds disk writes
//! while limiting crash loss to one interval of playtime.
//!
//! # Design Principles
//!
//! - The first poll only anchors the schedule. Nothing is credited for
//!   time before the host started ticking.
//! - Credited seconds are the whole seconds actually elapsed, and the
//!   anchor moves forward by exactly that amount, so sub-second remainders
//!   are carried into the next interval rather than lost.
//! - A wall clock that jumps backwards re-anchors without crediting.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::warn;

/// Errors that can occur when building a schedule.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Invalid interval (zero, or too large to represent).
    #[error("invalid save interval: {reason}")]
    InvalidInterval {
        /// Explanation of what is wrong with the interval.
        reason: String,
    },
}

/// Tracks when the next accrual and flush are due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSchedule {
    /// Minimum time between two passes.
    interval: TimeDelta,

    /// Instant up to which playtime has been credited.
    anchor: Option<DateTime<Utc>>,
}

impl SaveSchedule {
    /// Create a schedule with an interval of `interval_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::InvalidInterval`] for zero or for values
    /// that do not fit a [`TimeDelta`].
    pub fn new(interval_seconds: u64) -> Result<Self, ScheduleError> {
        if interval_seconds == 0 {
            return Err(ScheduleError::InvalidInterval {
                reason: "interval must be at least 1 second".to_owned(),
            });
        }
        let interval = i64::try_from(interval_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| ScheduleError::InvalidInterval {
                reason: format!("{interval_seconds} seconds is out of range"),
            })?;
        Ok(Self {
            interval,
            anchor: None,
        })
    }

    /// The configured interval in whole seconds.
    pub fn interval_seconds(&self) -> u64 {
        u64::try_from(self.interval.num_seconds()).unwrap_or(0)
    }

    /// The instant up to which playtime has been credited, if anchored.
    pub const fn anchor(&self) -> Option<DateTime<Utc>> {
        self.anchor
    }

    /// Check the schedule at `now`.
    ///
    /// Returns the whole seconds to credit when at least one interval has
    /// passed since the anchor, and `None` otherwise.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<u64> {
        let Some(anchor) = self.anchor else {
            self.anchor = Some(now);
            return None;
        };

        let elapsed = now.signed_duration_since(anchor);
        if elapsed < TimeDelta::zero() {
            warn!(%anchor, %now, "Wall clock moved backwards, re-anchoring save schedule");
            self.anchor = Some(now);
            return None;
        }
        if elapsed < self.interval {
            return None;
        }

        let whole = TimeDelta::seconds(elapsed.num_seconds());
        self.anchor = Some(anchor.checked_add_signed(whole).unwrap_or(now));
        u64::try_from(whole.num_seconds()).ok()
    }

    /// Seconds until the next pass is due at `now` (zero if overdue or
    /// not yet anchored).
    pub fn seconds_until_due(&self, now: DateTime<Utc>) -> u64 {
        let Some(anchor) = self.anchor else {
            return 0;
        };
        let elapsed = now.signed_duration_since(anchor);
        let remaining = self
            .interval
            .checked_sub(&elapsed)
            .unwrap_or_else(TimeDelta::zero);
        u64::try_from(remaining.num_seconds()).unwrap_or(0)
    }
}
