//! Timestamps and transaction validity windows.
//!
//! Timestamps are Unix epoch milliseconds (UTC). The notary evaluates time
//! windows against its own clock, so submitters only need loose agreement.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in milliseconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000))
    }

    /// Current system time. A clock set before the epoch reads as `EPOCH`.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn plus_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    pub fn minus_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_sub(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of the current time.
///
/// The notary evaluates time windows against its clock; tests substitute a
/// controllable one.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The operating system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// An interval during which a transaction may be notarised.
///
/// `from` is inclusive, `until` is exclusive. At least one bound is present;
/// the constructors enforce it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    from: Option<Timestamp>,
    until: Option<Timestamp>,
}

impl TimeWindow {
    /// `[from, until)`. Returns `None` when `from >= until`.
    pub fn between(from: Timestamp, until: Timestamp) -> Option<Self> {
        (from < until).then_some(Self {
            from: Some(from),
            until: Some(until),
        })
    }

    pub fn from_only(from: Timestamp) -> Self {
        Self {
            from: Some(from),
            until: None,
        }
    }

    pub fn until_only(until: Timestamp) -> Self {
        Self {
            from: None,
            until: Some(until),
        }
    }

    /// `[midpoint - tolerance, midpoint + tolerance)`.
    pub fn with_tolerance(midpoint: Timestamp, tolerance_millis: u64) -> Self {
        Self {
            from: Some(midpoint.minus_millis(tolerance_millis)),
            until: Some(midpoint.plus_millis(tolerance_millis.max(1))),
        }
    }

    pub fn from_time(&self) -> Option<Timestamp> {
        self.from
    }

    pub fn until_time(&self) -> Option<Timestamp> {
        self.until
    }

    pub fn contains(&self, instant: Timestamp) -> bool {
        let after_start = self.from.map_or(true, |from| instant >= from);
        let before_end = self.until.map_or(true, |until| instant < until);
        after_start && before_end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.until) {
            (Some(from), Some(until)) => write!(f, "[{from}, {until})"),
            (Some(from), None) => write!(f, "[{from}, ..)"),
            (None, Some(until)) => write!(f, "(.., {until})"),
            (None, None) => f.write_str("(..)"),
        }
    }
}
