//! Reservation expiry tracking
//!
//! Remaining days are computed against an injected [`Clock`] so runs are
//! deterministic under test.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::key::ComparisonKey;

/// Horizon used for the report-wide "send expiry notice" decision
pub const EXPIRY_NOTICE_DAYS: u32 = 7;

/// Remaining-day counts per key, one entry per reservation sharing the key
pub type ExpiryMapping = BTreeMap<ComparisonKey, Vec<u32>>;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Whole days until `expires_at`, rounded down and clamped at zero
pub fn remaining_days(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = (expires_at - now).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// True if any remaining-day value under any key is within `horizon_days`
///
/// The signal is report-wide, not per key.
pub fn is_expiring_soon(expiry: &ExpiryMapping, horizon_days: u32) -> bool {
    expiry.values().flatten().any(|days| *days <= horizon_days)
}

/// (key, days) pairs expiring within `horizon_days`, in key order
pub fn expiring_within(expiry: &ExpiryMapping, horizon_days: u32) -> Vec<(&ComparisonKey, u32)> {
    expiry
        .iter()
        .flat_map(|(key, days)| days.iter().map(move |d| (key, *d)))
        .filter(|(_, days)| *days <= horizon_days)
        .collect()
}

/// Collects remaining days for every reservation seen in a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryTracker {
    expiry: ExpiryMapping,
}

impl ExpiryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one reservation's expiry and return its remaining days
    ///
    /// Already-expired reservations are recorded with zero days so they still
    /// surface in the report.
    pub fn record_expiry(
        &mut self,
        key: ComparisonKey,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> u32 {
        let days = remaining_days(expires_at, now);
        self.expiry.entry(key).or_default().push(days);
        days
    }

    /// True if any reservation under any key expires within `horizon_days`
    pub fn is_expiring_soon(&self, horizon_days: u32) -> bool {
        is_expiring_soon(&self.expiry, horizon_days)
    }

    pub fn expiring_within(&self, horizon_days: u32) -> Vec<(&ComparisonKey, u32)> {
        expiring_within(&self.expiry, horizon_days)
    }

    pub fn mapping(&self) -> &ExpiryMapping {
        &self.expiry
    }

    pub fn into_mapping(self) -> ExpiryMapping {
        self.expiry
    }
}
