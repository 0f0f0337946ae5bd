//! Report assembly and delivery gating
//!
//! The report is a plain structured value. Rendering it as text, JSON or mail
//! is left to the caller.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

use crate::diff::DiffResult;
use crate::expiry::{self, ExpiryMapping, EXPIRY_NOTICE_DAYS};
use crate::key::ComparisonKey;
use crate::models::{ServiceCategory, SourceFailure};

/// What the report sink should send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Only the expiring-reservations notice
    ExpiryNoticeOnly,
    /// The full unused/unreserved report
    FullReport,
}

impl std::fmt::Display for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::ExpiryNoticeOnly => write!(f, "expiry_notice_only"),
            Delivery::FullReport => write!(f, "full_report"),
        }
    }
}

/// Decide what to send for a run
///
/// The full report is suppressed only when every one of the four services has
/// at least one unused reservation AND some reservation expires within
/// [`EXPIRY_NOTICE_DAYS`]. A service missing from `diffs` counts as having no
/// unused reservations.
pub fn delivery_decision(
    diffs: &BTreeMap<ServiceCategory, DiffResult>,
    expiry: &ExpiryMapping,
) -> Delivery {
    let all_services_unused = ServiceCategory::ALL
        .iter()
        .all(|service| diffs.get(service).is_some_and(DiffResult::has_unused));

    if all_services_unused && expiry::is_expiring_soon(expiry, EXPIRY_NOTICE_DAYS) {
        Delivery::ExpiryNoticeOnly
    } else {
        Delivery::FullReport
    }
}

/// Result of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    /// One diff per service category, always all four
    pub services: BTreeMap<ServiceCategory, DiffResult>,
    /// Remaining days per reservation, grouped by key
    #[serde(serialize_with = "serialize_by_service")]
    pub reserve_expiry: ExpiryMapping,
    /// Identifiers of running resources per key
    #[serde(serialize_with = "serialize_by_service")]
    pub instance_ids: BTreeMap<ComparisonKey, Vec<String>>,
    /// Account/service batches that could not be reconciled
    pub failures: Vec<SourceFailure>,
    /// Horizon used to list expiring reservations
    pub horizon_days: u32,
    pub delivery: Delivery,
}

/// Nest a key-indexed map under its service category
///
/// Key strings are only unique within one service (an EC2 Classic and an EC2
/// VPC key can print the same), so cross-service maps are written as
/// `{service: {key: value}}`.
fn serialize_by_service<S, V>(
    map: &BTreeMap<ComparisonKey, V>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let mut grouped: BTreeMap<ServiceCategory, BTreeMap<&ComparisonKey, &V>> = BTreeMap::new();
    for (key, value) in map {
        grouped.entry(key.service()).or_default().insert(key, value);
    }
    grouped.serialize(serializer)
}

impl Report {
    pub fn service(&self, service: ServiceCategory) -> Option<&DiffResult> {
        self.services.get(&service)
    }

    /// Reservations expiring within `horizon_days`
    pub fn expiring_within(&self, horizon_days: u32) -> Vec<(&ComparisonKey, u32)> {
        expiry::expiring_within(&self.reserve_expiry, horizon_days)
    }

    /// Reservations expiring within the report's own horizon
    pub fn expiring(&self) -> Vec<(&ComparisonKey, u32)> {
        self.expiring_within(self.horizon_days)
    }

    /// Remaining days for the reservations sharing a key
    pub fn expiry_for(&self, key: &ComparisonKey) -> &[u32] {
        self.reserve_expiry.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Running resource identifiers for a key
    pub fn ids_for(&self, key: &ComparisonKey) -> &[String] {
        self.instance_ids.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn with_instance_ids(mut self, instance_ids: BTreeMap<ComparisonKey, Vec<String>>) -> Self {
        self.instance_ids = instance_ids;
        self
    }

    pub fn with_failures(mut self, failures: Vec<SourceFailure>) -> Self {
        self.failures = failures;
        self
    }
}

/// Builds a [`Report`] from per-service diffs and the expiry mapping
#[derive(Debug, Clone, Copy)]
pub struct ReportAssembler {
    horizon_days: u32,
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self {
            horizon_days: EXPIRY_NOTICE_DAYS,
        }
    }
}

impl ReportAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Horizon for listing expiring reservations (does not affect delivery)
    pub fn with_horizon_days(mut self, horizon_days: u32) -> Self {
        self.horizon_days = horizon_days;
        self
    }

    pub fn assemble(
        &self,
        generated_at: DateTime<Utc>,
        mut diffs: BTreeMap<ServiceCategory, DiffResult>,
        reserve_expiry: ExpiryMapping,
    ) -> Report {
        let delivery = delivery_decision(&diffs, &reserve_expiry);
        for service in ServiceCategory::ALL {
            diffs.entry(service).or_default();
        }

        Report {
            generated_at,
            services: diffs,
            reserve_expiry,
            instance_ids: BTreeMap::new(),
            failures: Vec::new(),
            horizon_days: self.horizon_days,
            delivery,
        }
    }
}
