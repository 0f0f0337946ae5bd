//! Per-run reconciliation context
//!
//! A [`Reconciliation`] owns every accumulator of one run. Build a fresh one per
//! run, feed it account batches, then call [`Reconciliation::finish`].

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::aggregator::MultisetAggregator;
use crate::diff::{diff_with_policy, DiffResult, MatchPolicy};
use crate::error::{ReconcileError, Result};
use crate::expiry::{Clock, ExpiryTracker};
use crate::key::ComparisonKey;
use crate::models::{
    AccountSpec, ReservationRecord, ResourceRecord, ServiceCategory, ServiceRecords, SourceFailure,
};
use crate::normalizer::{normalize_reservation, normalize_resource};
use crate::observability::{ReconcileMetrics, StructuredLogger};
use crate::report::{Report, ReportAssembler};
use crate::source::RecordSource;

/// Counts for one ingested batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub running: usize,
    pub reservations: usize,
    /// Reservations skipped for an invalid quantity
    pub skipped: usize,
}

struct NormalizedBatch {
    running: Vec<ResourceRecord>,
    reservations: Vec<ReservationRecord>,
    /// Reservation id and quantity of each skipped reservation
    skipped: Vec<(String, i64)>,
}

/// Accumulators for one run
///
/// Accounts are pooled: every account feeds the same aggregator, so
/// reservations in one account offset running capacity in the others.
pub struct Reconciliation {
    now: DateTime<Utc>,
    policy: MatchPolicy,
    aggregator: MultisetAggregator,
    expiry: ExpiryTracker,
    instance_ids: BTreeMap<ComparisonKey, Vec<String>>,
    failures: Vec<SourceFailure>,
    logger: StructuredLogger,
    metrics: Option<ReconcileMetrics>,
}

impl Reconciliation {
    /// Start a run; "now" is read from the clock once and used for every expiry
    pub fn new(clock: &dyn Clock) -> Self {
        Self {
            now: clock.now(),
            policy: MatchPolicy::default(),
            aggregator: MultisetAggregator::new(),
            expiry: ExpiryTracker::new(),
            instance_ids: BTreeMap::new(),
            failures: Vec::new(),
            logger: StructuredLogger::new("reconcile"),
            metrics: None,
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_metrics(mut self, metrics: ReconcileMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn aggregator(&self) -> &MultisetAggregator {
        &self.aggregator
    }

    pub fn expiry(&self) -> &ExpiryTracker {
        &self.expiry
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    /// Aggregate one account's batch for one service
    ///
    /// The whole batch is normalized before anything is counted: if any record
    /// is malformed the error is returned and the accumulators are untouched.
    /// Reservations with an invalid quantity are logged and skipped.
    pub fn ingest(
        &mut self,
        account: &str,
        service: ServiceCategory,
        batch: &ServiceRecords,
    ) -> Result<IngestSummary> {
        let NormalizedBatch {
            running,
            reservations,
            skipped,
        } = match Self::normalize_batch(service, batch) {
            Ok(normalized) => normalized,
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_rejected(service, e.kind());
                }
                return Err(e);
            }
        };

        let summary = IngestSummary {
            running: running.len(),
            reservations: reservations.len(),
            skipped: skipped.len(),
        };

        for (id, quantity) in &skipped {
            self.logger
                .log_invalid_quantity(account, service, id, *quantity);
            if let Some(metrics) = &self.metrics {
                metrics.inc_rejected(service, "invalid_quantity");
            }
        }

        for record in running {
            self.instance_ids
                .entry(record.key.clone())
                .or_default()
                .push(record.id);
            self.aggregator.add_running(record.key);
            if let Some(metrics) = &self.metrics {
                metrics.inc_running(service);
            }
        }

        for record in reservations {
            self.expiry
                .record_expiry(record.key.clone(), record.expires_at, self.now);
            self.aggregator.add_reserved(record.key, record.quantity);
            if let Some(metrics) = &self.metrics {
                metrics.inc_reserved(service);
            }
        }

        self.logger
            .log_account_ingested(account, service, summary.running, summary.reservations);
        Ok(summary)
    }

    fn normalize_batch(service: ServiceCategory, batch: &ServiceRecords) -> Result<NormalizedBatch> {
        let running = batch
            .running
            .iter()
            .map(|raw| normalize_resource(service, raw))
            .collect::<Result<Vec<_>>>()?;

        let mut reservations = Vec::with_capacity(batch.reservations.len());
        let mut skipped = Vec::new();
        for raw in &batch.reservations {
            match normalize_reservation(service, raw) {
                Ok(record) => reservations.push(record),
                Err(ReconcileError::InvalidQuantity { id, quantity }) => {
                    skipped.push((id, quantity));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(NormalizedBatch {
            running,
            reservations,
            skipped,
        })
    }

    /// Record that an account's service batch could not be used
    pub fn record_failure(&mut self, account: &str, service: ServiceCategory, reason: impl Into<String>) {
        let reason = reason.into();
        self.logger.log_source_failure(account, service, &reason);
        self.failures.push(SourceFailure {
            account: account.to_string(),
            service,
            reason,
        });
    }

    /// Diff every service and assemble the report
    pub fn finish(self, assembler: &ReportAssembler) -> Report {
        let diffs: BTreeMap<ServiceCategory, DiffResult> = ServiceCategory::ALL
            .into_iter()
            .map(|service| {
                let counts = self.aggregator.counts(service);
                (
                    service,
                    diff_with_policy(&counts.running, &counts.reserved, self.policy),
                )
            })
            .collect();

        let report = assembler
            .assemble(self.now, diffs, self.expiry.into_mapping())
            .with_instance_ids(self.instance_ids)
            .with_failures(self.failures);

        if let Some(metrics) = &self.metrics {
            metrics.observe_report(&report);
        }
        self.logger
            .log_delivery_decision(report.delivery, report.failures.len());

        report
    }
}

/// Fetch and ingest every account in order
///
/// Compute categories are always fetched; RDS and ElastiCache only when the
/// account enables them. Fetch errors and malformed batches are recorded as
/// failures and the run moves on.
pub async fn run_accounts<S>(source: &S, accounts: &[AccountSpec], reconciliation: &mut Reconciliation)
where
    S: RecordSource + ?Sized,
{
    reconciliation.logger.log_run_started(accounts.len());

    for account in accounts {
        for service in account.services() {
            let batch = match source.fetch(account, service).await {
                Ok(batch) => batch,
                Err(e) => {
                    if let Some(metrics) = &reconciliation.metrics {
                        metrics.inc_rejected(service, "fetch_failed");
                    }
                    reconciliation.record_failure(&account.name, service, format!("{:#}", e));
                    continue;
                }
            };

            if let Err(e) = reconciliation.ingest(&account.name, service, &batch) {
                reconciliation.record_failure(&account.name, service, e.to_string());
            }
        }
    }
}
