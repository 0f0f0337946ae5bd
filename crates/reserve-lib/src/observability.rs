//! Observability for reconciliation runs
//!
//! Provides:
//! - Prometheus metrics in a run-local registry (records ingested and rejected,
//!   unused and unreserved quantities per service)
//! - Structured logging of run events with tracing

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};
use tracing::{info, warn};

use crate::models::ServiceCategory;
use crate::report::{Delivery, Report};

/// Metrics for one reconciliation run
///
/// Each handle owns its own registry, so several runs (or tests) in one
/// process never collide on metric registration.
#[derive(Clone)]
pub struct ReconcileMetrics {
    registry: Registry,
    records_ingested: IntCounterVec,
    records_rejected: IntCounterVec,
    unused_reservations: IntGaugeVec,
    unreserved_instances: IntGaugeVec,
    running_instances: IntGaugeVec,
    reserved_instances: IntGaugeVec,
}

impl ReconcileMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let records_ingested = IntCounterVec::new(
            Opts::new(
                "reserved_instances_records_ingested_total",
                "Records aggregated into the run, by service and role",
            ),
            &["service", "role"],
        )?;
        let records_rejected = IntCounterVec::new(
            Opts::new(
                "reserved_instances_records_rejected_total",
                "Records or batches rejected, by service and reason",
            ),
            &["service", "reason"],
        )?;
        let unused_reservations = IntGaugeVec::new(
            Opts::new(
                "reserved_instances_unused_reservations",
                "Reserved units not backed by running capacity",
            ),
            &["service"],
        )?;
        let unreserved_instances = IntGaugeVec::new(
            Opts::new(
                "reserved_instances_unreserved_instances",
                "Running units not covered by a reservation",
            ),
            &["service"],
        )?;
        let running_instances = IntGaugeVec::new(
            Opts::new("reserved_instances_running_instances", "Running units"),
            &["service"],
        )?;
        let reserved_instances = IntGaugeVec::new(
            Opts::new("reserved_instances_reserved_instances", "Reserved units"),
            &["service"],
        )?;

        registry.register(Box::new(records_ingested.clone()))?;
        registry.register(Box::new(records_rejected.clone()))?;
        registry.register(Box::new(unused_reservations.clone()))?;
        registry.register(Box::new(unreserved_instances.clone()))?;
        registry.register(Box::new(running_instances.clone()))?;
        registry.register(Box::new(reserved_instances.clone()))?;

        Ok(Self {
            registry,
            records_ingested,
            records_rejected,
            unused_reservations,
            unreserved_instances,
            running_instances,
            reserved_instances,
        })
    }

    pub fn inc_running(&self, service: ServiceCategory) {
        self.records_ingested
            .with_label_values(&[service.as_str(), "running"])
            .inc();
    }

    pub fn inc_reserved(&self, service: ServiceCategory) {
        self.records_ingested
            .with_label_values(&[service.as_str(), "reserved"])
            .inc();
    }

    pub fn inc_rejected(&self, service: ServiceCategory, reason: &str) {
        self.records_rejected
            .with_label_values(&[service.as_str(), reason])
            .inc();
    }

    /// Publish the totals of a finished report
    pub fn observe_report(&self, report: &Report) {
        for (service, diff) in &report.services {
            let label = [service.as_str()];
            self.unused_reservations
                .with_label_values(&label)
                .set(saturating_i64(diff.qty_unused_reservations()));
            self.unreserved_instances
                .with_label_values(&label)
                .set(saturating_i64(diff.qty_unreserved_instances));
            self.running_instances
                .with_label_values(&label)
                .set(saturating_i64(diff.qty_running_instances));
            self.reserved_instances
                .with_label_values(&label)
                .set(saturating_i64(diff.qty_reserved_instances));
        }
    }

    /// Text exposition of every metric in the run registry
    pub fn encode_text(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Structured logger for reconciliation events
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn log_run_started(&self, accounts: usize) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            accounts = accounts,
            "Reconciliation run started"
        );
    }

    pub fn log_account_ingested(
        &self,
        account: &str,
        service: ServiceCategory,
        running: usize,
        reservations: usize,
    ) {
        info!(
            event = "account_ingested",
            run_id = %self.run_id,
            account = %account,
            service = service.as_str(),
            running = running,
            reservations = reservations,
            "Aggregated account records"
        );
    }

    pub fn log_source_failure(&self, account: &str, service: ServiceCategory, reason: &str) {
        warn!(
            event = "source_failure",
            run_id = %self.run_id,
            account = %account,
            service = service.as_str(),
            reason = %reason,
            "Skipping account records for service"
        );
    }

    pub fn log_invalid_quantity(&self, account: &str, service: ServiceCategory, id: &str, quantity: i64) {
        warn!(
            event = "invalid_quantity",
            run_id = %self.run_id,
            account = %account,
            service = service.as_str(),
            reservation_id = %id,
            quantity = quantity,
            "Skipping reservation with invalid quantity"
        );
    }

    pub fn log_delivery_decision(&self, delivery: Delivery, failures: usize) {
        match delivery {
            Delivery::ExpiryNoticeOnly => info!(
                event = "delivery_decided",
                run_id = %self.run_id,
                delivery = %delivery,
                failures = failures,
                "Every service has unused reservations; sending expiry notice only"
            ),
            Delivery::FullReport => info!(
                event = "delivery_decided",
                run_id = %self.run_id,
                delivery = %delivery,
                failures = failures,
                "Sending full unused/unreserved report"
            ),
        }
    }
}
