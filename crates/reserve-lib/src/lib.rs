//! Reservation reconciliation engine
//!
//! This crate provides the core functionality for:
//! - Normalizing running resources and reservations into comparison keys
//! - Aggregating running and reserved counts across accounts
//! - Tracking days until reservations expire
//! - Diffing running versus reserved capacity per service
//! - Assembling the report and deciding what to deliver
//! - Handing the report to delivery sinks

pub mod aggregator;
pub mod diff;
pub mod error;
pub mod expiry;
pub mod key;
pub mod models;
pub mod normalizer;
pub mod observability;
pub mod reconcile;
pub mod report;
pub mod sink;
pub mod source;

pub use aggregator::{CountMapping, MultisetAggregator};
pub use diff::{diff, diff_with_policy, DiffResult, MatchPolicy};
pub use error::ReconcileError;
pub use expiry::{Clock, ExpiryMapping, ExpiryTracker, FixedClock, SystemClock, EXPIRY_NOTICE_DAYS};
pub use key::ComparisonKey;
pub use models::*;
pub use observability::{ReconcileMetrics, StructuredLogger};
pub use reconcile::{run_accounts, IngestSummary, Reconciliation};
pub use report::{delivery_decision, Delivery, Report, ReportAssembler};
pub use sink::{deliver_all, ReportSink};
pub use source::{RecordSource, SnapshotSource};
