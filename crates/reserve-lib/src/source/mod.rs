//! Record sources
//!
//! A record source yields the raw running resources and reservations of one
//! account for one service category. Provider API access lives behind this
//! trait; the engine itself never performs I/O.

mod snapshot;

#[cfg(test)]
mod tests;

pub use snapshot::{AccountSnapshot, SnapshotSource};

use crate::models::{AccountSpec, ServiceCategory, ServiceRecords};
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for record fetching implementations
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch raw records of one service for one account
    async fn fetch(&self, account: &AccountSpec, service: ServiceCategory) -> Result<ServiceRecords>;
}
