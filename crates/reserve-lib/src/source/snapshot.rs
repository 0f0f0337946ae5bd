//! Snapshot-backed record source
//!
//! Reads one JSON document per account from a directory, named
//! `<account name>.json`:
//!
//! ```json
//! {
//!   "ec2_vpc": {
//!     "running": [{"id": "i-1", "instance_type": "m5.large", "region": "us-east-1",
//!                  "availability_zone": "us-east-1a", "platform": "Linux/UNIX"}],
//!     "reservations": [{"id": "ri-1", "instance_type": "m5.large", "region": "us-east-1",
//!                       "platform": "Linux/UNIX", "quantity": 2,
//!                       "expires_at": "2025-01-01T00:00:00Z"}]
//!   }
//! }
//! ```
//!
//! Sections may be omitted; an absent section is an empty batch.

use super::{async_trait, RecordSource};
use crate::models::{AccountSpec, ServiceCategory, ServiceRecords};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{btree_map::Entry, BTreeMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// All records of one account, keyed by service category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountSnapshot {
    pub services: BTreeMap<ServiceCategory, ServiceRecords>,
}

impl AccountSnapshot {
    /// Batch for one service, empty if absent
    pub fn records(&self, service: ServiceCategory) -> ServiceRecords {
        self.services.get(&service).cloned().unwrap_or_default()
    }
}

/// Record source reading per-account JSON snapshots from a directory
///
/// Each account file is read and parsed once; later fetches for the other
/// services of that account are served from memory. Files that fail to load
/// are not cached and are retried on the next fetch.
#[derive(Debug)]
pub struct SnapshotSource {
    dir: PathBuf,
    loaded: Mutex<BTreeMap<String, AccountSnapshot>>,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for an account
    pub fn path_for(&self, account: &AccountSpec) -> PathBuf {
        self.dir.join(format!("{}.json", account.name))
    }

    /// Load and parse the full snapshot of an account, bypassing the cache
    pub async fn load(&self, account: &AccountSpec) -> Result<AccountSnapshot> {
        let path = self.path_for(account);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot {}", path.display()))
    }
}

#[async_trait]
impl RecordSource for SnapshotSource {
    async fn fetch(&self, account: &AccountSpec, service: ServiceCategory) -> Result<ServiceRecords> {
        let mut loaded = self.loaded.lock().await;
        let snapshot = match loaded.entry(account.name.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.load(account).await?),
        };
        let records = snapshot.records(service);

        debug!(
            account = %account.name,
            service = service.as_str(),
            running = records.running.len(),
            reservations = records.reservations.len(),
            "Loaded snapshot records"
        );

        Ok(records)
    }
}
