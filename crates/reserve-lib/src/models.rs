//! Core data models for reservation reconciliation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::key::ComparisonKey;

/// Billable resource family tracked by the reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    /// On-demand compute launched outside a VPC
    Ec2Classic,
    /// On-demand compute launched inside a VPC
    Ec2Vpc,
    /// Managed cache nodes
    #[serde(rename = "elasticache")]
    ElastiCache,
    /// Managed relational database instances
    Rds,
}

impl ServiceCategory {
    /// All categories in report order
    pub const ALL: [ServiceCategory; 4] = [
        ServiceCategory::Ec2Classic,
        ServiceCategory::Ec2Vpc,
        ServiceCategory::ElastiCache,
        ServiceCategory::Rds,
    ];

    /// Human-readable label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            ServiceCategory::Ec2Classic => "EC2 Classic",
            ServiceCategory::Ec2Vpc => "EC2 VPC",
            ServiceCategory::ElastiCache => "ElastiCache",
            ServiceCategory::Rds => "RDS",
        }
    }

    /// Stable identifier used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::Ec2Classic => "ec2_classic",
            ServiceCategory::Ec2Vpc => "ec2_vpc",
            ServiceCategory::ElastiCache => "elasticache",
            ServiceCategory::Rds => "rds",
        }
    }

    /// Whether the category is compute (and therefore keyed by placement)
    pub fn is_compute(&self) -> bool {
        matches!(self, ServiceCategory::Ec2Classic | ServiceCategory::Ec2Vpc)
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Running resource as fetched from the provider, before normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResource {
    pub id: Option<String>,
    pub instance_type: Option<String>,
    pub region: Option<String>,
    pub availability_zone: Option<String>,
    pub platform: Option<String>,
    pub engine: Option<String>,
}

/// Reservation as fetched from the provider, before normalization
///
/// For compute reservations an absent `availability_zone` means the
/// reservation has regional scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReservation {
    pub id: Option<String>,
    pub instance_type: Option<String>,
    pub region: Option<String>,
    pub availability_zone: Option<String>,
    pub platform: Option<String>,
    pub engine: Option<String>,
    pub quantity: i64,
    pub expires_at: DateTime<Utc>,
}

/// One fetched batch for a single (account, service) pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceRecords {
    #[serde(default)]
    pub running: Vec<RawResource>,
    #[serde(default)]
    pub reservations: Vec<RawReservation>,
}

impl ServiceRecords {
    pub fn is_empty(&self) -> bool {
        self.running.is_empty() && self.reservations.is_empty()
    }
}

/// Normalized running resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub key: ComparisonKey,
    pub id: String,
}

/// Normalized reservation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRecord {
    pub key: ComparisonKey,
    pub id: String,
    pub quantity: u32,
    pub expires_at: DateTime<Utc>,
}

/// Account to reconcile, with per-service query flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSpec {
    pub name: String,
    pub region: String,
    /// Query managed database reservations for this account
    #[serde(default = "default_true")]
    pub rds: bool,
    /// Query managed cache reservations for this account
    #[serde(default = "default_true")]
    pub elasticache: bool,
}

fn default_true() -> bool {
    true
}

impl AccountSpec {
    /// Categories the record source should be asked for
    pub fn services(&self) -> Vec<ServiceCategory> {
        ServiceCategory::ALL
            .into_iter()
            .filter(|service| match service {
                ServiceCategory::ElastiCache => self.elasticache,
                ServiceCategory::Rds => self.rds,
                other => other.is_compute(),
            })
            .collect()
    }
}

/// A fetch or normalization failure scoped to one account and service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub account: String,
    pub service: ServiceCategory,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_services_respect_flags() {
        let account = AccountSpec {
            name: "prod".to_string(),
            region: "us-east-1".to_string(),
            rds: false,
            elasticache: true,
        };

        assert_eq!(
            account.services(),
            vec![
                ServiceCategory::Ec2Classic,
                ServiceCategory::Ec2Vpc,
                ServiceCategory::ElastiCache
            ]
        );
    }

    #[test]
    fn test_account_flags_default_to_enabled() {
        let account: AccountSpec =
            serde_json::from_str(r#"{"name": "prod", "region": "eu-west-1"}"#).unwrap();
        assert!(account.rds);
        assert!(account.elasticache);
        assert_eq!(account.services().len(), 4);
    }

    #[test]
    fn test_service_category_serde_names() {
        let json = serde_json::to_string(&ServiceCategory::ElastiCache).unwrap();
        assert_eq!(json, "\"elasticache\"");
        let parsed: ServiceCategory = serde_json::from_str("\"ec2_vpc\"").unwrap();
        assert_eq!(parsed, ServiceCategory::Ec2Vpc);
    }
}
