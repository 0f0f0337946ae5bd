//! Comparison keys shared by running resources and reservations
//!
//! Two records of the same service describe interchangeable capacity if and
//! only if their keys are equal. Each service category has its own variant so
//! keys of incompatible services can never compare equal.
//!
//! | Variant       | Fields (in order)                          |
//! |---------------|--------------------------------------------|
//! | `Ec2Classic`  | instance type, placement, platform         |
//! | `Ec2Vpc`      | instance type, placement, platform         |
//! | `ElastiCache` | node type, region                          |
//! | `Rds`         | instance class, region, engine             |

use serde::{Serialize, Serializer};
use std::fmt;

use crate::models::ServiceCategory;

/// Compute instance type split into family and size (`m5.large`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceType {
    pub family: String,
    pub size: String,
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.family, self.size)
    }
}

/// Where compute capacity lives, at the granularity of the reservation scope
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placement {
    /// A single availability zone
    Zone { region: String, zone: String },
    /// Any zone within a region (regional-scope reservation)
    Region { region: String },
}

impl Placement {
    pub fn region(&self) -> &str {
        match self {
            Placement::Zone { region, .. } | Placement::Region { region } => region,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Zone { zone, .. } => f.write_str(zone),
            Placement::Region { region } => write!(f, "{} (regional)", region),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComputeKey {
    pub instance_type: InstanceType,
    pub placement: Placement,
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub node_type: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseKey {
    pub instance_class: String,
    pub region: String,
    pub engine: String,
}

/// Normalized, service-tagged key used by every count and expiry mapping
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComparisonKey {
    Ec2Classic(ComputeKey),
    Ec2Vpc(ComputeKey),
    ElastiCache(CacheKey),
    Rds(DatabaseKey),
}

impl ComparisonKey {
    /// Service category the key belongs to
    pub fn service(&self) -> ServiceCategory {
        match self {
            ComparisonKey::Ec2Classic(_) => ServiceCategory::Ec2Classic,
            ComparisonKey::Ec2Vpc(_) => ServiceCategory::Ec2Vpc,
            ComparisonKey::ElastiCache(_) => ServiceCategory::ElastiCache,
            ComparisonKey::Rds(_) => ServiceCategory::Rds,
        }
    }

    /// Compute attributes, if this is a compute key
    pub fn compute(&self) -> Option<&ComputeKey> {
        match self {
            ComparisonKey::Ec2Classic(k) | ComparisonKey::Ec2Vpc(k) => Some(k),
            _ => None,
        }
    }

    /// Rebuild a compute key of the same category with a different placement
    pub(crate) fn with_placement(&self, placement: Placement) -> Option<ComparisonKey> {
        match self {
            ComparisonKey::Ec2Classic(k) => Some(ComparisonKey::Ec2Classic(ComputeKey {
                placement,
                ..k.clone()
            })),
            ComparisonKey::Ec2Vpc(k) => Some(ComparisonKey::Ec2Vpc(ComputeKey {
                placement,
                ..k.clone()
            })),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonKey::Ec2Classic(k) | ComparisonKey::Ec2Vpc(k) => {
                write!(f, "{} {} {}", k.instance_type, k.placement, k.platform)
            }
            ComparisonKey::ElastiCache(k) => write!(f, "{} {}", k.node_type, k.region),
            ComparisonKey::Rds(k) => write!(f, "{} {} {}", k.instance_class, k.region, k.engine),
        }
    }
}

// Keys appear as JSON object keys in rendered reports, so they serialize as strings.
impl Serialize for ComparisonKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compute(zone: Option<&str>) -> ComputeKey {
        ComputeKey {
            instance_type: InstanceType {
                family: "m5".to_string(),
                size: "large".to_string(),
            },
            placement: match zone {
                Some(z) => Placement::Zone {
                    region: "us-east-1".to_string(),
                    zone: z.to_string(),
                },
                None => Placement::Region {
                    region: "us-east-1".to_string(),
                },
            },
            platform: "Linux/UNIX".to_string(),
        }
    }

    #[test]
    fn test_same_attributes_different_service_never_equal() {
        let classic = ComparisonKey::Ec2Classic(compute(Some("us-east-1a")));
        let vpc = ComparisonKey::Ec2Vpc(compute(Some("us-east-1a")));
        assert_ne!(classic, vpc);
        assert_eq!(classic.service(), ServiceCategory::Ec2Classic);
        assert_eq!(vpc.service(), ServiceCategory::Ec2Vpc);
    }

    #[test]
    fn test_zonal_and_regional_keys_differ() {
        let zonal = ComparisonKey::Ec2Vpc(compute(Some("us-east-1a")));
        let regional = ComparisonKey::Ec2Vpc(compute(None));
        assert_ne!(zonal, regional);
        assert_eq!(
            zonal.with_placement(Placement::Region {
                region: "us-east-1".to_string()
            }),
            Some(regional)
        );
    }

    #[test]
    fn test_display_formats() {
        let zonal = ComparisonKey::Ec2Vpc(compute(Some("us-east-1a")));
        assert_eq!(zonal.to_string(), "m5.large us-east-1a Linux/UNIX");

        let regional = ComparisonKey::Ec2Vpc(compute(None));
        assert_eq!(regional.to_string(), "m5.large us-east-1 (regional) Linux/UNIX");

        let db = ComparisonKey::Rds(DatabaseKey {
            instance_class: "db.r5.large".to_string(),
            region: "us-east-1".to_string(),
            engine: "postgres".to_string(),
        });
        assert_eq!(db.to_string(), "db.r5.large us-east-1 postgres");
    }

    #[test]
    fn test_key_serializes_as_string() {
        let key = ComparisonKey::ElastiCache(CacheKey {
            node_type: "cache.r5.large".to_string(),
            region: "us-west-2".to_string(),
        });
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"cache.r5.large us-west-2\"");
    }
}
