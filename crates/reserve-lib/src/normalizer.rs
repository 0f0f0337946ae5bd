//! Key normalization
//!
//! Every raw record goes through [`build_key`], the single routine that decides
//! attribute order, casing and validation. Call sites never assemble key strings
//! themselves.

use crate::error::{ReconcileError, Result};
use crate::key::{CacheKey, ComparisonKey, ComputeKey, DatabaseKey, InstanceType, Placement};
use crate::models::{RawReservation, RawResource, ReservationRecord, ResourceRecord, ServiceCategory};

/// Borrowed view of the attributes both raw record kinds share
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyAttributes<'a> {
    pub instance_type: Option<&'a str>,
    pub region: Option<&'a str>,
    pub availability_zone: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub engine: Option<&'a str>,
}

impl<'a> From<&'a RawResource> for KeyAttributes<'a> {
    fn from(raw: &'a RawResource) -> Self {
        Self {
            instance_type: raw.instance_type.as_deref(),
            region: raw.region.as_deref(),
            availability_zone: raw.availability_zone.as_deref(),
            platform: raw.platform.as_deref(),
            engine: raw.engine.as_deref(),
        }
    }
}

impl<'a> From<&'a RawReservation> for KeyAttributes<'a> {
    fn from(raw: &'a RawReservation) -> Self {
        Self {
            instance_type: raw.instance_type.as_deref(),
            region: raw.region.as_deref(),
            availability_zone: raw.availability_zone.as_deref(),
            platform: raw.platform.as_deref(),
            engine: raw.engine.as_deref(),
        }
    }
}

/// How compute placement is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Running capacity: an availability zone is required
    Running,
    /// Reservation: no availability zone means regional scope
    Reservation,
}

/// Normalize a running resource
pub fn normalize_resource(service: ServiceCategory, raw: &RawResource) -> Result<ResourceRecord> {
    let key = build_key(service, KeyAttributes::from(raw), Scope::Running)?;
    let id = trimmed(service, "id", raw.id.as_deref())?.to_string();
    Ok(ResourceRecord { key, id })
}

/// Normalize a reservation
///
/// Key attributes are validated before the quantity, so a record that is both
/// malformed and zero-quantity is reported as malformed.
pub fn normalize_reservation(
    service: ServiceCategory,
    raw: &RawReservation,
) -> Result<ReservationRecord> {
    let key = build_key(service, KeyAttributes::from(raw), Scope::Reservation)?;
    let id = trimmed(service, "id", raw.id.as_deref())?.to_string();

    let quantity = u32::try_from(raw.quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| ReconcileError::InvalidQuantity {
            id: id.clone(),
            quantity: raw.quantity,
        })?;

    Ok(ReservationRecord {
        key,
        id,
        quantity,
        expires_at: raw.expires_at,
    })
}

/// Build the comparison key for one record of the given service
pub fn build_key(
    service: ServiceCategory,
    attrs: KeyAttributes<'_>,
    scope: Scope,
) -> Result<ComparisonKey> {
    match service {
        ServiceCategory::Ec2Classic => Ok(ComparisonKey::Ec2Classic(compute_key(
            service, attrs, scope,
        )?)),
        ServiceCategory::Ec2Vpc => Ok(ComparisonKey::Ec2Vpc(compute_key(service, attrs, scope)?)),
        ServiceCategory::ElastiCache => Ok(ComparisonKey::ElastiCache(CacheKey {
            node_type: type_name(service, attrs.instance_type)?,
            region: lowered(service, "region", attrs.region)?,
        })),
        ServiceCategory::Rds => Ok(ComparisonKey::Rds(DatabaseKey {
            instance_class: type_name(service, attrs.instance_type)?,
            region: lowered(service, "region", attrs.region)?,
            engine: lowered(service, "engine", attrs.engine)?,
        })),
    }
}

fn compute_key(
    service: ServiceCategory,
    attrs: KeyAttributes<'_>,
    scope: Scope,
) -> Result<ComputeKey> {
    let instance_type = parse_instance_type(service, attrs.instance_type)?;
    let region = lowered(service, "region", attrs.region)?;
    let platform = trimmed(service, "platform", attrs.platform)?.to_string();

    let zone = attrs
        .availability_zone
        .map(str::trim)
        .filter(|z| !z.is_empty())
        .map(str::to_ascii_lowercase);

    let placement = match (zone, scope) {
        (Some(zone), _) => {
            if zone.len() <= region.len() || !zone.starts_with(&region) {
                return Err(ReconcileError::malformed(
                    service,
                    "availability_zone",
                    format!("{} is not a zone of region {}", zone, region),
                ));
            }
            Placement::Zone { region, zone }
        }
        (None, Scope::Reservation) => Placement::Region { region },
        (None, Scope::Running) => return Err(ReconcileError::missing(service, "availability_zone")),
    };

    Ok(ComputeKey {
        instance_type,
        placement,
        platform,
    })
}

fn parse_instance_type(service: ServiceCategory, value: Option<&str>) -> Result<InstanceType> {
    let raw = lowered(service, "instance_type", value)?;
    let Some((family, size)) = raw.split_once('.') else {
        return Err(ReconcileError::malformed(
            service,
            "instance_type",
            format!("{} is not of the form <family>.<size>", raw),
        ));
    };

    let valid = |part: &str| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    };
    if !valid(family) || !valid(size) {
        return Err(ReconcileError::malformed(
            service,
            "instance_type",
            format!("{} is not of the form <family>.<size>", raw),
        ));
    }

    Ok(InstanceType {
        family: family.to_string(),
        size: size.to_string(),
    })
}

/// Cache node types and database classes are kept whole (`cache.r5.large`)
fn type_name(service: ServiceCategory, value: Option<&str>) -> Result<String> {
    let name = lowered(service, "instance_type", value)?;
    if name.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(ReconcileError::malformed(
            service,
            "instance_type",
            format!("{} contains invalid characters", name),
        ));
    }
    Ok(name)
}

fn trimmed<'a>(service: ServiceCategory, field: &'static str, value: Option<&'a str>) -> Result<&'a str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ReconcileError::missing(service, field))
}

fn lowered(service: ServiceCategory, field: &'static str, value: Option<&str>) -> Result<String> {
    trimmed(service, field, value).map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn running(instance_type: &str, zone: Option<&str>) -> RawResource {
        RawResource {
            id: Some("i-0001".to_string()),
            instance_type: Some(instance_type.to_string()),
            region: Some("us-east-1".to_string()),
            availability_zone: zone.map(str::to_string),
            platform: Some("Linux/UNIX".to_string()),
            engine: None,
        }
    }

    fn reservation(quantity: i64, zone: Option<&str>) -> RawReservation {
        RawReservation {
            id: Some("ri-0001".to_string()),
            instance_type: Some("m5.large".to_string()),
            region: Some("us-east-1".to_string()),
            availability_zone: zone.map(str::to_string),
            platform: Some("Linux/UNIX".to_string()),
            engine: None,
            quantity,
            expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_equal_records_produce_equal_keys() {
        let a = normalize_resource(ServiceCategory::Ec2Vpc, &running("m5.large", Some("us-east-1a")))
            .unwrap();
        let b = normalize_resource(ServiceCategory::Ec2Vpc, &running("m5.large", Some("us-east-1a")))
            .unwrap();
        assert_eq!(a.key, b.key);
    }

    #[test]
    fn test_case_and_whitespace_are_normalized() {
        let a = normalize_resource(ServiceCategory::Ec2Vpc, &running("m5.large", Some("us-east-1a")))
            .unwrap();
        let mut raw = running(" M5.Large ", Some("US-EAST-1A"));
        raw.region = Some(" US-East-1".to_string());
        let b = normalize_resource(ServiceCategory::Ec2Vpc, &raw).unwrap();
        assert_eq!(a.key, b.key);
    }

    #[test]
    fn test_field_order_does_not_affect_key() {
        let first: RawResource = serde_json::from_str(
            r#"{"id": "i-1", "instance_type": "m5.large", "region": "us-east-1",
                "availability_zone": "us-east-1b", "platform": "Linux/UNIX"}"#,
        )
        .unwrap();
        let second: RawResource = serde_json::from_str(
            r#"{"platform": "Linux/UNIX", "availability_zone": "us-east-1b",
                "region": "us-east-1", "instance_type": "m5.large", "id": "i-1"}"#,
        )
        .unwrap();

        let a = normalize_resource(ServiceCategory::Ec2Classic, &first).unwrap();
        let b = normalize_resource(ServiceCategory::Ec2Classic, &second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_comma_separated_instance_type_rejected() {
        let err = normalize_resource(ServiceCategory::Ec2Vpc, &running("m5,large", Some("us-east-1a")))
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::MalformedRecord {
                field: "instance_type",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_region_rejected() {
        let mut raw = running("m5.large", Some("us-east-1a"));
        raw.region = None;
        let err = normalize_resource(ServiceCategory::Ec2Vpc, &raw).unwrap_err();
        assert_eq!(err, ReconcileError::missing(ServiceCategory::Ec2Vpc, "region"));
    }

    #[test]
    fn test_empty_region_rejected() {
        let raw = RawResource {
            id: Some("cache-1".to_string()),
            instance_type: Some("cache.r5.large".to_string()),
            region: Some("   ".to_string()),
            ..Default::default()
        };
        let err = normalize_resource(ServiceCategory::ElastiCache, &raw).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::missing(ServiceCategory::ElastiCache, "region")
        );
    }

    #[test]
    fn test_running_compute_requires_zone() {
        let err = normalize_resource(ServiceCategory::Ec2Vpc, &running("m5.large", None)).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::missing(ServiceCategory::Ec2Vpc, "availability_zone")
        );
    }

    #[test]
    fn test_zone_outside_region_rejected() {
        let err = normalize_resource(ServiceCategory::Ec2Vpc, &running("m5.large", Some("eu-west-1a")))
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::MalformedRecord {
                field: "availability_zone",
                ..
            }
        ));
    }

    #[test]
    fn test_reservation_without_zone_is_regional() {
        let record = normalize_reservation(ServiceCategory::Ec2Vpc, &reservation(2, None)).unwrap();
        let compute = record.key.compute().unwrap();
        assert_eq!(
            compute.placement,
            Placement::Region {
                region: "us-east-1".to_string()
            }
        );
        assert_eq!(record.quantity, 2);
    }

    #[test]
    fn test_zonal_reservation_matches_running_key() {
        let running = normalize_resource(ServiceCategory::Ec2Vpc, &running("m5.large", Some("us-east-1a")))
            .unwrap();
        let reserved =
            normalize_reservation(ServiceCategory::Ec2Vpc, &reservation(1, Some("us-east-1a"))).unwrap();
        assert_eq!(running.key, reserved.key);

        let other_zone =
            normalize_reservation(ServiceCategory::Ec2Vpc, &reservation(1, Some("us-east-1b"))).unwrap();
        assert_ne!(running.key, other_zone.key);
    }

    #[test]
    fn test_invalid_quantity() {
        for quantity in [0, -3] {
            let err = normalize_reservation(ServiceCategory::Ec2Vpc, &reservation(quantity, None))
                .unwrap_err();
            assert_eq!(
                err,
                ReconcileError::InvalidQuantity {
                    id: "ri-0001".to_string(),
                    quantity
                }
            );
        }
    }

    #[test]
    fn test_malformed_takes_precedence_over_quantity() {
        let mut raw = reservation(0, None);
        raw.instance_type = None;
        let err = normalize_reservation(ServiceCategory::Ec2Vpc, &raw).unwrap_err();
        assert_eq!(err.kind(), "malformed_record");
    }

    #[test]
    fn test_database_key_requires_engine() {
        let raw = RawResource {
            id: Some("db-1".to_string()),
            instance_type: Some("db.r5.large".to_string()),
            region: Some("us-east-1".to_string()),
            ..Default::default()
        };
        let err = normalize_resource(ServiceCategory::Rds, &raw).unwrap_err();
        assert_eq!(err, ReconcileError::missing(ServiceCategory::Rds, "engine"));

        let raw = RawResource {
            engine: Some("Postgres".to_string()),
            ..raw
        };
        let record = normalize_resource(ServiceCategory::Rds, &raw).unwrap();
        assert_eq!(record.key.to_string(), "db.r5.large us-east-1 postgres");
    }
}
