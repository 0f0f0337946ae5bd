//! Per-service diff of running versus reserved counts

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::aggregator::CountMapping;
use crate::key::{ComparisonKey, Placement};

/// How reservations are matched to running capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Keys must be equal, zone for zone
    #[default]
    Strict,
    /// After strict matching, a regional compute reservation may cover an
    /// unreserved zonal instance of the same type and platform in its region
    RegionalFallback,
}

/// Unused and unreserved quantities for one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffResult {
    /// Keys where reserved exceeds running, with the surplus
    pub unused_reservations: CountMapping,
    /// Keys where running exceeds reserved, with the deficit
    pub unreserved_instances: CountMapping,
    pub qty_running_instances: u64,
    pub qty_reserved_instances: u64,
    pub qty_unreserved_instances: u64,
}

impl DiffResult {
    pub fn has_unused(&self) -> bool {
        !self.unused_reservations.is_empty()
    }

    pub fn has_unreserved(&self) -> bool {
        !self.unreserved_instances.is_empty()
    }

    /// Total surplus across all keys
    pub fn qty_unused_reservations(&self) -> u64 {
        self.unused_reservations.values().sum()
    }
}

/// Strict diff: every key in either mapping, absent keys count as zero
pub fn diff(running: &CountMapping, reserved: &CountMapping) -> DiffResult {
    let keys: BTreeSet<&ComparisonKey> = running.keys().chain(reserved.keys()).collect();

    let mut result = DiffResult::default();
    for key in keys {
        let run = running.get(key).copied().unwrap_or(0);
        let res = reserved.get(key).copied().unwrap_or(0);

        result.qty_running_instances += run;
        result.qty_reserved_instances += res;

        if res > run {
            result.unused_reservations.insert(key.clone(), res - run);
        } else if run > res {
            result.unreserved_instances.insert(key.clone(), run - res);
        }
    }

    result.qty_unreserved_instances = result.unreserved_instances.values().sum();
    result
}

/// Diff under the given matching policy
pub fn diff_with_policy(
    running: &CountMapping,
    reserved: &CountMapping,
    policy: MatchPolicy,
) -> DiffResult {
    let mut result = diff(running, reserved);
    if policy == MatchPolicy::RegionalFallback {
        apply_regional_fallback(&mut result);
    }
    result
}

fn apply_regional_fallback(result: &mut DiffResult) {
    let regional: Vec<ComparisonKey> = result
        .unused_reservations
        .keys()
        .filter(|key| {
            matches!(
                key.compute().map(|k| &k.placement),
                Some(Placement::Region { .. })
            )
        })
        .cloned()
        .collect();

    for regional_key in regional {
        let Some(compute) = regional_key.compute() else {
            continue;
        };
        let region = Placement::Region {
            region: compute.placement.region().to_string(),
        };

        let candidates: Vec<ComparisonKey> = result
            .unreserved_instances
            .keys()
            .filter(|zonal| zonal.with_placement(region.clone()).as_ref() == Some(&regional_key))
            .cloned()
            .collect();

        for zonal_key in candidates {
            let surplus = result.unused_reservations.get(&regional_key).copied().unwrap_or(0);
            if surplus == 0 {
                break;
            }
            let deficit = result.unreserved_instances.get(&zonal_key).copied().unwrap_or(0);
            let absorbed = surplus.min(deficit);

            settle(&mut result.unused_reservations, &regional_key, absorbed);
            settle(&mut result.unreserved_instances, &zonal_key, absorbed);
        }
    }

    result.qty_unreserved_instances = result.unreserved_instances.values().sum();
}

fn settle(counts: &mut CountMapping, key: &ComparisonKey, amount: u64) {
    if let Some(count) = counts.get_mut(key) {
        *count -= amount;
        if *count == 0 {
            counts.remove(key);
        }
    }
}
