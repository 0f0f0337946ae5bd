//! Multiset aggregation of running and reserved capacity
//!
//! Counts are pooled across every account fed into one aggregator: a
//! reservation bought in one account offsets matching running capacity in any
//! other account of the same run. This mirrors how consolidated billing applies
//! reservations. If accounts must be reconciled in isolation, build one
//! aggregator per account instead.

use std::collections::BTreeMap;
use tracing::warn;

use crate::key::ComparisonKey;
use crate::models::ServiceCategory;

/// Count per comparison key
pub type CountMapping = BTreeMap<ComparisonKey, u64>;

/// Running and reserved counts for one service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCounts {
    pub running: CountMapping,
    pub reserved: CountMapping,
}

/// Accumulates running/reserved counts per service across all accounts of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultisetAggregator {
    services: BTreeMap<ServiceCategory, ServiceCounts>,
}

impl Default for MultisetAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl MultisetAggregator {
    pub fn new() -> Self {
        Self {
            services: ServiceCategory::ALL
                .into_iter()
                .map(|service| (service, ServiceCounts::default()))
                .collect(),
        }
    }

    /// Count one running resource; the service is the key's own category
    pub fn add_running(&mut self, key: ComparisonKey) {
        *self.counts_mut(key.service()).running.entry(key).or_insert(0) += 1;
    }

    /// Add `quantity` reserved units for a key
    ///
    /// A zero quantity is a caller error: it is logged and nothing is counted.
    pub fn add_reserved(&mut self, key: ComparisonKey, quantity: u32) {
        if quantity == 0 {
            warn!(
                event = "zero_quantity",
                service = key.service().as_str(),
                key = %key,
                "Ignoring reservation with zero quantity"
            );
            return;
        }

        *self.counts_mut(key.service()).reserved.entry(key).or_insert(0) += u64::from(quantity);
    }

    /// Counts collected so far for a service
    pub fn counts(&self, service: ServiceCategory) -> &ServiceCounts {
        // Every category is seeded in `new`
        &self.services[&service]
    }

    pub fn running(&self, service: ServiceCategory) -> &CountMapping {
        &self.counts(service).running
    }

    pub fn reserved(&self, service: ServiceCategory) -> &CountMapping {
        &self.counts(service).reserved
    }

    fn counts_mut(&mut self, service: ServiceCategory) -> &mut ServiceCounts {
        self.services.entry(service).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::CacheKey;

    fn cache_key(node_type: &str) -> ComparisonKey {
        ComparisonKey::ElastiCache(CacheKey {
            node_type: node_type.to_string(),
            region: "us-west-2".to_string(),
        })
    }

    #[test]
    fn test_add_running_increments_by_one() {
        let mut agg = MultisetAggregator::new();
        agg.add_running(cache_key("cache.r5.large"));
        agg.add_running(cache_key("cache.r5.large"));
        agg.add_running(cache_key("cache.t3.micro"));

        let running = agg.running(ServiceCategory::ElastiCache);
        assert_eq!(running[&cache_key("cache.r5.large")], 2);
        assert_eq!(running[&cache_key("cache.t3.micro")], 1);
        assert!(agg.reserved(ServiceCategory::ElastiCache).is_empty());
        assert!(agg.running(ServiceCategory::Rds).is_empty());
    }

    #[test]
    fn test_add_reserved_sums_quantities() {
        let mut agg = MultisetAggregator::new();
        agg.add_reserved(cache_key("cache.r5.large"), 3);
        agg.add_reserved(cache_key("cache.r5.large"), 2);

        assert_eq!(
            agg.reserved(ServiceCategory::ElastiCache)[&cache_key("cache.r5.large")],
            5
        );
    }

    #[test]
    fn test_zero_quantity_is_noop() {
        let mut agg = MultisetAggregator::new();
        agg.add_reserved(cache_key("cache.r5.large"), 0);
        assert!(agg.reserved(ServiceCategory::ElastiCache).is_empty());
    }

    #[test]
    fn test_accounts_in_sequence_equal_union() {
        let account_a = vec![cache_key("cache.r5.large"), cache_key("cache.t3.micro")];
        let account_b = vec![cache_key("cache.r5.large")];

        let mut sequential = MultisetAggregator::new();
        for key in account_a.iter().chain(account_b.iter()) {
            sequential.add_running(key.clone());
        }

        let mut reversed = MultisetAggregator::new();
        for key in account_b.iter().chain(account_a.iter()).rev() {
            reversed.add_running(key.clone());
        }

        assert_eq!(sequential, reversed);
    }
}
