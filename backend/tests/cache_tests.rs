//! Report cache tests
//!
//! TTL expiry on a manual clock, insertion-order eviction and key scoping.

mod common;

use std::sync::Arc;

use chrono::Duration;
use common::at;
use proptest::prelude::*;
use shared::{DateRange, ReportPeriod};
use shelfwise_backend::services::{CacheKey, ManualClock, ReportCache};

fn cache(max_entries: usize) -> (Arc<ManualClock>, ReportCache<u32>) {
    let clock = Arc::new(ManualClock::new(at(2024, 6, 3, 9)));
    let cache = ReportCache::new(max_entries, clock.clone());
    (clock, cache)
}

fn key(n: usize) -> CacheKey {
    CacheKey::from(format!("daily|false|bucket-{}|active", n).as_str())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let (_, cache) = cache(15);
        cache.set(key(1), 42, Duration::minutes(10));
        assert_eq!(cache.get(&key(1)), Some(42));
        assert_eq!(cache.get(&key(2)), None);
    }

    /// Entries vanish once their TTL has elapsed
    #[test]
    fn test_ttl_expiry() {
        let (clock, cache) = cache(15);
        cache.set(key(1), 1, Duration::minutes(3));

        clock.advance(Duration::minutes(2));
        assert_eq!(cache.get(&key(1)), Some(1));

        clock.advance(Duration::minutes(1));
        assert_eq!(cache.get(&key(1)), None);
        assert!(cache.is_empty());
    }

    /// The (N+1)th insertion evicts the first one, even if it was just read
    #[test]
    fn test_insertion_order_eviction() {
        let (_, cache) = cache(15);
        for n in 0..15 {
            cache.set(key(n), n as u32, Duration::hours(1));
        }
        assert_eq!(cache.get(&key(0)), Some(0));

        cache.set(key(15), 15, Duration::hours(1));

        assert_eq!(cache.len(), 15);
        assert_eq!(cache.get(&key(0)), None);
        assert_eq!(cache.get(&key(1)), Some(1));
        assert_eq!(cache.get(&key(15)), Some(15));
    }

    /// Re-setting a key moves it to the back of the eviction queue
    #[test]
    fn test_reset_counts_as_fresh_insertion() {
        let (_, cache) = cache(3);
        cache.set(key(0), 0, Duration::hours(1));
        cache.set(key(1), 1, Duration::hours(1));
        cache.set(key(2), 2, Duration::hours(1));
        cache.set(key(0), 10, Duration::hours(1));

        cache.set(key(3), 3, Duration::hours(1));

        assert_eq!(cache.get(&key(0)), Some(10));
        assert_eq!(cache.get(&key(1)), None);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_clear() {
        let (_, cache) = cache(15);
        cache.set(key(1), 1, Duration::hours(1));
        cache.set(key(2), 2, Duration::hours(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key(1)), None);
    }

    /// Location scope is part of the key
    #[test]
    fn test_scope_in_key() {
        let range = DateRange::new(at(2024, 6, 2, 0), at(2024, 6, 3, 0));
        let now = at(2024, 6, 3, 9);
        let active = CacheKey::for_report(ReportPeriod::Daily, &range, false, now);
        let all = CacheKey::for_report(ReportPeriod::Daily, &range, true, now);
        assert_ne!(active, all);
    }

    /// Sub-day ranges on the same calendar days get distinct keys
    #[test]
    fn test_sub_day_ranges_in_key() {
        let now = at(2024, 6, 3, 9);
        let morning = DateRange::new(at(2024, 6, 1, 0), at(2024, 6, 1, 6));
        let evening = DateRange::new(at(2024, 6, 1, 0), at(2024, 6, 1, 20));
        assert_ne!(
            CacheKey::for_report(ReportPeriod::Daily, &morning, false, now),
            CacheKey::for_report(ReportPeriod::Daily, &evening, false, now)
        );
    }

    /// `today` keys carry the range as well as the hour
    #[test]
    fn test_today_range_in_key() {
        let now = at(2024, 6, 3, 9);
        let current = DateRange::new(at(2024, 6, 3, 0), at(2024, 6, 4, 0));
        let earlier = DateRange::new(at(2024, 6, 1, 0), at(2024, 6, 2, 0));
        assert_ne!(
            CacheKey::for_report(ReportPeriod::Today, &current, false, now),
            CacheKey::for_report(ReportPeriod::Today, &earlier, false, now)
        );
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The cache never holds more than its capacity
        #[test]
        fn prop_bounded(capacity in 1usize..20, keys in prop::collection::vec(0usize..40, 0..200)) {
            let (_, cache) = cache(capacity);
            for k in keys {
                cache.set(key(k), k as u32, Duration::hours(1));
                prop_assert!(cache.len() <= capacity);
            }
        }

        /// The most recent insertion is always retrievable
        #[test]
        fn prop_latest_survives(capacity in 1usize..20, keys in prop::collection::vec(0usize..40, 1..100)) {
            let (_, cache) = cache(capacity);
            for k in &keys {
                cache.set(key(*k), *k as u32, Duration::hours(1));
            }
            let last = *keys.last().unwrap();
            prop_assert_eq!(cache.get(&key(last)), Some(last as u32));
        }
    }
}
