//! Order collector tests
//!
//! Pagination, page ceiling, partial collections and record-level drops.

mod common;

use std::sync::Arc;

use common::*;
use shared::DateRange;
use shelfwise_backend::services::OrderCollector;
use shelfwise_backend::AppError;
use tokio_test::{assert_err, assert_ok};

fn june_first() -> DateRange {
    DateRange::new(at(2024, 6, 1, 0), at(2024, 6, 2, 0))
}

fn orders(count: usize) -> Vec<shared::OrderRecord> {
    (0..count)
        .map(|n| order(&format!("{}", 1000 + n), at(2024, 6, 1, 10), vec![item("1", 1, "5.00")]))
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Pages are followed until the cursor runs out
    #[tokio::test]
    async fn test_follows_cursor_to_the_end() {
        let api = Arc::new(FakeCommerce {
            orders: orders(7),
            page_size: 3,
            ..Default::default()
        });
        let collector = OrderCollector::new(api.clone(), 100);

        let collection = assert_ok!(collector.collect(&june_first()).await);

        assert_eq!(collection.lines.len(), 7);
        assert_eq!(collection.stats.pages, 3);
        assert_eq!(collection.stats.orders_accepted, 7);
        assert!(!collection.stats.truncated);
        assert!(!collection.stats.partial);
        assert_eq!(api.calls("orders_page"), 3);
    }

    /// An API that never stops paging is cut off at the ceiling
    #[tokio::test]
    async fn test_page_ceiling() {
        let api = Arc::new(FakeCommerce {
            orders: orders(1),
            endless: true,
            ..Default::default()
        });
        let collector = OrderCollector::new(api.clone(), 100);

        let collection = collector.collect(&june_first()).await.unwrap();

        assert_eq!(api.calls("orders_page"), 100);
        assert_eq!(collection.stats.pages, 100);
        assert!(collection.stats.truncated);
    }

    /// Without a first page there is nothing to report on
    #[tokio::test]
    async fn test_first_page_failure_fails_collection() {
        let api = Arc::new(FakeCommerce {
            orders: orders(3),
            failing_pages: [1].into_iter().collect(),
            ..Default::default()
        });
        let collector = OrderCollector::new(api, 100);

        let error = assert_err!(collector.collect(&june_first()).await);
        assert!(matches!(error, AppError::CollectionFailed(_)));
    }

    /// A later page failure keeps what was already collected
    #[tokio::test]
    async fn test_later_page_failure_is_partial() {
        let api = Arc::new(FakeCommerce {
            orders: orders(10),
            page_size: 4,
            failing_pages: [2].into_iter().collect(),
            ..Default::default()
        });
        let collector = OrderCollector::new(api.clone(), 100);

        let collection = assert_ok!(collector.collect(&june_first()).await);

        assert_eq!(collection.lines.len(), 4);
        assert!(collection.stats.partial);
        assert_eq!(api.calls("orders_page"), 2);
    }

    /// Malformed records are dropped and counted; the rest of the page survives
    #[tokio::test]
    async fn test_invalid_records_are_dropped() {
        let mut records = orders(3);
        records[0].line_items = None;
        records[1].created_at = None;

        let api = Arc::new(FakeCommerce {
            orders: records,
            ..Default::default()
        });
        let collector = OrderCollector::new(api, 100);

        let collection = collector.collect(&june_first()).await.unwrap();

        assert_eq!(collection.stats.dropped_invalid, 2);
        assert_eq!(collection.stats.orders_accepted, 1);
        assert_eq!(collection.lines.len(), 1);
    }

    /// Negative quantities reject the whole record
    #[tokio::test]
    async fn test_negative_quantity_dropped() {
        let api = Arc::new(FakeCommerce {
            orders: vec![
                order("1", at(2024, 6, 1, 9), vec![item("1", -2, "5.00")]),
                order("2", at(2024, 6, 1, 9), vec![item("1", 2, "5.00")]),
            ],
            ..Default::default()
        });
        let collector = OrderCollector::new(api, 100);

        let collection = collector.collect(&june_first()).await.unwrap();
        assert_eq!(collection.stats.dropped_invalid, 1);
        assert_eq!(collection.lines.len(), 1);
        assert_eq!(collection.lines[0].quantity, 2);
    }
}
