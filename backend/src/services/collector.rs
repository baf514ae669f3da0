//! Paginated order collector
//!
//! Follows the adapter's next-page token until it runs out or the page
//! ceiling is reached. Records are validated one by one; a bad record is
//! dropped and counted, never failing its page.

use std::sync::Arc;

use shared::{order_lines, CollectionStats, DateRange, OrderLine};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::external::CommerceApi;

/// Runaway guard for pagination
pub const DEFAULT_MAX_PAGES: u32 = 100;

/// Order lines for one date range, in arrival order
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub lines: Vec<OrderLine>,
    pub stats: CollectionStats,
}

pub struct OrderCollector {
    api: Arc<dyn CommerceApi>,
    max_pages: u32,
}

impl OrderCollector {
    pub fn new(api: Arc<dyn CommerceApi>, max_pages: u32) -> Self {
        Self {
            api,
            max_pages: max_pages.max(1),
        }
    }

    /// Collect every order line created inside `range`.
    ///
    /// Fails only when the first page cannot be fetched. A later page failure
    /// stops the walk and marks the collection partial.
    pub async fn collect(&self, range: &DateRange) -> AppResult<Collection> {
        let mut collection = Collection::default();
        let mut cursor: Option<String> = None;

        for page_number in 1..=self.max_pages {
            let page = match self.api.orders_page(range, cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) if page_number == 1 => {
                    return Err(AppError::CollectionFailed(format!(
                        "first order page for {} .. {}: {}",
                        range.start, range.end, e
                    )));
                }
                Err(e) => {
                    warn!(page = page_number, error = %e, "order page failed, keeping collected pages");
                    collection.stats.partial = true;
                    break;
                }
            };

            let stats = &mut collection.stats;
            stats.pages += 1;
            stats.dropped_invalid += page.undecodable;

            for record in &page.orders {
                let lines = match order_lines(record) {
                    Ok(lines) => lines,
                    Err(e) => {
                        warn!(page = page_number, order_id = %record.id, error = %e, "dropping invalid order");
                        stats.dropped_invalid += 1;
                        continue;
                    }
                };

                if !record.created_at.is_some_and(|at| range.contains(at)) {
                    stats.out_of_range += 1;
                    continue;
                }

                stats.orders_accepted += 1;
                collection.lines.extend(lines);
            }

            debug!(
                page = page_number,
                orders = page.orders.len(),
                has_next = page.next_cursor.is_some(),
                "collected order page"
            );

            match page.next_cursor {
                Some(next) if page_number == self.max_pages => {
                    warn!(
                        max_pages = self.max_pages,
                        next_cursor = %next,
                        "page ceiling reached, collection truncated"
                    );
                    collection.stats.truncated = true;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            pages = collection.stats.pages,
            orders = collection.stats.orders_accepted,
            lines = collection.lines.len(),
            dropped = collection.stats.dropped_invalid,
            "order collection finished"
        );

        Ok(collection)
    }
}
