//! Report pipeline services for Shelfwise

pub mod cache;
pub mod collector;
pub mod enricher;
pub mod reporting;

pub use cache::{CacheKey, Clock, ManualClock, ReportCache, SystemClock};
pub use collector::{Collection, OrderCollector};
pub use enricher::{InventoryEnricher, LocationMemo};
pub use reporting::{ReportOutcome, ReportRequest, ReportService};
