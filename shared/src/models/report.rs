//! Result bundle handed to the rendering, email and CLI layers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DeadStockItem, VariantRow};
use crate::types::{DateRange, ReportPeriod};

/// Everything one report run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportBundle {
    pub run_id: Uuid,
    pub period: ReportPeriod,
    pub range: DateRange,
    pub generated_at: DateTime<Utc>,
    /// All variant rows, sold quantity descending
    pub rows: Vec<VariantRow>,
    /// Rows that qualify for reordering, most urgent first
    pub rop_rows: Vec<VariantRow>,
    /// All rows ranked by revenue with their ABC tier
    pub abc_rows: Vec<VariantRow>,
    pub dead_stock: Vec<DeadStockItem>,
    pub dead_stock_status: DeadStockStatus,
    pub totals: Totals,
    pub timing: Timing,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Totals {
    pub qty: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timing {
    pub fetch_ms: u64,
    pub enrich_ms: u64,
    pub total_ms: u64,
}

/// Whether the dead-stock pass ran for this report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeadStockStatus {
    Computed,
    Skipped { reason: String },
}

/// Counters from the order collector
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionStats {
    pub pages: u32,
    pub orders_accepted: u32,
    pub dropped_invalid: u32,
    pub out_of_range: u32,
    /// Page ceiling hit while the API still reported more pages
    pub truncated: bool,
    /// A page after the first failed; the remaining pages were skipped
    pub partial: bool,
}

impl CollectionStats {
    pub fn merge(&mut self, other: &CollectionStats) {
        self.pages += other.pages;
        self.orders_accepted += other.orders_accepted;
        self.dropped_invalid += other.dropped_invalid;
        self.out_of_range += other.out_of_range;
        self.truncated |= other.truncated;
        self.partial |= other.partial;
    }
}

/// Counters from the inventory enricher
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub variants_requested: u32,
    pub variants_resolved: u32,
    pub variant_failures: u32,
    pub chunk_failures: u32,
    pub location_failures: u32,
    pub fallback_used: u32,
}

impl EnrichmentStats {
    pub fn merge(&mut self, other: &EnrichmentStats) {
        self.variants_requested += other.variants_requested;
        self.variants_resolved += other.variants_resolved;
        self.variant_failures += other.variant_failures;
        self.chunk_failures += other.chunk_failures;
        self.location_failures += other.location_failures;
        self.fallback_used += other.fallback_used;
    }
}

/// Best-effort bookkeeping: what was dropped, skipped or degraded
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostics {
    pub collection: CollectionStats,
    pub lookback: CollectionStats,
    pub enrichment: EnrichmentStats,
    pub warnings: Vec<String>,
}
