//! Variant and inventory enrichment
//!
//! Resolves report rows to inventory items and sums their per-location stock.
//! Calls are issued one at a time through the rate-limited client; any single
//! failed lookup degrades that row's stock to zero and is counted, it never
//! fails the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use shared::{EnrichmentStats, StockLevel, VariantInfo, VariantRow};
use tracing::{debug, info, warn};

use crate::external::CommerceApi;

/// Largest inventory-item batch the platform accepts in one level query
pub const MAX_CHUNK_SIZE: usize = 50;

/// Location active flags, fetched lazily and kept for one report run.
///
/// A location whose lookup fails is remembered as active so its stock still
/// counts and it is not retried within the run.
#[derive(Debug, Default)]
pub struct LocationMemo {
    active: HashMap<String, bool>,
}

impl LocationMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    async fn is_active(
        &mut self,
        api: &dyn CommerceApi,
        location_id: &str,
        stats: &mut EnrichmentStats,
    ) -> bool {
        if let Some(active) = self.active.get(location_id) {
            return *active;
        }

        let active = match api.location(location_id).await {
            Ok(location) => {
                debug!(location_id, name = %location.name, active = location.active, "resolved location");
                location.active
            }
            Err(e) => {
                warn!(location_id, error = %e, "location lookup failed, counting its stock");
                stats.location_failures += 1;
                true
            }
        };
        self.active.insert(location_id.to_string(), active);
        active
    }
}

pub struct InventoryEnricher {
    api: Arc<dyn CommerceApi>,
    chunk_size: usize,
}

impl InventoryEnricher {
    pub fn new(api: Arc<dyn CommerceApi>, chunk_size: usize) -> Self {
        Self {
            api,
            chunk_size: chunk_size.clamp(1, MAX_CHUNK_SIZE),
        }
    }

    /// Fill the inventory fields of `rows` in place.
    ///
    /// Rows without a variant id, and rows whose variant lookup failed, get
    /// zero stock.
    pub async fn enrich(
        &self,
        rows: &mut [VariantRow],
        include_inactive: bool,
        memo: &mut LocationMemo,
    ) -> EnrichmentStats {
        let mut stats = EnrichmentStats::default();

        let mut seen = HashSet::new();
        let variant_ids: Vec<String> = rows
            .iter()
            .filter_map(|row| row.variant_id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        stats.variants_requested = variant_ids.len() as u32;

        let mut variants: HashMap<String, VariantInfo> = HashMap::new();
        for variant_id in &variant_ids {
            match self.api.variant(variant_id).await {
                Ok(info) => {
                    variants.insert(variant_id.clone(), info);
                }
                Err(e) => {
                    warn!(variant_id = %variant_id, error = %e, "variant lookup failed");
                    stats.variant_failures += 1;
                }
            }
        }

        let infos: Vec<&VariantInfo> = variants.values().collect();
        let levels = self
            .resolve_levels(&infos, include_inactive, memo, &mut stats)
            .await;

        for row in rows.iter_mut() {
            let info = row.variant_id.as_ref().and_then(|id| variants.get(id));
            match info {
                Some(info) => {
                    let stock = stock_for(info, &levels, &mut stats);
                    row.inventory_available = Some(stock.available);
                    row.inventory_incoming = stock.incoming;
                    row.inventory_item_id = info.inventory_item_id.clone();
                }
                None => {
                    row.inventory_available = Some(0);
                    row.inventory_incoming = None;
                }
            }
        }

        stats.variants_resolved = variants.len() as u32;
        info!(
            variants = stats.variants_requested,
            resolved = stats.variants_resolved,
            variant_failures = stats.variant_failures,
            chunk_failures = stats.chunk_failures,
            locations = memo.len(),
            "inventory enrichment finished"
        );
        stats
    }

    /// Stock for catalog variants that are already known, keyed by variant id.
    ///
    /// Skips the per-variant lookups and applies the same location policy and
    /// fallback rules as [`enrich`](Self::enrich).
    pub async fn stock_for_variants(
        &self,
        variants: &[VariantInfo],
        include_inactive: bool,
        memo: &mut LocationMemo,
    ) -> (HashMap<String, StockLevel>, EnrichmentStats) {
        let mut stats = EnrichmentStats::default();
        let infos: Vec<&VariantInfo> = variants.iter().collect();
        let levels = self
            .resolve_levels(&infos, include_inactive, memo, &mut stats)
            .await;

        let stock = variants
            .iter()
            .map(|info| (info.variant_id.clone(), stock_for(info, &levels, &mut stats)))
            .collect();
        (stock, stats)
    }

    /// Summed levels per inventory item id.
    ///
    /// An item present in the map had level data returned, even if every one
    /// of its locations was filtered out.
    async fn resolve_levels(
        &self,
        variants: &[&VariantInfo],
        include_inactive: bool,
        memo: &mut LocationMemo,
        stats: &mut EnrichmentStats,
    ) -> HashMap<String, StockLevel> {
        let mut seen = HashSet::new();
        let item_ids: Vec<String> = variants
            .iter()
            .filter_map(|info| info.inventory_item_id.clone())
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let mut summed: HashMap<String, StockLevel> = HashMap::new();

        for (index, chunk) in item_ids.chunks(self.chunk_size).enumerate() {
            let levels = match self.api.inventory_levels(chunk).await {
                Ok(levels) => levels,
                Err(e) => {
                    warn!(chunk = index, items = chunk.len(), error = %e, "inventory chunk failed");
                    stats.chunk_failures += 1;
                    continue;
                }
            };

            for level in levels {
                let entry = summed.entry(level.inventory_item_id.clone()).or_default();
                let counted = include_inactive
                    || memo
                        .is_active(self.api.as_ref(), &level.location_id, stats)
                        .await;
                if !counted {
                    continue;
                }

                entry.available += level.available;
                if let Some(incoming) = level.incoming {
                    entry.incoming = Some(entry.incoming.unwrap_or(0) + incoming);
                }
            }
        }

        summed
    }
}

/// Level sum for a resolved variant, else its own on-hand figure when the
/// platform does not manage its stock, else zero
fn stock_for(
    info: &VariantInfo,
    levels: &HashMap<String, StockLevel>,
    stats: &mut EnrichmentStats,
) -> StockLevel {
    if let Some(stock) = info
        .inventory_item_id
        .as_ref()
        .and_then(|item_id| levels.get(item_id))
    {
        return *stock;
    }

    match info.inventory_quantity {
        Some(quantity) if !info.platform_managed => {
            stats.fallback_used += 1;
            StockLevel {
                available: quantity,
                incoming: None,
            }
        }
        _ => StockLevel::default(),
    }
}
