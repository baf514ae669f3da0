//! Report engine: collect, aggregate, enrich, analyse
//!
//! One run produces a [`ReportBundle`]. Bundles are cached per period, date
//! bucket and location scope; a request may bypass the cache for itself
//! without affecting other callers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    aggregate, apply_reorder, candidate_set, classify_abc, detect_dead_stock, reorder_list,
    sold_variant_ids, totals, units_sold_by_key, DateRange, DeadStockItem, DeadStockStatus,
    Diagnostics, ReportBundle, ReportPeriod, Timing, VariantInfo, VariantRow,
};
use tokio::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::cache::{ttl_for, CacheKey, Clock, ReportCache};
use super::collector::{Collection, OrderCollector};
use super::enricher::{InventoryEnricher, LocationMemo};
use crate::config::{AnalyticsConfig, ApiGeneration, Config};
use crate::error::{AppError, AppResult};
use crate::external::CommerceApi;

/// What to report on
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub period: ReportPeriod,
    pub range: DateRange,
    /// Overrides the configured location scope for this request
    pub include_inactive_locations: Option<bool>,
    /// Skip both cache read and cache write for this request
    pub bypass_cache: bool,
}

#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub bundle: Arc<ReportBundle>,
    pub cache_hit: bool,
}

pub struct ReportService {
    api: Arc<dyn CommerceApi>,
    collector: OrderCollector,
    enricher: InventoryEnricher,
    cache: ReportCache<Arc<ReportBundle>>,
    analytics: AnalyticsConfig,
    cache_enabled: bool,
    max_pages: u32,
}

impl ReportService {
    pub fn new(api: Arc<dyn CommerceApi>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            collector: OrderCollector::new(api.clone(), config.commerce.max_pages),
            enricher: InventoryEnricher::new(api.clone(), config.commerce.inventory_chunk_size),
            cache: ReportCache::new(config.cache.max_entries, clock),
            analytics: config.analytics.clone(),
            cache_enabled: config.cache.enabled,
            max_pages: config.commerce.max_pages,
            api,
        }
    }

    pub fn generation(&self) -> ApiGeneration {
        self.api.generation()
    }

    pub fn now(&self) -> chrono::DateTime<Utc> {
        self.cache.now()
    }

    pub fn cache(&self) -> &ReportCache<Arc<ReportBundle>> {
        &self.cache
    }

    /// Drop every cached bundle, returning how many there were
    pub fn clear_cache(&self) -> usize {
        let cleared = self.cache.len();
        self.cache.clear();
        info!(cleared, "report cache cleared");
        cleared
    }

    /// Produce the bundle for `request`, from cache when possible
    pub async fn run(&self, request: ReportRequest) -> AppResult<ReportOutcome> {
        if request.range.is_empty() {
            return Err(AppError::InvalidRequest(format!(
                "empty date range {} .. {}",
                request.range.start, request.range.end
            )));
        }

        let include_inactive = request
            .include_inactive_locations
            .unwrap_or(self.analytics.include_inactive_locations);
        let use_cache = self.cache_enabled && !request.bypass_cache;
        let now = self.cache.now();
        let key = CacheKey::for_report(request.period, &request.range, include_inactive, now);

        if use_cache {
            if let Some(bundle) = self.cache.get(&key) {
                info!(key = key.as_str(), run_id = %bundle.run_id, "report served from cache");
                return Ok(ReportOutcome {
                    bundle,
                    cache_hit: true,
                });
            }
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("report", run_id = %run_id, period = %request.period);
        let bundle = self
            .build(run_id, &request, include_inactive)
            .instrument(span)
            .await?;
        let bundle = Arc::new(bundle);

        if use_cache {
            let ttl = ttl_for(request.period, &request.range, now);
            self.cache.set(key, bundle.clone(), ttl);
        }

        Ok(ReportOutcome {
            bundle,
            cache_hit: false,
        })
    }

    async fn build(
        &self,
        run_id: Uuid,
        request: &ReportRequest,
        include_inactive: bool,
    ) -> AppResult<ReportBundle> {
        let started = Instant::now();
        let range = request.range;
        let mut diagnostics = Diagnostics::default();

        info!(start = %range.start, end = %range.end, include_inactive, "report run started");

        // Orders for the report range; a failed first page ends the run here
        let collection = self.collector.collect(&range).await?;
        note_collection(&mut diagnostics.warnings, "report range", &collection);
        diagnostics.collection = collection.stats;
        let mut fetch_ms = elapsed_ms(started);

        let mut rows = aggregate(&collection.lines);

        let enrich_started = Instant::now();
        let mut memo = LocationMemo::new();
        diagnostics.enrichment = self.enricher.enrich(&mut rows, include_inactive, &mut memo).await;
        if diagnostics.enrichment.variant_failures > 0 || diagnostics.enrichment.chunk_failures > 0 {
            diagnostics.warnings.push(format!(
                "inventory incomplete: {} variant lookups and {} inventory chunks failed",
                diagnostics.enrichment.variant_failures, diagnostics.enrichment.chunk_failures
            ));
        }
        let mut enrich_ms = elapsed_ms(enrich_started);

        let dead_stock_policy = self.analytics.dead_stock_policy;
        let dead_stock_runs = dead_stock_policy.applies_to(request.period);

        // One lookback collection serves both the sales window and dead stock
        let lookback_started = Instant::now();
        let lookback_range =
            DateRange::trailing(range.end, self.analytics.lookback_days(dead_stock_runs));
        let lookback = match self.collector.collect(&lookback_range).await {
            Ok(lookback) => {
                note_collection(&mut diagnostics.warnings, "lookback", &lookback);
                diagnostics.lookback = lookback.stats;
                Some(lookback)
            }
            Err(e) => {
                warn!(error = %e, "lookback collection failed, skipping reorder and dead-stock");
                diagnostics
                    .warnings
                    .push(format!("lookback collection failed: {}", e));
                None
            }
        };
        fetch_ms += elapsed_ms(lookback_started);

        let mut rop_rows = Vec::new();
        if let Some(lookback) = &lookback {
            let sales_window = DateRange::trailing(range.end, self.analytics.sales_window_days);
            let sales = units_sold_by_key(&lookback.lines, &sales_window);
            apply_reorder(&mut rows, &sales, &self.analytics.reorder_policy());
            rop_rows = reorder_list(&rows);
        }

        let abc_rows = classify_abc(&rows);

        let dead_stock_started = Instant::now();
        let (dead_stock, dead_stock_status) = match (&lookback, dead_stock_policy.skip_reason(request.period)) {
            (_, Some(reason)) => (Vec::new(), DeadStockStatus::Skipped { reason }),
            (None, None) => (
                Vec::new(),
                DeadStockStatus::Skipped {
                    reason: "lookback collection failed".to_string(),
                },
            ),
            (Some(lookback), None) => {
                let items = self
                    .dead_stock(&rows, lookback, &range, include_inactive, &mut memo, &mut diagnostics)
                    .await;
                (items, DeadStockStatus::Computed)
            }
        };
        enrich_ms += elapsed_ms(dead_stock_started);

        let totals = totals(&rows);
        let timing = Timing {
            fetch_ms,
            enrich_ms,
            total_ms: elapsed_ms(started),
        };

        info!(
            rows = rows.len(),
            rop_rows = rop_rows.len(),
            dead_stock = dead_stock.len(),
            qty = totals.qty,
            revenue = %totals.revenue,
            total_ms = timing.total_ms,
            "report run finished"
        );

        Ok(ReportBundle {
            run_id,
            period: request.period,
            range,
            generated_at: self.cache.now(),
            rows,
            rop_rows,
            abc_rows,
            dead_stock,
            dead_stock_status,
            totals,
            timing,
            diagnostics,
        })
    }

    async fn dead_stock(
        &self,
        rows: &[VariantRow],
        lookback: &Collection,
        range: &DateRange,
        include_inactive: bool,
        memo: &mut LocationMemo,
        diagnostics: &mut Diagnostics,
    ) -> Vec<DeadStockItem> {
        let catalog = self.list_catalog(&mut diagnostics.warnings).await;
        let window = DateRange::trailing(range.end, self.analytics.dead_stock_lookback_days);
        let sold = sold_variant_ids(&lookback.lines, &window);

        let mut unsold: Vec<_> = candidate_set(rows, &catalog)
            .into_iter()
            .filter(|candidate| !sold.contains(&candidate.variant_id))
            .collect();

        // Report rows already carry stock under this run's location policy
        let row_stock: HashMap<&str, i64> = rows
            .iter()
            .filter_map(|row| row.variant_id.as_deref().map(|id| (id, row.on_hand())))
            .collect();
        let catalog_by_id: HashMap<&str, &VariantInfo> = catalog
            .iter()
            .map(|info| (info.variant_id.as_str(), info))
            .collect();

        let to_resolve: Vec<VariantInfo> = unsold
            .iter()
            .filter(|c| !row_stock.contains_key(c.variant_id.as_str()))
            .filter_map(|c| catalog_by_id.get(c.variant_id.as_str()).map(|info| (*info).clone()))
            .collect();
        let (stock, stats) = self
            .enricher
            .stock_for_variants(&to_resolve, include_inactive, memo)
            .await;
        diagnostics.enrichment.merge(&stats);

        for candidate in &mut unsold {
            candidate.quantity = match row_stock.get(candidate.variant_id.as_str()) {
                Some(quantity) => *quantity,
                None => stock
                    .get(&candidate.variant_id)
                    .map(|level| level.available)
                    .unwrap_or(0),
            };
        }

        detect_dead_stock(&unsold, &sold)
    }

    /// Catalog variants across pages, keeping what arrived before any failure
    async fn list_catalog(&self, warnings: &mut Vec<String>) -> Vec<VariantInfo> {
        let mut variants = Vec::new();
        let mut cursor: Option<String> = None;

        for page_number in 1..=self.max_pages {
            match self.api.catalog_page(cursor.as_deref()).await {
                Ok(page) => {
                    variants.extend(page.variants);
                    match page.next_cursor {
                        Some(next) if page_number < self.max_pages => cursor = Some(next),
                        Some(_) => {
                            warnings.push("catalog listing truncated at page ceiling".to_string());
                            break;
                        }
                        None => break,
                    }
                }
                Err(e) => {
                    warn!(page = page_number, error = %e, "catalog page failed");
                    warnings.push(format!("catalog listing incomplete: {}", e));
                    break;
                }
            }
        }

        variants
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn note_collection(warnings: &mut Vec<String>, label: &str, collection: &Collection) {
    if collection.stats.truncated {
        warnings.push(format!("{} orders truncated at the page ceiling", label));
    }
    if collection.stats.partial {
        warnings.push(format!("{} orders incomplete: a later page failed", label));
    }
    if collection.stats.dropped_invalid > 0 {
        warnings.push(format!(
            "{} orders: {} malformed records dropped",
            label, collection.stats.dropped_invalid
        ));
    }
}

/// Flat CSV line for one report row
#[derive(Debug, Serialize)]
pub struct CsvRow {
    pub key: String,
    pub variant_id: Option<String>,
    pub product_title: String,
    pub variant_title: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub sold_qty: i64,
    pub pos_qty: i64,
    pub online_qty: i64,
    pub revenue: Decimal,
    pub inventory_available: Option<i64>,
    pub inventory_incoming: Option<i64>,
    pub daily_velocity: Option<Decimal>,
    pub rop: Option<i64>,
    pub target: Option<i64>,
    pub suggested_qty: Option<i64>,
    pub coverage_days: Option<String>,
    pub urgency: Option<String>,
    pub abc_category: Option<String>,
    pub revenue_percent: Option<Decimal>,
    pub cumulative_percent: Option<Decimal>,
}

impl From<&VariantRow> for CsvRow {
    fn from(row: &VariantRow) -> Self {
        Self {
            key: row.key.clone(),
            variant_id: row.variant_id.clone(),
            product_title: row.product_title.clone(),
            variant_title: row.variant_title.clone(),
            sku: row.sku.clone(),
            unit_price: row.unit_price,
            sold_qty: row.sold_qty,
            pos_qty: row.pos_qty,
            online_qty: row.online_qty,
            revenue: row.revenue,
            inventory_available: row.inventory_available,
            inventory_incoming: row.inventory_incoming,
            daily_velocity: row.daily_velocity.map(|v| v.round_dp(2)),
            rop: row.rop,
            target: row.target,
            suggested_qty: row.suggested_qty,
            coverage_days: row.coverage.map(|coverage| match coverage {
                shared::Coverage::Days(days) => days.round_dp(1).to_string(),
                shared::Coverage::Infinite => "infinite".to_string(),
            }),
            urgency: row.urgency.map(|u| u.to_string()),
            abc_category: None,
            revenue_percent: None,
            cumulative_percent: None,
        }
    }
}

/// CSV lines for the main rows, with ABC tiers joined in by row key
pub fn csv_rows(bundle: &ReportBundle) -> Vec<CsvRow> {
    let abc: HashMap<&str, &VariantRow> = bundle
        .abc_rows
        .iter()
        .map(|row| (row.key.as_str(), row))
        .collect();

    bundle
        .rows
        .iter()
        .map(|row| {
            let mut line = CsvRow::from(row);
            if let Some(ranked) = abc.get(row.key.as_str()) {
                line.abc_category = ranked.abc_category.map(|c| c.to_string());
                line.revenue_percent = ranked.revenue_percent;
                line.cumulative_percent = ranked.cumulative_percent;
            }
            line
        })
        .collect()
}

/// Resolve a period to its default date range relative to `now`.
///
/// `today` is the current UTC day, `daily` the previous full day, `weekly`
/// and `monthly` the 7 and 30 full days before today.
pub fn default_range(period: ReportPeriod, now: chrono::DateTime<Utc>) -> DateRange {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);

    match period {
        ReportPeriod::Today => DateRange::new(midnight, midnight + chrono::Duration::days(1)),
        ReportPeriod::Daily => DateRange::trailing(midnight, 1),
        ReportPeriod::Weekly => DateRange::trailing(midnight, 7),
        ReportPeriod::Monthly => DateRange::trailing(midnight, 30),
    }
}
