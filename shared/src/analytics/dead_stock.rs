//! Dead-stock detection: stocked variants with no sales inside a lookback window

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{DeadStockItem, OrderLine, VariantInfo, VariantRow};
use crate::types::{DateRange, ReportPeriod};

pub const DEFAULT_LOOKBACK_DAYS: u32 = 90;

/// When the dead-stock pass runs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeadStockPolicy {
    Always,
    /// Only for `today` and `daily` runs
    #[default]
    FineGrainedOnly,
    Never,
}

impl DeadStockPolicy {
    pub fn applies_to(&self, period: ReportPeriod) -> bool {
        match self {
            DeadStockPolicy::Always => true,
            DeadStockPolicy::FineGrainedOnly => !period.is_coarse(),
            DeadStockPolicy::Never => false,
        }
    }

    /// Why the pass is skipped for `period`, or `None` when it runs
    pub fn skip_reason(&self, period: ReportPeriod) -> Option<String> {
        match self {
            _ if self.applies_to(period) => None,
            DeadStockPolicy::Never => Some("dead-stock detection disabled".to_string()),
            _ => Some(format!(
                "dead-stock detection skipped for {} reports",
                period
            )),
        }
    }
}

impl std::str::FromStr for DeadStockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(DeadStockPolicy::Always),
            "fine_grained_only" => Ok(DeadStockPolicy::FineGrainedOnly),
            "never" => Ok(DeadStockPolicy::Never),
            other => Err(format!("unknown dead-stock policy: {}", other)),
        }
    }
}

/// A variant considered for the dead-stock list, with its resolved stock
#[derive(Debug, Clone, PartialEq)]
pub struct DeadStockCandidate {
    pub variant_id: String,
    pub product_title: String,
    pub variant_title: String,
    pub sku: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i64,
}

impl DeadStockCandidate {
    pub fn from_row(row: &VariantRow, variant_id: &str) -> Self {
        Self {
            variant_id: variant_id.to_string(),
            product_title: row.product_title.clone(),
            variant_title: row.variant_title.clone(),
            sku: row.sku.clone(),
            unit_price: row.unit_price,
            quantity: 0,
        }
    }

    pub fn from_variant(info: &VariantInfo) -> Self {
        Self {
            variant_id: info.variant_id.clone(),
            product_title: info.product_title.clone(),
            variant_title: info.variant_title.clone(),
            sku: info.sku.clone(),
            unit_price: info.price,
            quantity: 0,
        }
    }
}

/// Variant ids of the report rows followed by stocked catalog variants, deduplicated.
///
/// Catalog variants reporting no positive stock are not candidates.
pub fn candidate_set(rows: &[VariantRow], catalog: &[VariantInfo]) -> Vec<DeadStockCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates = Vec::new();

    for row in rows {
        if let Some(id) = row.variant_id.as_deref() {
            if seen.insert(id.to_string()) {
                candidates.push(DeadStockCandidate::from_row(row, id));
            }
        }
    }

    for info in catalog {
        if info.inventory_quantity.unwrap_or(0) <= 0 {
            continue;
        }
        if seen.insert(info.variant_id.clone()) {
            candidates.push(DeadStockCandidate::from_variant(info));
        }
    }

    candidates
}

/// Variant ids that sold at least one unit inside `window`
pub fn sold_variant_ids(lines: &[OrderLine], window: &DateRange) -> HashSet<String> {
    lines
        .iter()
        .filter(|line| line.quantity > 0 && window.contains(line.created_at))
        .filter_map(|line| line.variant_id.clone())
        .collect()
}

/// Candidates with no sales in the window and stock left, highest value first
pub fn detect_dead_stock(
    candidates: &[DeadStockCandidate],
    sold: &HashSet<String>,
) -> Vec<DeadStockItem> {
    let mut items: Vec<DeadStockItem> = candidates
        .iter()
        .filter(|c| !sold.contains(&c.variant_id) && c.quantity > 0)
        .map(|c| DeadStockItem {
            variant_id: c.variant_id.clone(),
            product_title: c.product_title.clone(),
            variant_title: c.variant_title.clone(),
            sku: c.sku.clone(),
            quantity: c.quantity,
            unit_price: c.unit_price,
            total_value: c.unit_price * Decimal::from(c.quantity),
        })
        .collect();

    items.sort_by(|a, b| b.total_value.cmp(&a.total_value));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap()
    }

    fn candidate(id: &str, quantity: i64, price: i64) -> DeadStockCandidate {
        DeadStockCandidate {
            variant_id: id.to_string(),
            product_title: format!("Product {}", id),
            variant_title: "Default".to_string(),
            sku: None,
            unit_price: Decimal::from(price),
            quantity,
        }
    }

    fn sale(id: &str, days_ago: i64) -> OrderLine {
        OrderLine {
            order_id: "1".to_string(),
            created_at: now() - Duration::days(days_ago),
            channel: Channel::Online,
            variant_id: Some(id.to_string()),
            sku: None,
            product_title: "P".to_string(),
            variant_title: "Default".to_string(),
            quantity: 1,
            unit_price: Decimal::from(5),
            line_revenue: Decimal::from(5),
        }
    }

    fn info(id: &str, quantity: Option<i64>) -> VariantInfo {
        VariantInfo {
            variant_id: id.to_string(),
            product_title: "Catalog".to_string(),
            variant_title: "Default".to_string(),
            sku: Some(format!("SKU-{}", id)),
            price: Decimal::from(12),
            inventory_item_id: Some(format!("inv-{}", id)),
            inventory_quantity: quantity,
            platform_managed: false,
        }
    }

    #[test]
    fn test_policy() {
        let policy = DeadStockPolicy::default();
        assert!(policy.applies_to(ReportPeriod::Today));
        assert!(policy.applies_to(ReportPeriod::Daily));
        assert!(!policy.applies_to(ReportPeriod::Weekly));
        assert!(policy.skip_reason(ReportPeriod::Daily).is_none());
        assert!(policy
            .skip_reason(ReportPeriod::Monthly)
            .unwrap()
            .contains("monthly"));

        assert!(DeadStockPolicy::Always.applies_to(ReportPeriod::Monthly));
        assert!(!DeadStockPolicy::Never.applies_to(ReportPeriod::Today));
        assert_eq!(
            "never".parse::<DeadStockPolicy>(),
            Ok(DeadStockPolicy::Never)
        );
    }

    #[test]
    fn test_sold_variant_never_dead() {
        let window = DateRange::trailing(now(), 90);
        let sold = sold_variant_ids(&[sale("a", 89), sale("b", 120)], &window);

        let items = detect_dead_stock(&[candidate("a", 10, 5), candidate("b", 3, 5)], &sold);
        let ids: Vec<&str> = items.iter().map(|i| i.variant_id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_zero_quantity_excluded_and_sorted_by_value() {
        let items = detect_dead_stock(
            &[
                candidate("cheap", 10, 1),
                candidate("none", 0, 100),
                candidate("pricey", 2, 50),
            ],
            &HashSet::new(),
        );
        let ids: Vec<&str> = items.iter().map(|i| i.variant_id.as_str()).collect();
        assert_eq!(ids, vec!["pricey", "cheap"]);
        assert_eq!(items[0].total_value, Decimal::from(100));
    }

    #[test]
    fn test_candidate_set_union() {
        let line = sale("a", 1);
        let mut row = VariantRow::seed("a".to_string(), &line);
        row.accumulate(&line);
        let mut sku_row = row.clone();
        sku_row.key = "SKU:X".to_string();
        sku_row.variant_id = None;

        let catalog = vec![info("a", Some(4)), info("b", Some(7)), info("c", Some(0))];
        let candidates = candidate_set(&[row, sku_row], &catalog);
        let ids: Vec<&str> = candidates.iter().map(|c| c.variant_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(candidates[1].unit_price, Decimal::from(12));
    }
}
