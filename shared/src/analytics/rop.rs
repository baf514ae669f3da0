//! Reorder point calculation
//!
//! ```text
//! velocity = sales_in_window / window_days
//! rop      = ceil(velocity * (lead + safety))
//! target   = ceil(velocity * (lead + safety + review))
//! coverage = on_hand / velocity            (infinite when velocity is 0)
//! suggest  = max(0, target - on_hand [- incoming])
//! ```
//!
//! Integer results are computed as exact integer ceilings of
//! `sales * days / window` so no rounding from the velocity division leaks in.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Coverage, Urgency, VariantRow};

pub const DEFAULT_SALES_WINDOW_DAYS: u32 = 30;
pub const DEFAULT_LEAD_DAYS: u32 = 7;
pub const DEFAULT_SAFETY_DAYS: u32 = 3;
pub const DEFAULT_REVIEW_DAYS: u32 = 14;

/// Knobs for the reorder calculation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReorderPolicy {
    pub sales_window_days: u32,
    pub lead_days: u32,
    pub safety_days: u32,
    pub review_days: u32,
    /// Subtract known inbound stock from the suggested quantity
    pub net_incoming: bool,
}

impl Default for ReorderPolicy {
    fn default() -> Self {
        Self {
            sales_window_days: DEFAULT_SALES_WINDOW_DAYS,
            lead_days: DEFAULT_LEAD_DAYS,
            safety_days: DEFAULT_SAFETY_DAYS,
            review_days: DEFAULT_REVIEW_DAYS,
            net_incoming: true,
        }
    }
}

/// Reorder figures for one item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReorderMetrics {
    pub daily_velocity: Decimal,
    pub rop: i64,
    pub target: i64,
    pub suggested_qty: i64,
    pub coverage: Coverage,
    pub urgency: Urgency,
}

impl ReorderMetrics {
    /// Whether the item belongs on the reorder list
    pub fn qualifies(&self, on_hand: i64) -> bool {
        self.suggested_qty > 0 || on_hand <= 1
    }
}

fn ceil_div(numerator: i64, denominator: i64) -> i64 {
    if numerator <= 0 {
        return 0;
    }
    (numerator + denominator - 1) / denominator
}

/// Compute reorder figures from units sold in the sales window and current stock
pub fn calculate_reorder(
    sales_in_window: i64,
    on_hand: i64,
    incoming: Option<i64>,
    policy: &ReorderPolicy,
) -> ReorderMetrics {
    let sales = sales_in_window.max(0);
    let window = i64::from(policy.sales_window_days.max(1));
    let protect_days = i64::from(policy.lead_days + policy.safety_days);
    let target_days = protect_days + i64::from(policy.review_days);

    let daily_velocity = Decimal::from(sales) / Decimal::from(window);
    let rop = ceil_div(sales * protect_days, window);
    let target = ceil_div(sales * target_days, window);

    let coverage = if sales > 0 {
        Coverage::Days(Decimal::from(on_hand * window) / Decimal::from(sales))
    } else {
        Coverage::Infinite
    };

    let inbound = match incoming {
        Some(qty) if policy.net_incoming => qty.max(0),
        _ => 0,
    };
    let suggested_qty = (target - on_hand - inbound).max(0);

    ReorderMetrics {
        daily_velocity,
        rop,
        target,
        suggested_qty,
        coverage,
        urgency: classify_urgency(&coverage, policy),
    }
}

/// `critical` within lead time, `high` within lead + safety, else `medium`
pub fn classify_urgency(coverage: &Coverage, policy: &ReorderPolicy) -> Urgency {
    if coverage.is_within(Decimal::from(policy.lead_days)) {
        Urgency::Critical
    } else if coverage.is_within(Decimal::from(policy.lead_days + policy.safety_days)) {
        Urgency::High
    } else {
        Urgency::Medium
    }
}

/// Write reorder fields onto every row, looking up window sales by row key
pub fn apply_reorder(rows: &mut [VariantRow], sales: &HashMap<String, i64>, policy: &ReorderPolicy) {
    for row in rows.iter_mut() {
        let sold = sales.get(&row.key).copied().unwrap_or(0);
        let metrics = calculate_reorder(sold, row.on_hand(), row.inventory_incoming, policy);
        row.daily_velocity = Some(metrics.daily_velocity);
        row.rop = Some(metrics.rop);
        row.target = Some(metrics.target);
        row.suggested_qty = Some(metrics.suggested_qty);
        row.coverage = Some(metrics.coverage);
        row.urgency = Some(metrics.urgency);
    }
}

/// Rows that qualify for reordering, most urgent first.
///
/// Within an urgency band rows are ordered by suggested quantity, then sold
/// quantity, both descending. Rows without reorder fields are skipped.
pub fn reorder_list(rows: &[VariantRow]) -> Vec<VariantRow> {
    let mut list: Vec<VariantRow> = rows
        .iter()
        .filter(|row| {
            let suggested = row.suggested_qty.unwrap_or(0);
            row.urgency.is_some() && (suggested > 0 || row.on_hand() <= 1)
        })
        .cloned()
        .collect();

    list.sort_by(|a, b| {
        a.urgency
            .cmp(&b.urgency)
            .then_with(|| b.suggested_qty.cmp(&a.suggested_qty))
            .then_with(|| b.sold_qty.cmp(&a.sold_qty))
    });
    list
}
