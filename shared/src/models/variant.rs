//! Per-variant report rows

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Channel, OrderLine};

/// Days of stock left at the current sell-through rate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Days(Decimal),
    /// No sales in the window, stock never runs out
    Infinite,
}

impl Coverage {
    pub fn is_within(&self, days: Decimal) -> bool {
        match self {
            Coverage::Days(d) => *d <= days,
            Coverage::Infinite => false,
        }
    }
}

/// Replenishment urgency, most urgent first
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Critical,
    High,
    Medium,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Critical => write!(f, "critical"),
            Urgency::High => write!(f, "high"),
            Urgency::Medium => write!(f, "medium"),
        }
    }
}

/// Revenue tier under the 80/15/5 rule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AbcCategory {
    A,
    B,
    C,
}

impl std::fmt::Display for AbcCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbcCategory::A => write!(f, "A"),
            AbcCategory::B => write!(f, "B"),
            AbcCategory::C => write!(f, "C"),
        }
    }
}

/// One row per variant (or per SKU / name when the variant is unknown).
///
/// Every field exists from construction. Inventory fields stay `None` until
/// the enricher runs; derived fields stay `None` until the analytics pass that
/// owns them runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantRow {
    /// Aggregation key: variant id, `SKU:<sku>` or `NAME:<product>__<variant>`
    pub key: String,
    pub variant_id: Option<String>,
    pub product_title: String,
    pub variant_title: String,
    pub sku: Option<String>,
    /// Last seen unit price
    pub unit_price: Decimal,
    pub sold_qty: i64,
    pub pos_qty: i64,
    pub online_qty: i64,
    pub revenue: Decimal,

    // Inventory
    pub inventory_available: Option<i64>,
    pub inventory_incoming: Option<i64>,
    pub inventory_item_id: Option<String>,

    // Reorder point
    pub daily_velocity: Option<Decimal>,
    pub rop: Option<i64>,
    pub target: Option<i64>,
    pub suggested_qty: Option<i64>,
    pub coverage: Option<Coverage>,
    pub urgency: Option<Urgency>,

    // ABC
    pub abc_rank: Option<usize>,
    pub abc_category: Option<AbcCategory>,
    pub revenue_percent: Option<Decimal>,
    pub cumulative_percent: Option<Decimal>,
}

impl VariantRow {
    /// Start a row from the first line seen for `key`; quantities start at zero
    pub fn seed(key: String, line: &OrderLine) -> Self {
        Self {
            key,
            variant_id: line.variant_id.clone(),
            product_title: line.product_title.clone(),
            variant_title: line.variant_title.clone(),
            sku: line.sku.clone(),
            unit_price: line.unit_price,
            sold_qty: 0,
            pos_qty: 0,
            online_qty: 0,
            revenue: Decimal::ZERO,
            inventory_available: None,
            inventory_incoming: None,
            inventory_item_id: None,
            daily_velocity: None,
            rop: None,
            target: None,
            suggested_qty: None,
            coverage: None,
            urgency: None,
            abc_rank: None,
            abc_category: None,
            revenue_percent: None,
            cumulative_percent: None,
        }
    }

    /// Fold one more line into the row
    pub fn accumulate(&mut self, line: &OrderLine) {
        self.sold_qty += line.quantity;
        match line.channel {
            Channel::Pos => self.pos_qty += line.quantity,
            Channel::Online => self.online_qty += line.quantity,
        }
        self.revenue += line.line_revenue;
        self.unit_price = line.unit_price;
    }

    /// Stock on hand as the analytics see it; unresolved counts as zero
    pub fn on_hand(&self) -> i64 {
        self.inventory_available.unwrap_or(0)
    }
}

/// Aggregation key for a line: variant id, else SKU, else product/variant name
pub fn row_key(line: &OrderLine) -> String {
    if let Some(id) = line.variant_id.as_deref().filter(|id| !id.is_empty()) {
        return id.to_string();
    }
    if let Some(sku) = line.sku.as_deref().filter(|sku| !sku.trim().is_empty()) {
        return format!("SKU:{}", sku.trim());
    }
    format!("NAME:{}__{}", line.product_title, line.variant_title)
}
