//! Order models
//!
//! `OrderRecord` is what an API adapter hands over after decoding one page:
//! fields the platform may omit stay optional so the collector can decide
//! what to drop. `OrderLine` is the validated, revenue-attributed unit the
//! aggregator folds.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sales channel an order came through
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Pos,
    Online,
}

impl Channel {
    /// Map the platform's `source_name` to a channel; anything but `pos` is online
    pub fn from_source_name(source_name: Option<&str>) -> Self {
        match source_name {
            Some(s) if s.eq_ignore_ascii_case("pos") => Channel::Pos,
            _ => Channel::Online,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Pos => write!(f, "POS"),
            Channel::Online => write!(f, "ONLINE"),
        }
    }
}

/// A line item as decoded from the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItemRecord {
    /// Normalized variant identifier, absent for custom or deleted items
    pub variant_id: Option<String>,
    pub sku: Option<String>,
    pub product_title: String,
    pub variant_title: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Sum of discounts the platform allocated to this line
    pub discount: Decimal,
}

impl LineItemRecord {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An order as decoded from the platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub channel: Channel,
    /// Merchandise total after all discounts, excluding shipping and tax
    pub total_after_discounts: Option<Decimal>,
    /// Order-level discount the platform did not allocate to any line
    pub unallocated_discount: Decimal,
    pub line_items: Option<Vec<LineItemRecord>>,
}

/// One sold line, immutable once built
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub order_id: String,
    pub created_at: DateTime<Utc>,
    pub channel: Channel,
    pub variant_id: Option<String>,
    pub sku: Option<String>,
    pub product_title: String,
    pub variant_title: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// Attributed share of the order total after discounts
    pub line_revenue: Decimal,
}
