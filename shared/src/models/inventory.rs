//! Inventory and catalog models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Stock of one inventory item at one location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InventoryLevel {
    pub inventory_item_id: String,
    pub location_id: String,
    pub available: i64,
    /// Only the GraphQL generation reports inbound stock
    pub incoming: Option<i64>,
}

/// A stock-holding location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub active: bool,
}

/// Catalog facts about a variant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantInfo {
    pub variant_id: String,
    pub product_title: String,
    pub variant_title: String,
    pub sku: Option<String>,
    pub price: Decimal,
    pub inventory_item_id: Option<String>,
    /// On-hand quantity the variant itself reports, used as a fallback
    pub inventory_quantity: Option<i64>,
    /// Stock is tracked by the platform's own inventory system
    pub platform_managed: bool,
}

/// Summed stock for one inventory item after location filtering
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockLevel {
    pub available: i64,
    pub incoming: Option<i64>,
}

/// Stocked variant with no sales inside the lookback window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeadStockItem {
    pub variant_id: String,
    pub product_title: String,
    pub variant_title: String,
    pub sku: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub total_value: Decimal,
}
