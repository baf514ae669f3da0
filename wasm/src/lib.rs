//! WebAssembly module for Shelfwise
//!
//! Provides client-side computation for:
//! - Reorder points and urgency for what-if stock figures
//! - Re-ranking ABC tiers after filtering report rows in the browser
//! - Reorder list ordering and dead-stock valuation

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::analytics::*;
pub use shared::models::*;
pub use shared::types::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    // Set up panic hook for better error messages in browser console
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn parse<T: DeserializeOwned>(json: &str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| {
        let message = format!("Invalid {} JSON: {}", what, e);
        #[cfg(target_arch = "wasm32")]
        web_sys::console::warn_1(&JsValue::from_str(&message));
        JsValue::from_str(&message)
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Policy from JSON, or the defaults for an empty string
fn policy(policy_json: &str) -> Result<ReorderPolicy, JsValue> {
    if policy_json.trim().is_empty() {
        Ok(ReorderPolicy::default())
    } else {
        parse(policy_json, "policy")
    }
}

/// Reorder figures for one item; `incoming` below zero means unknown
#[wasm_bindgen]
pub fn calculate_reorder_json(
    sales_in_window: i32,
    on_hand: i32,
    incoming: i32,
    policy_json: &str,
) -> Result<String, JsValue> {
    let policy = policy(policy_json)?;
    let incoming = (incoming >= 0).then(|| i64::from(incoming));
    let metrics = calculate_reorder(i64::from(sales_in_window), i64::from(on_hand), incoming, &policy);
    to_json(&metrics)
}

/// Urgency label for a number of days of coverage (negative means infinite)
#[wasm_bindgen]
pub fn urgency_for_coverage(days: f64, policy_json: &str) -> Result<String, JsValue> {
    let policy = policy(policy_json)?;
    let coverage = if days < 0.0 {
        Coverage::Infinite
    } else {
        Coverage::Days(Decimal::try_from(days).unwrap_or(Decimal::ZERO))
    };
    Ok(classify_urgency(&coverage, &policy).to_string())
}

/// Rank report rows by revenue and tag their ABC tier
#[wasm_bindgen]
pub fn classify_abc_json(rows_json: &str) -> Result<String, JsValue> {
    let rows: Vec<VariantRow> = parse(rows_json, "rows")?;
    to_json(&classify_abc(&rows))
}

/// Tier for a cumulative revenue percentage
#[wasm_bindgen]
pub fn abc_category_for_percent(cumulative_percent: f64) -> String {
    let percent = Decimal::try_from(cumulative_percent).unwrap_or(Decimal::ZERO);
    category_for(percent).to_string()
}

/// Rows that qualify for reordering, most urgent first
#[wasm_bindgen]
pub fn reorder_list_json(rows_json: &str) -> Result<String, JsValue> {
    let rows: Vec<VariantRow> = parse(rows_json, "rows")?;
    to_json(&reorder_list(&rows))
}

/// Sum of dead-stock value, as a decimal string
#[wasm_bindgen]
pub fn dead_stock_value(items_json: &str) -> Result<String, JsValue> {
    let items: Vec<DeadStockItem> = parse(items_json, "dead stock")?;
    let total: Decimal = items.iter().map(|item| item.total_value).sum();
    Ok(total.to_string())
}

/// Whether `period` names a report period
#[wasm_bindgen]
pub fn is_valid_period(period: &str) -> bool {
    period.parse::<ReportPeriod>().is_ok()
}
