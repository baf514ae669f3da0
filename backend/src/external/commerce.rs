//! Capability interface over the two generations of the commerce API
//!
//! The collector and enricher only see [`CommerceApi`]. The REST adapter and
//! the GraphQL adapter each map their own payloads and pagination shape onto
//! the shared models, with identifiers normalized to their numeric tail.

use async_trait::async_trait;
use serde::Deserialize;
use shared::{normalize_id, DateRange, InventoryLevel, Location, OrderRecord, VariantInfo};

use crate::config::ApiGeneration;
use crate::error::{AppError, AppResult};

/// One page of decoded orders
#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    pub orders: Vec<OrderRecord>,
    /// Records on this page whose payload could not be decoded at all
    pub undecodable: u32,
    pub next_cursor: Option<String>,
}

/// One page of the catalog listing
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub variants: Vec<VariantInfo>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait CommerceApi: Send + Sync {
    fn generation(&self) -> ApiGeneration;

    /// Orders created inside `range`, starting at `cursor` (first page when `None`)
    async fn orders_page(&self, range: &DateRange, cursor: Option<&str>) -> AppResult<OrderPage>;

    async fn variant(&self, variant_id: &str) -> AppResult<VariantInfo>;

    /// Levels for at most one chunk of inventory items
    async fn inventory_levels(&self, inventory_item_ids: &[String]) -> AppResult<Vec<InventoryLevel>>;

    async fn location(&self, location_id: &str) -> AppResult<Location>;

    async fn catalog_page(&self, cursor: Option<&str>) -> AppResult<CatalogPage>;
}

/// Identifier as either generation sends it: a JSON number or a (global) ID string
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    pub fn normalized(&self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => normalize_id(s),
        }
    }
}

/// Payload that parsed as JSON but not in the expected shape
pub(crate) fn payload_error(message: impl std::fmt::Display) -> AppError {
    AppError::Json(<serde_json::Error as serde::de::Error>::custom(message))
}

/// Decode each element on its own so one bad record does not sink the page
pub(crate) fn decode_each<T: serde::de::DeserializeOwned>(
    items: Vec<serde_json::Value>,
    resource: &str,
) -> (Vec<T>, u32) {
    let mut decoded = Vec::with_capacity(items.len());
    let mut failed = 0;

    for item in items {
        match serde_json::from_value::<T>(item) {
            Ok(value) => decoded.push(value),
            Err(e) => {
                tracing::warn!(resource, error = %e, "dropping undecodable record");
                failed += 1;
            }
        }
    }

    (decoded, failed)
}
