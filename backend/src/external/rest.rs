//! REST Admin API adapter
//!
//! Pages are chained through the `page_info` token of the `Link` header.
//! Follow-up pages may only repeat `limit` and `fields` next to `page_info`,
//! so the date and status filters ride on the first request alone.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use shared::{
    normalize_id, Channel, DateRange, InventoryLevel, LineItemRecord, Location, OrderRecord,
    VariantInfo,
};
use tracing::warn;

use super::client::{ApiRequest, FetchClient};
use super::commerce::{decode_each, payload_error, CatalogPage, CommerceApi, OrderPage, RawId};
use crate::config::{ApiGeneration, OrderStatusFilter};
use crate::error::AppResult;

const PAGE_LIMIT: &str = "250";
const ORDER_FIELDS: &str = "id,created_at,source_name,subtotal_price,total_discounts,line_items";
const PRODUCT_FIELDS: &str = "id,title,variants";

pub struct RestCommerceApi {
    client: Arc<FetchClient>,
    order_status: OrderStatusFilter,
    /// Ceiling for paged lookups the adapter walks itself
    max_pages: u32,
}

#[derive(Debug, Deserialize)]
struct RestOrder {
    id: RawId,
    created_at: Option<DateTime<Utc>>,
    source_name: Option<String>,
    subtotal_price: Option<Decimal>,
    total_discounts: Option<Decimal>,
    line_items: Option<Vec<RestLineItem>>,
}

#[derive(Debug, Deserialize)]
struct RestLineItem {
    variant_id: Option<RawId>,
    sku: Option<String>,
    #[serde(default)]
    title: String,
    variant_title: Option<String>,
    quantity: i64,
    price: Decimal,
    #[serde(default)]
    discount_allocations: Vec<RestDiscountAllocation>,
}

#[derive(Debug, Deserialize)]
struct RestDiscountAllocation {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct RestVariant {
    id: RawId,
    #[serde(default)]
    title: String,
    sku: Option<String>,
    price: Decimal,
    inventory_item_id: Option<RawId>,
    inventory_quantity: Option<i64>,
    inventory_management: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestProduct {
    #[serde(default)]
    title: String,
    #[serde(default)]
    variants: Vec<RestVariant>,
}

#[derive(Debug, Deserialize)]
struct RestInventoryLevel {
    inventory_item_id: RawId,
    location_id: RawId,
    available: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RestLocation {
    id: RawId,
    #[serde(default)]
    name: String,
    active: bool,
}

impl RestOrder {
    fn into_record(self) -> OrderRecord {
        let line_items = self.line_items.map(|items| {
            items
                .into_iter()
                .map(|item| LineItemRecord {
                    variant_id: item.variant_id.map(|id| id.normalized()),
                    sku: item.sku.filter(|s| !s.trim().is_empty()),
                    product_title: item.title,
                    variant_title: item.variant_title,
                    quantity: item.quantity,
                    unit_price: item.price,
                    discount: item.discount_allocations.iter().map(|d| d.amount).sum(),
                })
                .collect::<Vec<_>>()
        });

        let allocated: Decimal = line_items
            .iter()
            .flatten()
            .map(|item| item.discount)
            .sum();
        let unallocated = (self.total_discounts.unwrap_or_default() - allocated).max(Decimal::ZERO);

        OrderRecord {
            id: self.id.normalized(),
            created_at: self.created_at,
            channel: Channel::from_source_name(self.source_name.as_deref()),
            total_after_discounts: self.subtotal_price,
            unallocated_discount: unallocated,
            line_items,
        }
    }
}

impl RestVariant {
    fn into_info(self, product_title: &str) -> VariantInfo {
        VariantInfo {
            variant_id: self.id.normalized(),
            product_title: product_title.to_string(),
            variant_title: self.title,
            sku: self.sku.filter(|s| !s.trim().is_empty()),
            price: self.price,
            inventory_item_id: self.inventory_item_id.map(|id| id.normalized()),
            inventory_quantity: self.inventory_quantity,
            platform_managed: self.inventory_management.as_deref() == Some("shopify"),
        }
    }
}

fn param(key: &str, value: impl Into<String>) -> (String, String) {
    (key.to_string(), value.into())
}

fn rfc3339(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Take `body[key]` out as an array
fn array_field(body: Value, key: &str) -> AppResult<Vec<Value>> {
    match body {
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(payload_error(format!("response has no `{}` array", key))),
        },
        _ => Err(payload_error("response is not a JSON object")),
    }
}

/// Decode `body[key]` as a single object
fn object_field<T: serde::de::DeserializeOwned>(body: Value, key: &str) -> AppResult<T> {
    let value = body.get(key).cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(value)?)
}

impl RestCommerceApi {
    pub fn new(client: Arc<FetchClient>, order_status: OrderStatusFilter, max_pages: u32) -> Self {
        Self {
            client,
            order_status,
            max_pages,
        }
    }

    fn orders_request(&self, range: &DateRange, cursor: Option<&str>) -> ApiRequest {
        let mut query = vec![param("limit", PAGE_LIMIT), param("fields", ORDER_FIELDS)];
        match cursor {
            Some(page_info) => query.push(param("page_info", page_info)),
            None => {
                query.push(param("created_at_min", rfc3339(range.start)));
                query.push(param("created_at_max", rfc3339(range.end)));
                match self.order_status {
                    OrderStatusFilter::Any => query.push(param("status", "any")),
                    OrderStatusFilter::Paid => {
                        query.push(param("status", "any"));
                        query.push(param("financial_status", "paid"));
                    }
                }
            }
        }
        ApiRequest::rest("orders.json", query)
    }
}

#[async_trait]
impl CommerceApi for RestCommerceApi {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::Rest
    }

    async fn orders_page(&self, range: &DateRange, cursor: Option<&str>) -> AppResult<OrderPage> {
        let response = self.client.call(&self.orders_request(range, cursor)).await?;
        let (orders, undecodable) = decode_each::<RestOrder>(array_field(response.body, "orders")?, "order");

        Ok(OrderPage {
            orders: orders.into_iter().map(RestOrder::into_record).collect(),
            undecodable,
            next_cursor: response.next_page,
        })
    }

    async fn variant(&self, variant_id: &str) -> AppResult<VariantInfo> {
        let path = format!("variants/{}.json", normalize_id(variant_id));
        let response = self.client.call(&ApiRequest::rest(path, Vec::new())).await?;
        let variant: RestVariant = object_field(response.body, "variant")?;
        Ok(variant.into_info(""))
    }

    async fn inventory_levels(&self, inventory_item_ids: &[String]) -> AppResult<Vec<InventoryLevel>> {
        if inventory_item_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = inventory_item_ids.iter().map(|id| normalize_id(id)).collect();
        let mut levels = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=self.max_pages {
            let query = match &cursor {
                Some(page_info) => vec![param("limit", PAGE_LIMIT), param("page_info", page_info)],
                None => vec![param("inventory_item_ids", ids.join(",")), param("limit", PAGE_LIMIT)],
            };
            let response = self
                .client
                .call(&ApiRequest::rest("inventory_levels.json", query))
                .await?;
            let (decoded, _) = decode_each::<RestInventoryLevel>(
                array_field(response.body, "inventory_levels")?,
                "inventory level",
            );
            levels.extend(decoded.into_iter().map(|level| InventoryLevel {
                inventory_item_id: level.inventory_item_id.normalized(),
                location_id: level.location_id.normalized(),
                available: level.available.unwrap_or(0),
                incoming: None,
            }));

            cursor = response.next_page;
            if cursor.is_none() {
                break;
            }
            if page == self.max_pages {
                warn!(pages = page, items = ids.len(), "inventory levels truncated at page ceiling");
            }
        }

        Ok(levels)
    }

    async fn location(&self, location_id: &str) -> AppResult<Location> {
        let path = format!("locations/{}.json", normalize_id(location_id));
        let response = self.client.call(&ApiRequest::rest(path, Vec::new())).await?;
        let location: RestLocation = object_field(response.body, "location")?;

        Ok(Location {
            id: location.id.normalized(),
            name: location.name,
            active: location.active,
        })
    }

    async fn catalog_page(&self, cursor: Option<&str>) -> AppResult<CatalogPage> {
        let mut query = vec![param("limit", PAGE_LIMIT), param("fields", PRODUCT_FIELDS)];
        if let Some(page_info) = cursor {
            query.push(param("page_info", page_info));
        }
        let response = self.client.call(&ApiRequest::rest("products.json", query)).await?;
        let (products, _) = decode_each::<RestProduct>(array_field(response.body, "products")?, "product");

        let variants = products
            .into_iter()
            .flat_map(|product| {
                let title = product.title;
                product
                    .variants
                    .into_iter()
                    .map(move |variant| variant.into_info(&title))
                    .collect::<Vec<_>>()
            })
            .collect();

        Ok(CatalogPage {
            variants,
            next_cursor: response.next_page,
        })
    }
}
