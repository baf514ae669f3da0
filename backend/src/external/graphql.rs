//! GraphQL Admin API adapter
//!
//! Pages are chained through `pageInfo { hasNextPage endCursor }`. Global IDs
//! are normalized on the way in and rebuilt with [`to_global_id`] on the way out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::{
    to_global_id, Channel, DateRange, InventoryLevel, LineItemRecord, Location, OrderRecord,
    VariantInfo,
};
use tracing::warn;

use super::client::{ApiRequest, FetchClient};
use super::commerce::{decode_each, payload_error, CatalogPage, CommerceApi, OrderPage, RawId};
use crate::config::{ApiGeneration, OrderStatusFilter};
use crate::error::AppResult;

const ORDERS_PAGE_SIZE: u32 = 100;
const CATALOG_PAGE_SIZE: u32 = 100;

const ORDERS_QUERY: &str = r#"
query Orders($first: Int!, $after: String, $query: String!) {
  orders(first: $first, after: $after, query: $query, sortKey: CREATED_AT) {
    pageInfo { hasNextPage endCursor }
    nodes {
      id
      createdAt
      sourceName
      currentSubtotalPriceSet { shopMoney { amount } }
      totalDiscountsSet { shopMoney { amount } }
      lineItems(first: 250) {
        nodes {
          title
          variantTitle
          sku
          quantity
          variant { id }
          originalUnitPriceSet { shopMoney { amount } }
          discountAllocations { allocatedAmountSet { shopMoney { amount } } }
        }
      }
    }
  }
}"#;

const VARIANT_FIELDS: &str = r#"
      id
      title
      sku
      price
      inventoryQuantity
      product { title }
      inventoryItem { id tracked }"#;

const LEVELS_PAGE_SIZE: u32 = 50;

const LEVEL_FIELDS: &str = r#"
        pageInfo { hasNextPage endCursor }
        nodes {
          location { id }
          quantities(names: ["available", "incoming"]) { name quantity }
        }"#;

const LOCATION_QUERY: &str = r#"
query Location($id: ID!) {
  location(id: $id) { id name isActive }
}"#;

pub struct GraphQlCommerceApi {
    client: Arc<FetchClient>,
    order_status: OrderStatusFilter,
    /// Ceiling for paged lookups the adapter walks itself
    max_pages: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

impl PageInfo {
    fn next_cursor(self) -> Option<String> {
        if self.has_next_page {
            self.end_cursor
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoneyBag {
    shop_money: Money,
}

#[derive(Debug, Deserialize)]
struct Money {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: RawId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlOrder {
    id: RawId,
    created_at: Option<DateTime<Utc>>,
    source_name: Option<String>,
    current_subtotal_price_set: Option<MoneyBag>,
    total_discounts_set: Option<MoneyBag>,
    line_items: Option<Connection<GqlLineItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlLineItem {
    #[serde(default)]
    title: String,
    variant_title: Option<String>,
    sku: Option<String>,
    quantity: i64,
    variant: Option<IdOnly>,
    original_unit_price_set: MoneyBag,
    #[serde(default)]
    discount_allocations: Vec<GqlDiscountAllocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlDiscountAllocation {
    allocated_amount_set: MoneyBag,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlVariant {
    id: RawId,
    #[serde(default)]
    title: String,
    sku: Option<String>,
    price: Decimal,
    inventory_quantity: Option<i64>,
    product: Option<GqlTitle>,
    inventory_item: Option<GqlInventoryItemRef>,
}

#[derive(Debug, Deserialize)]
struct GqlTitle {
    title: String,
}

#[derive(Debug, Deserialize)]
struct GqlInventoryItemRef {
    id: RawId,
    #[serde(default)]
    tracked: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlInventoryItem {
    id: RawId,
    inventory_levels: LevelConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LevelConnection {
    page_info: Option<PageInfo>,
    #[serde(default = "Vec::new")]
    nodes: Vec<GqlInventoryLevel>,
}

#[derive(Debug, Deserialize)]
struct GqlInventoryLevel {
    location: IdOnly,
    #[serde(default)]
    quantities: Vec<GqlQuantity>,
}

#[derive(Debug, Deserialize)]
struct GqlQuantity {
    name: String,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GqlLocation {
    id: RawId,
    #[serde(default)]
    name: String,
    is_active: bool,
}

impl GqlOrder {
    fn into_record(self) -> OrderRecord {
        let line_items = self.line_items.map(|connection| {
            connection
                .nodes
                .into_iter()
                .map(|item| LineItemRecord {
                    variant_id: item.variant.map(|v| v.id.normalized()),
                    sku: item.sku.filter(|s| !s.trim().is_empty()),
                    product_title: item.title,
                    variant_title: item.variant_title,
                    quantity: item.quantity,
                    unit_price: item.original_unit_price_set.shop_money.amount,
                    discount: item
                        .discount_allocations
                        .iter()
                        .map(|d| d.allocated_amount_set.shop_money.amount)
                        .sum(),
                })
                .collect::<Vec<_>>()
        });

        let allocated: Decimal = line_items
            .iter()
            .flatten()
            .map(|item| item.discount)
            .sum();
        let total_discounts = self
            .total_discounts_set
            .map(|bag| bag.shop_money.amount)
            .unwrap_or_default();

        OrderRecord {
            id: self.id.normalized(),
            created_at: self.created_at,
            channel: Channel::from_source_name(self.source_name.as_deref()),
            total_after_discounts: self.current_subtotal_price_set.map(|bag| bag.shop_money.amount),
            unallocated_discount: (total_discounts - allocated).max(Decimal::ZERO),
            line_items,
        }
    }
}

impl GqlVariant {
    fn into_info(self) -> VariantInfo {
        let (inventory_item_id, platform_managed) = match self.inventory_item {
            Some(item) => (Some(item.id.normalized()), item.tracked),
            None => (None, false),
        };

        VariantInfo {
            variant_id: self.id.normalized(),
            product_title: self.product.map(|p| p.title).unwrap_or_default(),
            variant_title: self.title,
            sku: self.sku.filter(|s| !s.trim().is_empty()),
            price: self.price,
            inventory_item_id,
            inventory_quantity: self.inventory_quantity,
            platform_managed,
        }
    }
}

impl GqlInventoryItem {
    /// Levels on this page, plus the cursor of the next page if there is one
    fn into_levels(self) -> (Vec<InventoryLevel>, Option<String>) {
        let item_id = self.id.normalized();
        let next_cursor = self.inventory_levels.page_info.and_then(PageInfo::next_cursor);
        let levels = self
            .inventory_levels
            .nodes
            .into_iter()
            .map(|level| {
                let quantity = |name: &str| {
                    level
                        .quantities
                        .iter()
                        .find(|q| q.name == name)
                        .map(|q| q.quantity)
                };
                InventoryLevel {
                    inventory_item_id: item_id.clone(),
                    location_id: level.location.id.normalized(),
                    available: quantity("available").unwrap_or(0),
                    incoming: quantity("incoming"),
                }
            })
            .collect();
        (levels, next_cursor)
    }
}

/// Order search filter; `created_at:<` keeps the range half-open
pub fn orders_search(range: &DateRange, status: OrderStatusFilter) -> String {
    let mut filter = format!(
        "created_at:>='{}' AND created_at:<'{}'",
        range.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        range.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    if status == OrderStatusFilter::Paid {
        filter.push_str(" AND financial_status:paid");
    }
    filter
}

/// Walk `data` along `path`
fn data_at(body: &Value, path: &[&str]) -> AppResult<Value> {
    let mut node = body
        .get("data")
        .ok_or_else(|| payload_error("response has no `data`"))?;
    for key in path {
        node = node
            .get(*key)
            .ok_or_else(|| payload_error(format!("response has no `{}`", key)))?;
    }
    Ok(node.clone())
}

fn connection_parts(connection: Value) -> AppResult<(Vec<Value>, Option<String>)> {
    let page_info: PageInfo = serde_json::from_value(
        connection.get("pageInfo").cloned().unwrap_or(Value::Null),
    )?;
    let nodes = match connection.get("nodes") {
        Some(Value::Array(nodes)) => nodes.clone(),
        _ => return Err(payload_error("connection has no `nodes`")),
    };
    Ok((nodes, page_info.next_cursor()))
}

impl GraphQlCommerceApi {
    pub fn new(client: Arc<FetchClient>, order_status: OrderStatusFilter, max_pages: u32) -> Self {
        Self {
            client,
            order_status,
            max_pages,
        }
    }

    /// Remaining level pages of one inventory item, starting after `cursor`
    async fn remaining_levels(&self, item_id: &str, mut cursor: String) -> AppResult<Vec<InventoryLevel>> {
        let query = format!(
            "query InventoryItemLevels($id: ID!, $first: Int!, $after: String) {{\n  inventoryItem(id: $id) {{\n    id\n    inventoryLevels(first: $first, after: $after) {{{}\n    }}\n  }}\n}}",
            LEVEL_FIELDS
        );
        let mut levels = Vec::new();

        // The batched query already fetched page 1
        for page in 2..=self.max_pages {
            let request = ApiRequest::graphql(
                query.as_str(),
                json!({
                    "id": to_global_id("InventoryItem", item_id),
                    "first": LEVELS_PAGE_SIZE,
                    "after": cursor,
                }),
            );
            let response = self.client.call(&request).await?;
            let item: GqlInventoryItem =
                serde_json::from_value(data_at(&response.body, &["inventoryItem"])?)?;
            let (page_levels, next) = item.into_levels();
            levels.extend(page_levels);

            match next {
                Some(next) if page < self.max_pages => cursor = next,
                Some(_) => {
                    warn!(item_id, pages = page, "inventory levels truncated at page ceiling");
                    break;
                }
                None => break,
            }
        }

        Ok(levels)
    }
}

#[async_trait]
impl CommerceApi for GraphQlCommerceApi {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::GraphQl
    }

    async fn orders_page(&self, range: &DateRange, cursor: Option<&str>) -> AppResult<OrderPage> {
        let request = ApiRequest::graphql(
            ORDERS_QUERY,
            json!({
                "first": ORDERS_PAGE_SIZE,
                "after": cursor,
                "query": orders_search(range, self.order_status),
            }),
        );
        let response = self.client.call(&request).await?;
        let (nodes, next_cursor) = connection_parts(data_at(&response.body, &["orders"])?)?;
        let (orders, undecodable) = decode_each::<GqlOrder>(nodes, "order");

        Ok(OrderPage {
            orders: orders.into_iter().map(GqlOrder::into_record).collect(),
            undecodable,
            next_cursor,
        })
    }

    async fn variant(&self, variant_id: &str) -> AppResult<VariantInfo> {
        let query = format!(
            "query Variant($id: ID!) {{\n  productVariant(id: $id) {{{}\n  }}\n}}",
            VARIANT_FIELDS
        );
        let request = ApiRequest::graphql(
            query,
            json!({ "id": to_global_id("ProductVariant", variant_id) }),
        );
        let response = self.client.call(&request).await?;
        let variant: GqlVariant =
            serde_json::from_value(data_at(&response.body, &["productVariant"])?)?;
        Ok(variant.into_info())
    }

    async fn inventory_levels(&self, inventory_item_ids: &[String]) -> AppResult<Vec<InventoryLevel>> {
        if inventory_item_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = inventory_item_ids
            .iter()
            .map(|id| to_global_id("InventoryItem", id))
            .collect();
        let query = format!(
            "query InventoryLevels($ids: [ID!]!, $first: Int!) {{\n  nodes(ids: $ids) {{\n    ... on InventoryItem {{\n      id\n      inventoryLevels(first: $first) {{{}\n      }}\n    }}\n  }}\n}}",
            LEVEL_FIELDS
        );
        let request = ApiRequest::graphql(query, json!({ "ids": ids, "first": LEVELS_PAGE_SIZE }));
        let response = self.client.call(&request).await?;

        let nodes = match data_at(&response.body, &["nodes"])? {
            Value::Array(nodes) => nodes,
            _ => return Err(payload_error("`nodes` is not an array")),
        };
        // Unknown ids come back as null nodes
        let nodes: Vec<Value> = nodes.into_iter().filter(|n| !n.is_null()).collect();
        let (items, _) = decode_each::<GqlInventoryItem>(nodes, "inventory item");

        let mut levels = Vec::new();
        for item in items {
            let item_id = item.id.normalized();
            let (first_page, next) = item.into_levels();
            levels.extend(first_page);
            if let Some(cursor) = next {
                levels.extend(self.remaining_levels(&item_id, cursor).await?);
            }
        }

        Ok(levels)
    }

    async fn location(&self, location_id: &str) -> AppResult<Location> {
        let request = ApiRequest::graphql(
            LOCATION_QUERY,
            json!({ "id": to_global_id("Location", location_id) }),
        );
        let response = self.client.call(&request).await?;
        let location: GqlLocation = serde_json::from_value(data_at(&response.body, &["location"])?)?;

        Ok(Location {
            id: location.id.normalized(),
            name: location.name,
            active: location.is_active,
        })
    }

    async fn catalog_page(&self, cursor: Option<&str>) -> AppResult<CatalogPage> {
        let query = format!(
            "query Catalog($first: Int!, $after: String) {{\n  productVariants(first: $first, after: $after) {{\n    pageInfo {{ hasNextPage endCursor }}\n    nodes {{{}\n    }}\n  }}\n}}",
            VARIANT_FIELDS
        );
        let request = ApiRequest::graphql(
            query,
            json!({ "first": CATALOG_PAGE_SIZE, "after": cursor }),
        );
        let response = self.client.call(&request).await?;
        let (nodes, next_cursor) = connection_parts(data_at(&response.body, &["productVariants"])?)?;
        let (variants, _) = decode_each::<GqlVariant>(nodes, "variant");

        Ok(CatalogPage {
            variants: variants.into_iter().map(GqlVariant::into_info).collect(),
            next_cursor,
        })
    }
}
