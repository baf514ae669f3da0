//! In-memory commerce adapter and record builders shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use shared::{
    Channel, DateRange, InventoryLevel, LineItemRecord, Location, OrderRecord, VariantInfo,
};
use shelfwise_backend::config::ApiGeneration;
use shelfwise_backend::external::{CatalogPage, CommerceApi, OrderPage};
use shelfwise_backend::{AppError, AppResult};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn item(variant: &str, quantity: i64, price: &str) -> LineItemRecord {
    LineItemRecord {
        variant_id: Some(variant.to_string()),
        sku: Some(format!("SKU-{}", variant)),
        product_title: format!("Product {}", variant),
        variant_title: Some("Default".to_string()),
        quantity,
        unit_price: dec(price),
        discount: Decimal::ZERO,
    }
}

pub fn order(id: &str, created_at: DateTime<Utc>, items: Vec<LineItemRecord>) -> OrderRecord {
    let total = items.iter().map(|i| i.subtotal()).sum();
    OrderRecord {
        id: id.to_string(),
        created_at: Some(created_at),
        channel: Channel::Online,
        total_after_discounts: Some(total),
        unallocated_discount: Decimal::ZERO,
        line_items: Some(items),
    }
}

pub fn pos_order(id: &str, created_at: DateTime<Utc>, items: Vec<LineItemRecord>) -> OrderRecord {
    OrderRecord {
        channel: Channel::Pos,
        ..order(id, created_at, items)
    }
}

pub fn variant_info(id: &str, item_id: &str, own_quantity: Option<i64>, managed: bool) -> VariantInfo {
    VariantInfo {
        variant_id: id.to_string(),
        product_title: format!("Product {}", id),
        variant_title: "Default".to_string(),
        sku: Some(format!("SKU-{}", id)),
        price: dec("10.00"),
        inventory_item_id: Some(item_id.to_string()),
        inventory_quantity: own_quantity,
        platform_managed: managed,
    }
}

pub fn level(item_id: &str, location_id: &str, available: i64) -> InventoryLevel {
    InventoryLevel {
        inventory_item_id: item_id.to_string(),
        location_id: location_id.to_string(),
        available,
        incoming: None,
    }
}

pub fn location(id: &str, active: bool) -> Location {
    Location {
        id: id.to_string(),
        name: format!("Location {}", id),
        active,
    }
}

fn upstream_failure() -> AppError {
    AppError::Http {
        status: 500,
        body: "upstream failure".to_string(),
    }
}

/// Scripted adapter; order pages are cut from `orders` in `page_size` slices
pub struct FakeCommerce {
    pub orders: Vec<OrderRecord>,
    pub page_size: usize,
    /// Keep handing out a next cursor forever
    pub endless: bool,
    /// 1-based order page numbers that fail, on every collection
    pub failing_pages: HashSet<usize>,
    /// Fail every order page for ranges longer than this many days
    pub fail_ranges_over_days: Option<i64>,
    pub variants: HashMap<String, VariantInfo>,
    pub failing_variants: HashSet<String>,
    pub levels: Vec<InventoryLevel>,
    pub fail_levels: bool,
    pub locations: HashMap<String, Location>,
    pub failing_locations: HashSet<String>,
    pub catalog: Vec<VariantInfo>,
    pub calls: Mutex<HashMap<&'static str, usize>>,
}

impl Default for FakeCommerce {
    fn default() -> Self {
        Self {
            orders: Vec::new(),
            page_size: 50,
            endless: false,
            failing_pages: HashSet::new(),
            fail_ranges_over_days: None,
            variants: HashMap::new(),
            failing_variants: HashSet::new(),
            levels: Vec::new(),
            fail_levels: false,
            locations: HashMap::new(),
            failing_locations: HashSet::new(),
            catalog: Vec::new(),
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl FakeCommerce {
    pub fn with_variant(mut self, info: VariantInfo) -> Self {
        self.variants.insert(info.variant_id.clone(), info);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.insert(location.id.clone(), location);
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
    }
}

#[async_trait]
impl CommerceApi for FakeCommerce {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::Rest
    }

    async fn orders_page(&self, range: &DateRange, cursor: Option<&str>) -> AppResult<OrderPage> {
        self.record("orders_page");
        let page: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(1);

        if self.failing_pages.contains(&page) {
            return Err(upstream_failure());
        }
        if let Some(days) = self.fail_ranges_over_days {
            if range.end - range.start > Duration::days(days) {
                return Err(upstream_failure());
            }
        }

        let matching: Vec<&OrderRecord> = self
            .orders
            .iter()
            .filter(|o| o.created_at.map_or(true, |t| range.contains(t)))
            .collect();
        let orders: Vec<OrderRecord> = matching
            .iter()
            .skip((page - 1) * self.page_size)
            .take(self.page_size)
            .map(|o| (*o).clone())
            .collect();
        let more = page * self.page_size < matching.len();

        Ok(OrderPage {
            orders,
            undecodable: 0,
            next_cursor: (self.endless || more).then(|| (page + 1).to_string()),
        })
    }

    async fn variant(&self, variant_id: &str) -> AppResult<VariantInfo> {
        self.record("variant");
        if self.failing_variants.contains(variant_id) {
            return Err(upstream_failure());
        }
        self.variants.get(variant_id).cloned().ok_or(AppError::Http {
            status: 404,
            body: "Not Found".to_string(),
        })
    }

    async fn inventory_levels(&self, inventory_item_ids: &[String]) -> AppResult<Vec<InventoryLevel>> {
        self.record("inventory_levels");
        if self.fail_levels {
            return Err(upstream_failure());
        }
        Ok(self
            .levels
            .iter()
            .filter(|l| inventory_item_ids.contains(&l.inventory_item_id))
            .cloned()
            .collect())
    }

    async fn location(&self, location_id: &str) -> AppResult<Location> {
        self.record("location");
        if self.failing_locations.contains(location_id) {
            return Err(upstream_failure());
        }
        self.locations.get(location_id).cloned().ok_or(AppError::Http {
            status: 404,
            body: "Not Found".to_string(),
        })
    }

    async fn catalog_page(&self, _cursor: Option<&str>) -> AppResult<CatalogPage> {
        self.record("catalog_page");
        Ok(CatalogPage {
            variants: self.catalog.clone(),
            next_cursor: None,
        })
    }
}
