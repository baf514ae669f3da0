//! Commerce platform integration

pub mod client;
pub mod commerce;
pub mod graphql;
pub mod rest;

use std::sync::Arc;

pub use client::{ApiRequest, ApiResponse, FetchClient, FetchPolicy, FetchStats, HttpTransport, Transport};
pub use commerce::{CatalogPage, CommerceApi, OrderPage};
pub use graphql::GraphQlCommerceApi;
pub use rest::RestCommerceApi;

use crate::config::{ApiGeneration, CommerceConfig};

/// Adapter for the configured API generation
pub fn commerce_api(client: Arc<FetchClient>, config: &CommerceConfig) -> Arc<dyn CommerceApi> {
    match config.generation {
        ApiGeneration::Rest => Arc::new(RestCommerceApi::new(client, config.order_status, config.max_pages)),
        ApiGeneration::GraphQl => Arc::new(GraphQlCommerceApi::new(client, config.order_status, config.max_pages)),
    }
}
