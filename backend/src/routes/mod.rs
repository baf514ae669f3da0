//! Route definitions for the Shelfwise API

use axum::{
    routing::{delete, get},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/reports", report_routes())
}

/// Sales report routes
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/sales", get(handlers::get_sales_report))
        .route("/sales/reorder", get(handlers::get_reorder_report))
        .route("/sales/dead-stock", get(handlers::get_dead_stock_report))
        .route("/cache", delete(handlers::clear_report_cache))
}
