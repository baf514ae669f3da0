//! Shared types, models and pure analytics for Shelfwise
//!
//! This crate holds everything that needs no I/O: the normalized order and
//! inventory models, revenue attribution, per-variant aggregation, and the
//! reorder-point, ABC and dead-stock calculations. The backend drives it with
//! data fetched from the commerce platform; the WASM crate exposes parts of it
//! to the browser.

pub mod analytics;
pub mod models;
pub mod types;
pub mod validation;

pub use analytics::*;
pub use models::*;
pub use types::*;
pub use validation::*;
