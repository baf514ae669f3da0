//! HTTP request handlers

pub mod health;
pub mod reporting;

pub use health::*;
pub use reporting::*;
