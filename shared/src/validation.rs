//! Validation of decoded platform records
//!
//! A record that fails here is dropped and counted by the collector; it never
//! fails the page it arrived on.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{LineItemRecord, OrderRecord};

/// Why a decoded record was rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("order {order_id} has no line item collection")]
    MissingLineItems { order_id: String },

    #[error("order {order_id} has no creation timestamp")]
    MissingCreatedAt { order_id: String },

    #[error("order {order_id} has a line with negative quantity {quantity}")]
    NegativeQuantity { order_id: String, quantity: i64 },

    #[error("order {order_id} has an invalid {field}")]
    InvalidAmount { order_id: String, field: &'static str },
}

/// Check an order record and hand back its timestamp and line items
pub fn validate_order_record(
    record: &OrderRecord,
) -> Result<(DateTime<Utc>, &[LineItemRecord]), ValidationError> {
    let line_items = record
        .line_items
        .as_deref()
        .ok_or_else(|| ValidationError::MissingLineItems {
            order_id: record.id.clone(),
        })?;

    let created_at = record.created_at.ok_or_else(|| ValidationError::MissingCreatedAt {
        order_id: record.id.clone(),
    })?;

    if record.unallocated_discount < Decimal::ZERO {
        return Err(ValidationError::InvalidAmount {
            order_id: record.id.clone(),
            field: "order discount",
        });
    }

    if matches!(record.total_after_discounts, Some(total) if total < Decimal::ZERO) {
        return Err(ValidationError::InvalidAmount {
            order_id: record.id.clone(),
            field: "order total",
        });
    }

    for item in line_items {
        if item.quantity < 0 {
            return Err(ValidationError::NegativeQuantity {
                order_id: record.id.clone(),
                quantity: item.quantity,
            });
        }
        if item.unit_price < Decimal::ZERO {
            return Err(ValidationError::InvalidAmount {
                order_id: record.id.clone(),
                field: "unit price",
            });
        }
    }

    Ok((created_at, line_items))
}
