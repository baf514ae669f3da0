//! Revenue attribution from order records to order lines
//!
//! When the platform left part of an order's discount unallocated, each line
//! receives its proportional share of the discounted order total:
//! `line_subtotal / order_subtotal * order_total_after_discounts`.
//! Otherwise a line's revenue is its own subtotal minus the discounts
//! allocated to it.

use rust_decimal::Decimal;

use crate::models::{OrderLine, OrderRecord};
use crate::validation::{validate_order_record, ValidationError};

/// Validate a record and turn its line items into revenue-attributed lines
pub fn order_lines(record: &OrderRecord) -> Result<Vec<OrderLine>, ValidationError> {
    let (created_at, items) = validate_order_record(record)?;

    let order_subtotal: Decimal = items.iter().map(|item| item.subtotal()).sum();
    let reallocated_total = match record.total_after_discounts {
        Some(total)
            if record.unallocated_discount > Decimal::ZERO && order_subtotal > Decimal::ZERO =>
        {
            Some(total)
        }
        _ => None,
    };

    let lines = items
        .iter()
        .map(|item| {
            let subtotal = item.subtotal();
            let revenue = match reallocated_total {
                Some(total) => subtotal * total / order_subtotal,
                None => subtotal - item.discount,
            };

            OrderLine {
                order_id: record.id.clone(),
                created_at,
                channel: record.channel,
                variant_id: item.variant_id.clone(),
                sku: item.sku.clone(),
                product_title: item.product_title.clone(),
                variant_title: item.variant_title.clone().unwrap_or_default(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_revenue: revenue.max(Decimal::ZERO),
            }
        })
        .collect();

    Ok(lines)
}
