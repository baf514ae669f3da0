//! Per-variant aggregation of order lines

use std::collections::HashMap;

use crate::models::{row_key, OrderLine, Totals, VariantRow};
use crate::types::DateRange;

/// Fold order lines into one row per aggregation key.
///
/// Rows come back sorted by sold quantity, then revenue, both descending.
/// The sort is stable, so exact ties keep first-seen order and the output is
/// deterministic for a given input order.
pub fn aggregate(lines: &[OrderLine]) -> Vec<VariantRow> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<VariantRow> = Vec::new();

    for line in lines {
        let key = row_key(line);
        let position = match index.get(&key) {
            Some(&position) => position,
            None => {
                rows.push(VariantRow::seed(key.clone(), line));
                index.insert(key, rows.len() - 1);
                rows.len() - 1
            }
        };
        rows[position].accumulate(line);
    }

    sort_by_sales(&mut rows);
    rows
}

pub fn sort_by_sales(rows: &mut [VariantRow]) {
    rows.sort_by(|a, b| {
        b.sold_qty
            .cmp(&a.sold_qty)
            .then_with(|| b.revenue.cmp(&a.revenue))
    });
}

pub fn totals(rows: &[VariantRow]) -> Totals {
    rows.iter().fold(Totals::default(), |acc, row| Totals {
        qty: acc.qty + row.sold_qty,
        revenue: acc.revenue + row.revenue,
    })
}

/// Units sold per aggregation key for lines created inside `range`
pub fn units_sold_by_key(lines: &[OrderLine], range: &DateRange) -> HashMap<String, i64> {
    let mut sold: HashMap<String, i64> = HashMap::new();
    for line in lines.iter().filter(|line| range.contains(line.created_at)) {
        *sold.entry(row_key(line)).or_insert(0) += line.quantity;
    }
    sold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Channel;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, hour, 0, 0).unwrap()
    }

    fn line(
        variant: Option<&str>,
        sku: Option<&str>,
        quantity: i64,
        price: i64,
        channel: Channel,
    ) -> OrderLine {
        OrderLine {
            order_id: "1".to_string(),
            created_at: at(12),
            channel,
            variant_id: variant.map(str::to_string),
            sku: sku.map(str::to_string),
            product_title: "Hoodie".to_string(),
            variant_title: "L / Black".to_string(),
            quantity,
            unit_price: Decimal::from(price),
            line_revenue: Decimal::from(price * quantity),
        }
    }

    #[test]
    fn test_same_variant_across_orders() {
        let lines = vec![
            line(Some("42"), None, 3, 10, Channel::Online),
            line(Some("42"), None, 5, 10, Channel::Pos),
        ];
        let rows = aggregate(&lines);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sold_qty, 8);
        assert_eq!(rows[0].revenue, Decimal::from(80));
        assert_eq!(rows[0].online_qty, 3);
        assert_eq!(rows[0].pos_qty, 5);
        assert_eq!(rows[0].inventory_available, None);
    }

    #[test]
    fn test_fallback_keys() {
        let lines = vec![
            line(None, Some("HD-L-BLK"), 1, 50, Channel::Online),
            line(None, None, 2, 50, Channel::Online),
            line(None, Some("HD-L-BLK"), 1, 50, Channel::Online),
        ];
        let rows = aggregate(&lines);

        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert!(keys.contains(&"SKU:HD-L-BLK"));
        assert!(keys.contains(&"NAME:Hoodie__L / Black"));
        assert!(rows.iter().all(|r| r.variant_id.is_none()));
    }

    #[test]
    fn test_unit_price_last_write_wins() {
        let mut promo = line(Some("7"), None, 1, 8, Channel::Online);
        promo.unit_price = Decimal::from(8);
        let lines = vec![line(Some("7"), None, 1, 10, Channel::Online), promo];
        let rows = aggregate(&lines);
        assert_eq!(rows[0].unit_price, Decimal::from(8));
    }

    #[test]
    fn test_sorted_by_qty_then_revenue() {
        let lines = vec![
            line(Some("a"), None, 2, 5, Channel::Online),
            line(Some("b"), None, 5, 1, Channel::Online),
            line(Some("c"), None, 2, 9, Channel::Online),
        ];
        let rows = aggregate(&lines);
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_totals() {
        let lines = vec![
            line(Some("a"), None, 2, 5, Channel::Online),
            line(Some("b"), None, 1, 7, Channel::Pos),
        ];
        let totals = totals(&aggregate(&lines));
        assert_eq!(totals.qty, 3);
        assert_eq!(totals.revenue, Decimal::from(17));
    }

    #[test]
    fn test_units_sold_respects_range() {
        let mut early = line(Some("a"), None, 4, 1, Channel::Online);
        early.created_at = at(1);
        let late = line(Some("a"), None, 6, 1, Channel::Online);
        let range = DateRange::new(at(10), at(10) + Duration::hours(4));

        let sold = units_sold_by_key(&[early, late], &range);
        assert_eq!(sold.get("a"), Some(&6));
    }

    fn arb_line() -> impl Strategy<Value = OrderLine> {
        (
            prop::option::of(0u8..6),
            prop::option::of(0u8..3),
            0i64..50,
            1i64..200,
            any::<bool>(),
        )
            .prop_map(|(variant, sku, quantity, price, pos)| {
                let variant = variant.map(|v| format!("v{}", v));
                let sku = sku.map(|s| format!("SKU-{}", s));
                line(
                    variant.as_deref(),
                    sku.as_deref(),
                    quantity,
                    price,
                    if pos { Channel::Pos } else { Channel::Online },
                )
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Sold quantity is conserved through aggregation
        #[test]
        fn prop_sold_qty_conserved(lines in prop::collection::vec(arb_line(), 0..60)) {
            let rows = aggregate(&lines);
            let line_qty: i64 = lines.iter().map(|l| l.quantity).sum();
            let row_qty: i64 = rows.iter().map(|r| r.sold_qty).sum();
            prop_assert_eq!(line_qty, row_qty);

            for row in &rows {
                prop_assert_eq!(row.sold_qty, row.pos_qty + row.online_qty);
            }
        }

        /// Revenue is conserved and keys are unique
        #[test]
        fn prop_revenue_conserved(lines in prop::collection::vec(arb_line(), 0..60)) {
            let rows = aggregate(&lines);
            let line_revenue: Decimal = lines.iter().map(|l| l.line_revenue).sum();
            prop_assert_eq!(totals(&rows).revenue, line_revenue);

            let mut keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
            keys.sort();
            keys.dedup();
            prop_assert_eq!(keys.len(), rows.len());
        }
    }
}
