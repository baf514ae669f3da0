//! ABC revenue classification (80/15/5 cumulative rule)

use rust_decimal::Decimal;

use crate::models::{AbcCategory, VariantRow};

pub const A_THRESHOLD_PERCENT: u32 = 80;
pub const B_THRESHOLD_PERCENT: u32 = 95;

const PERCENT_DP: u32 = 2;

/// Category for a cumulative revenue percentage
pub fn category_for(cumulative_percent: Decimal) -> AbcCategory {
    if cumulative_percent <= Decimal::from(A_THRESHOLD_PERCENT) {
        AbcCategory::A
    } else if cumulative_percent <= Decimal::from(B_THRESHOLD_PERCENT) {
        AbcCategory::B
    } else {
        AbcCategory::C
    }
}

/// Rank rows by revenue and tag each with its tier.
///
/// Ranks are 1-based in revenue order; ties keep their incoming order.
/// Percentages are rounded for display only, the band is decided on the
/// exact running share. With no revenue at all every row lands in `C`.
pub fn classify_abc(rows: &[VariantRow]) -> Vec<VariantRow> {
    let mut ranked: Vec<VariantRow> = rows.to_vec();
    ranked.sort_by(|a, b| b.revenue.cmp(&a.revenue));

    let total: Decimal = ranked.iter().map(|row| row.revenue).sum();
    let hundred = Decimal::ONE_HUNDRED;
    let mut running = Decimal::ZERO;

    for (index, row) in ranked.iter_mut().enumerate() {
        row.abc_rank = Some(index + 1);

        if total <= Decimal::ZERO {
            row.abc_category = Some(AbcCategory::C);
            row.revenue_percent = Some(Decimal::ZERO);
            row.cumulative_percent = Some(Decimal::ZERO);
            continue;
        }

        running += row.revenue;
        let share = row.revenue * hundred / total;
        let cumulative = running * hundred / total;

        row.abc_category = Some(category_for(cumulative));
        row.revenue_percent = Some(share.round_dp(PERCENT_DP));
        row.cumulative_percent = Some(cumulative.round_dp(PERCENT_DP));
    }

    ranked
}
