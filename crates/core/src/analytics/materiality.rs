//! Materiality threshold computation.

use rust_decimal::Decimal;

use crate::analytics::model::{MaterialityThresholds, SpecificMateriality, TrialBalance};
use crate::analytics::ratios::totals;

fn pct(value: Decimal, percent: Decimal) -> Decimal {
    value * percent / Decimal::ONE_HUNDRED
}

/// Computes the engagement materiality thresholds from benchmark totals.
///
/// Overall materiality is the greatest of 1% of total assets, 0.5% of total
/// revenue and 5% of absolute net income. Performance materiality is 70% of
/// overall, the clearly-trivial threshold 5%. Sensitive categories get fixed
/// fractions of overall materiality.
pub fn compute_materiality(tb: &TrialBalance) -> MaterialityThresholds {
    let totals = totals(tb);

    let overall = pct(totals.total_assets, Decimal::ONE)
        .max(pct(totals.total_revenue, Decimal::new(5, 1)))
        .max(pct(totals.net_income.abs(), Decimal::from(5)));

    MaterialityThresholds {
        overall,
        performance_materiality: pct(overall, Decimal::from(70)),
        clearly_trivial: pct(overall, Decimal::from(5)),
        specific_materiality: SpecificMateriality {
            related_party: pct(overall, Decimal::from(10)),
            executive_compensation: pct(overall, Decimal::from(10)),
            contingencies: pct(overall, Decimal::from(20)),
        },
    }
}
