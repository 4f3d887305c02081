//! Financial ratio computation over a cached trial balance.

use rust_decimal::Decimal;

use crate::analytics::model::{AccountType, FinancialRatios, TrialBalance};

fn ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        None
    } else {
        Some(numerator / denominator)
    }
}

fn sum_where(tb: &TrialBalance, predicate: impl Fn(&AccountType, &str) -> bool) -> Decimal {
    tb.accounts
        .iter()
        .filter(|account| predicate(&account.account_type, account.category.as_str()))
        .map(|account| account.balance)
        .sum()
}

/// Totals used by both the ratio and materiality computations, all expressed
/// as positive magnitudes.
pub(crate) struct TrialBalanceTotals {
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    pub total_equity: Decimal,
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub net_income: Decimal,
}

pub(crate) fn totals(tb: &TrialBalance) -> TrialBalanceTotals {
    let total_assets = sum_where(tb, |t, _| *t == AccountType::Asset);
    let total_liabilities = sum_where(tb, |t, _| *t == AccountType::Liability).abs();
    let total_equity = sum_where(tb, |t, _| *t == AccountType::Equity).abs();
    let total_revenue = sum_where(tb, |t, _| *t == AccountType::Revenue).abs();
    let total_expenses = sum_where(tb, |t, _| *t == AccountType::Expense).abs();
    TrialBalanceTotals {
        total_assets,
        total_liabilities,
        total_equity,
        total_revenue,
        total_expenses,
        net_income: total_revenue - total_expenses,
    }
}

/// Computes liquidity, profitability, leverage and activity ratios.
///
/// Pure over its input. Any ratio with a zero denominator comes back as
/// `None`.
pub fn compute_ratios(tb: &TrialBalance) -> FinancialRatios {
    let totals = totals(tb);

    let current_assets = sum_where(tb, |t, c| *t == AccountType::Asset && c == "current");
    let current_liabilities =
        sum_where(tb, |t, c| *t == AccountType::Liability && c == "current").abs();
    let inventory = sum_where(tb, |t, c| *t == AccountType::Asset && c == "inventory");
    let receivables = sum_where(tb, |t, c| *t == AccountType::Asset && c == "receivable");

    FinancialRatios {
        current_ratio: ratio(current_assets, current_liabilities),
        quick_ratio: ratio(current_assets - inventory, current_liabilities),
        working_capital: current_assets - current_liabilities,
        net_profit_margin: ratio(totals.net_income, totals.total_revenue),
        return_on_assets: ratio(totals.net_income, totals.total_assets),
        return_on_equity: ratio(totals.net_income, totals.total_equity),
        debt_to_equity: ratio(totals.total_liabilities, totals.total_equity),
        debt_ratio: ratio(totals.total_liabilities, totals.total_assets),
        asset_turnover: ratio(totals.total_revenue, totals.total_assets),
        receivables_turnover: ratio(totals.total_revenue, receivables),
    }
}
