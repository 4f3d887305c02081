//! Trial balance anomaly detection.

use rust_decimal::Decimal;

use crate::analytics::model::{AccountType, Anomaly, AnomalyKind, Severity, TrialBalance};

/// Multiple of the population average beyond which a balance is an outlier.
const OUTLIER_MULTIPLE: i64 = 10;

/// Tolerated debit/credit difference, in currency units (0.01).
fn imbalance_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Flags suspicious balances and an out-of-balance trial balance.
///
/// Checks, in order: negative balances on asset accounts, positive (debit)
/// balances on liability or equity accounts, balances whose absolute value
/// exceeds ten times the population average, and a debit/credit imbalance
/// beyond the fixed tolerance. The imbalance is `critical`; balance-shape
/// findings are `high`, outliers `medium`.
pub fn detect_anomalies(tb: &TrialBalance) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for account in &tb.accounts {
        match account.account_type {
            AccountType::Asset if account.balance < Decimal::ZERO => {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::NegativeAssetBalance,
                    severity: Severity::High,
                    account: Some(account.name.clone()),
                    message: format!(
                        "asset account '{}' carries a negative balance",
                        account.name
                    ),
                    balance: Some(account.balance),
                    difference: None,
                });
            }
            AccountType::Liability | AccountType::Equity if account.balance > Decimal::ZERO => {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::UnexpectedDebitBalance,
                    severity: Severity::High,
                    account: Some(account.name.clone()),
                    message: format!(
                        "credit-normal account '{}' carries a debit balance",
                        account.name
                    ),
                    balance: Some(account.balance),
                    difference: None,
                });
            }
            _ => {}
        }
    }

    if !tb.accounts.is_empty() {
        let population_average = tb
            .accounts
            .iter()
            .map(|account| account.balance.abs())
            .sum::<Decimal>()
            / Decimal::from(tb.accounts.len() as i64);
        let threshold = population_average * Decimal::from(OUTLIER_MULTIPLE);
        if threshold > Decimal::ZERO {
            for account in &tb.accounts {
                if account.balance.abs() > threshold {
                    anomalies.push(Anomaly {
                        kind: AnomalyKind::BalanceOutlier,
                        severity: Severity::Medium,
                        account: Some(account.name.clone()),
                        message: format!(
                            "balance of '{}' exceeds {}x the population average",
                            account.name, OUTLIER_MULTIPLE
                        ),
                        balance: Some(account.balance),
                        difference: None,
                    });
                }
            }
        }
    }

    let debits: Decimal = tb
        .accounts
        .iter()
        .filter(|account| account.balance > Decimal::ZERO)
        .map(|account| account.balance)
        .sum();
    let credits: Decimal = tb
        .accounts
        .iter()
        .filter(|account| account.balance < Decimal::ZERO)
        .map(|account| -account.balance)
        .sum();
    let difference = (debits - credits).abs();
    if difference > imbalance_tolerance() {
        anomalies.push(Anomaly {
            kind: AnomalyKind::TrialBalanceImbalance,
            severity: Severity::Critical,
            account: None,
            message: format!(
                "trial balance out of balance: debits {} vs credits {}",
                debits, credits
            ),
            balance: None,
            difference: Some(difference),
        });
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::model::Account;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn account(name: &str, account_type: AccountType, balance: Decimal) -> Account {
        Account {
            name: name.to_string(),
            account_type,
            category: "current".to_string(),
            balance,
        }
    }

    fn trial_balance(accounts: Vec<Account>) -> TrialBalance {
        TrialBalance {
            accounts,
            journal_entries: vec![],
            year_end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        }
    }

    #[test]
    fn imbalance_of_two_cents_is_critical() {
        let tb = trial_balance(vec![
            account("Cash", AccountType::Asset, dec!(100.00)),
            account("Payables", AccountType::Liability, dec!(-99.98)),
        ]);

        let anomalies = detect_anomalies(&tb);
        let imbalance: Vec<_> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::TrialBalanceImbalance)
            .collect();
        assert_eq!(imbalance.len(), 1);
        assert_eq!(imbalance[0].severity, Severity::Critical);
        assert_eq!(imbalance[0].difference, Some(dec!(0.02)));
    }

    #[test]
    fn one_cent_difference_is_within_tolerance() {
        let tb = trial_balance(vec![
            account("Cash", AccountType::Asset, dec!(100.00)),
            account("Payables", AccountType::Liability, dec!(-99.99)),
        ]);

        let anomalies = detect_anomalies(&tb);
        assert!(!anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::TrialBalanceImbalance));
    }

    #[test]
    fn flags_negative_asset_and_debit_liability() {
        let tb = trial_balance(vec![
            account("Overdrawn cash", AccountType::Asset, dec!(-50)),
            account("Misbooked loan", AccountType::Liability, dec!(50)),
        ]);

        let anomalies = detect_anomalies(&tb);
        assert!(anomalies.iter().any(|a| {
            a.kind == AnomalyKind::NegativeAssetBalance
                && a.severity == Severity::High
                && a.account.as_deref() == Some("Overdrawn cash")
        }));
        assert!(anomalies.iter().any(|a| {
            a.kind == AnomalyKind::UnexpectedDebitBalance
                && a.account.as_deref() == Some("Misbooked loan")
        }));
    }

    #[test]
    fn flags_balance_outlier_against_population_average() {
        // 20 accounts of 10 plus the whale: average (200 + 5000) / 21 ≈ 248,
        // so the 10x threshold sits near 2,476 and only the whale crosses it.
        let mut accounts: Vec<Account> = (0..20)
            .map(|i| account(&format!("A{i}"), AccountType::Asset, dec!(10)))
            .collect();
        accounts.push(account("Whale", AccountType::Asset, dec!(5000)));
        let tb = trial_balance(accounts);

        let anomalies = detect_anomalies(&tb);
        let outliers: Vec<_> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::BalanceOutlier)
            .collect();
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].account.as_deref(), Some("Whale"));
        assert_eq!(outliers[0].severity, Severity::Medium);
    }

    #[test]
    fn balanced_clean_trial_balance_has_no_anomalies() {
        let tb = trial_balance(vec![
            account("Cash", AccountType::Asset, dec!(500)),
            account("Payables", AccountType::Liability, dec!(-500)),
        ]);

        assert!(detect_anomalies(&tb).is_empty());
    }
}
