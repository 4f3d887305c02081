//! Audit analytics domain models.
//!
//! Balances follow the usual trial-balance sign convention: debit-normal
//! accounts (assets, expenses) carry positive balances, credit-normal
//! accounts (liabilities, equity, revenue) carry negative balances.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Ledger account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// One ledger account balance within a trial balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub category: String,
    pub balance: Decimal,
}

/// One journal entry line considered by JE testing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
}

/// Base input to all audit analytics: every account balance of an entity at
/// a point in time plus the journal entries of the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalance {
    pub accounts: Vec<Account>,
    pub journal_entries: Vec<JournalEntry>,
    pub year_end: NaiveDate,
}

/// Computed financial ratios. `None` marks a ratio whose denominator was
/// zero: not applicable rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FinancialRatios {
    // Liquidity
    pub current_ratio: Option<Decimal>,
    pub quick_ratio: Option<Decimal>,
    pub working_capital: Decimal,
    // Profitability
    pub net_profit_margin: Option<Decimal>,
    pub return_on_assets: Option<Decimal>,
    pub return_on_equity: Option<Decimal>,
    // Leverage
    pub debt_to_equity: Option<Decimal>,
    pub debt_ratio: Option<Decimal>,
    // Activity
    pub asset_turnover: Option<Decimal>,
    pub receivables_turnover: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    NegativeAssetBalance,
    UnexpectedDebitBalance,
    BalanceOutlier,
    TrialBalanceImbalance,
}

/// One flagged condition found in a trial balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difference: Option<Decimal>,
}

/// A journal entry flagged by one of the JE testing procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedEntry {
    pub entry_id: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub reason: String,
}

/// Results of the journal-entry testing procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntryTests {
    pub round_dollar_testing: Vec<FlaggedEntry>,
    pub large_adjustments: Vec<FlaggedEntry>,
    pub unusual_timing: Vec<FlaggedEntry>,
}

/// Lower thresholds applied to sensitive categories, each a fixed fraction
/// of overall materiality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpecificMateriality {
    pub related_party: Decimal,
    pub executive_compensation: Decimal,
    pub contingencies: Decimal,
}

/// Materiality thresholds for the engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MaterialityThresholds {
    pub overall: Decimal,
    pub performance_materiality: Decimal,
    pub clearly_trivial: Decimal,
    pub specific_materiality: SpecificMateriality,
}

/// Derived snapshot produced entirely from cached data. Persisted as a
/// regular entity and synced through the outbox like any other row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResult {
    pub id: String,
    pub engagement_id: String,
    pub processed_at: DateTime<Utc>,
    pub ratios: FinancialRatios,
    pub anomalies: Vec<Anomaly>,
    pub je_tests: JournalEntryTests,
    pub materiality: MaterialityThresholds,
}
