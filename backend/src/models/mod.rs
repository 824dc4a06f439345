//! Domain models for the ledger transformation pipeline.
//!
//! This module contains the data structures passed between stages:
//!
//! - [`RawEntry`] - One uploaded row, as text
//! - [`CleanEntry`] - A validated entry with decimal amounts and a resolved period
//! - [`Category`] / [`AccountClass`] - Classification from the chart of accounts
//! - [`StatementLineItem`] - Aggregated value per category, subcategory and period
//! - [`Ratio`] / [`RatioValue`] - Computed metrics, possibly undefined
//! - [`SummaryCategory`] - Category totals with period-over-period deltas

pub mod period;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use period::{parse_date, Granularity, Period};

// =============================================================================
// Categories
// =============================================================================

/// Top-level account category.
///
/// Declaration order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[serde(alias = "assets", alias = "actif", alias = "aktiven")]
    Asset,
    #[serde(alias = "liabilities", alias = "passif", alias = "passiven")]
    Liability,
    #[serde(alias = "capitaux propres", alias = "eigenkapital")]
    Equity,
    #[serde(alias = "income", alias = "produit", alias = "ertrag")]
    Revenue,
    #[serde(alias = "expenses", alias = "charge", alias = "aufwand")]
    Expense,
    Unclassified,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
        Self::Unclassified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::Equity => "equity",
            Self::Revenue => "revenue",
            Self::Expense => "expense",
            Self::Unclassified => "unclassified",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Asset => "Assets",
            Self::Liability => "Liabilities",
            Self::Equity => "Equity",
            Self::Revenue => "Revenue",
            Self::Expense => "Expenses",
            Self::Unclassified => "Unclassified",
        }
    }

    /// Whether the category carries a credit balance in normal operation.
    pub fn is_credit_normal(&self) -> bool {
        matches!(self, Self::Liability | Self::Equity | Self::Revenue)
    }

    /// Balance sheet categories accumulate across periods.
    pub fn is_balance_sheet(&self) -> bool {
        matches!(self, Self::Asset | Self::Liability | Self::Equity)
    }

    pub fn is_income_statement(&self) -> bool {
        matches!(self, Self::Revenue | Self::Expense)
    }

    /// Natural-sign amount: debit - credit for debit-normal categories,
    /// credit - debit otherwise.
    pub fn natural_amount(&self, debit: Decimal, credit: Decimal) -> Decimal {
        if self.is_credit_normal() {
            credit - debit
        } else {
            debit - credit
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subcategory names used by the built-in chart and by ratio formulas.
pub mod subcategory {
    pub const CASH: &str = "cash";
    pub const RECEIVABLES: &str = "receivables";
    pub const INVENTORY: &str = "inventory";
    pub const PREPAID_EXPENSES: &str = "prepaid_expenses";
    pub const FINANCIAL_ASSETS: &str = "financial_assets";
    pub const FIXED_ASSETS: &str = "fixed_assets";
    pub const OTHER_ASSETS: &str = "other_assets";
    pub const CURRENT_LIABILITIES: &str = "current_liabilities";
    pub const LONG_TERM_DEBT: &str = "long_term_debt";
    pub const PROVISIONS: &str = "provisions";
    pub const OTHER_LIABILITIES: &str = "other_liabilities";
    pub const EQUITY: &str = "equity";
    pub const CURRENT_RESULT: &str = "current_result";
    pub const OPERATING_REVENUE: &str = "operating_revenue";
    pub const DIRECT_COSTS: &str = "direct_costs";
    pub const PERSONNEL: &str = "personnel";
    pub const OPERATING_EXPENSES: &str = "operating_expenses";
    pub const ANCILLARY: &str = "ancillary";
    pub const FINANCIAL_EXTRAORDINARY: &str = "financial_extraordinary";
    pub const GENERAL: &str = "general";
    pub const UNCLASSIFIED: &str = "unclassified";

    /// Assets counted as current for liquidity ratios.
    pub const CURRENT_ASSETS: &[&str] = &[CASH, RECEIVABLES, INVENTORY, PREPAID_EXPENSES];
}

/// Result of looking an account up in the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountClass {
    pub category: Category,
    pub subcategory: String,
}

impl AccountClass {
    pub fn new(category: Category, subcategory: impl Into<String>) -> Self {
        Self {
            category,
            subcategory: subcategory.into(),
        }
    }

    pub fn unclassified() -> Self {
        Self::new(Category::Unclassified, subcategory::UNCLASSIFIED)
    }

    pub fn is_unclassified(&self) -> bool {
        self.category == Category::Unclassified
    }
}

// =============================================================================
// Origin codes
// =============================================================================

/// Where an entry was booked from, decoded from the export's origin code.
///
/// Codes are case-sensitive: `K` is a purchase invoice, `k` its payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    FinancialAccounting,
    PurchaseInvoice,
    PurchasePayment,
    SalesInvoice,
    SalesPayment,
    ElectronicBanking,
    Payroll,
    Manual,
    /// Balance carried forward from before the export's first period
    OpeningBalance,
}

impl Origin {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "F" => Self::FinancialAccounting,
            "K" => Self::PurchaseInvoice,
            "k" => Self::PurchasePayment,
            "D" => Self::SalesInvoice,
            "d" => Self::SalesPayment,
            "Y" => Self::ElectronicBanking,
            "L" => Self::Payroll,
            _ => Self::Manual,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FinancialAccounting => "Financial accounting",
            Self::PurchaseInvoice => "Purchase invoice entry",
            Self::PurchasePayment => "Purchase invoice payment",
            Self::SalesInvoice => "Sales invoice entry",
            Self::SalesPayment => "Sales invoice payment",
            Self::ElectronicBanking => "EBICS (electronic banking)",
            Self::Payroll => "Payroll",
            Self::Manual => "Manual or unknown entry",
            Self::OpeningBalance => "Opening balance",
        }
    }
}

// =============================================================================
// Entries
// =============================================================================

/// One uploaded row, exactly as read (cells trimmed by the reader).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawEntry {
    /// Line number in the source file (1-based, header is line 1)
    pub line: u64,
    pub date: String,
    pub account: String,
    pub account_name: String,
    pub label: String,
    pub counter_account: String,
    pub origin_code: String,
    pub document: String,
    pub debit: String,
    pub credit: String,
    /// Running balance, read only on opening-balance rows
    pub balance: String,
}

impl RawEntry {
    /// True when every cell of the row is empty.
    pub fn is_blank(&self) -> bool {
        [
            &self.date,
            &self.account,
            &self.account_name,
            &self.label,
            &self.counter_account,
            &self.origin_code,
            &self.document,
            &self.debit,
            &self.credit,
            &self.balance,
        ]
        .iter()
        .all(|cell| cell.trim().is_empty())
    }
}

/// A validated ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanEntry {
    pub line: u64,
    pub date: Option<NaiveDate>,
    pub period: Period,
    pub account: String,
    pub account_name: Option<String>,
    pub label: String,
    pub counter_account: Option<String>,
    pub origin_code: Option<String>,
    pub origin: Origin,
    pub document: Option<String>,
    /// Non-negative debit amount
    pub debit: Decimal,
    /// Non-negative credit amount
    pub credit: Decimal,
    /// Entry touches a VAT account or mentions VAT
    pub vat: bool,
}

/// A clean entry tagged by the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedEntry {
    #[serde(flatten)]
    pub entry: CleanEntry,
    pub class: AccountClass,
}

impl ClassifiedEntry {
    pub fn category(&self) -> Category {
        self.class.category
    }

    /// Amount in the category's natural sign.
    pub fn natural_amount(&self) -> Decimal {
        self.class
            .category
            .natural_amount(self.entry.debit, self.entry.credit)
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// Aggregated amounts for one (category, subcategory, period).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementLineItem {
    pub category: Category,
    pub subcategory: String,
    pub period: Period,
    pub debit: Decimal,
    pub credit: Decimal,
    /// Natural-sign value (see [`Category::natural_amount`])
    pub value: Decimal,
    pub entry_count: usize,
}

/// Why a ratio could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum Undefined {
    /// A figure the formula needs has no line item in the period
    MissingLineItem(&'static str),
    ZeroDenominator,
    NoPriorPeriod,
    Overflow,
}

impl fmt::Display for Undefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLineItem(name) => write!(f, "missing line item: {}", name),
            Self::ZeroDenominator => f.write_str("zero denominator"),
            Self::NoPriorPeriod => f.write_str("no prior period"),
            Self::Overflow => f.write_str("arithmetic overflow"),
        }
    }
}

/// A computed value, or an explicit marker that it cannot be computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum RatioValue {
    Defined(Decimal),
    Undefined(Undefined),
}

impl RatioValue {
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Defined(v) => Some(*v),
            Self::Undefined(_) => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined(_))
    }

    /// Cell text for exports: the value at `dp` decimals, or `undefined`.
    pub fn display(&self, dp: usize) -> String {
        match self {
            Self::Defined(v) => format!("{:.*}", dp, v),
            Self::Undefined(_) => "undefined".to_string(),
        }
    }
}

impl From<Result<Decimal, Undefined>> for RatioValue {
    fn from(result: Result<Decimal, Undefined>) -> Self {
        match result {
            Ok(v) => Self::Defined(v),
            Err(reason) => Self::Undefined(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioGroup {
    Liquidity,
    Profitability,
    Solvency,
    Efficiency,
    Growth,
}

impl RatioGroup {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Liquidity => "Liquidity",
            Self::Profitability => "Profitability",
            Self::Solvency => "Solvency",
            Self::Efficiency => "Efficiency",
            Self::Growth => "Growth",
        }
    }
}

/// Whether a metric is a dimensionless ratio or a currency amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioUnit {
    Ratio,
    Amount,
}

/// One metric for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ratio {
    pub key: &'static str,
    pub label: &'static str,
    pub group: RatioGroup,
    pub unit: RatioUnit,
    pub period: Period,
    pub value: RatioValue,
}

/// Category totals for one period, with the change from the prior period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryCategory {
    pub category: Category,
    pub period: Period,
    pub debit: Decimal,
    pub credit: Decimal,
    pub total: Decimal,
    pub entry_count: usize,
    /// Total of the previous period (zero when the category had no activity)
    pub previous_total: Option<Decimal>,
    pub delta: Option<Decimal>,
    pub growth: RatioValue,
}
