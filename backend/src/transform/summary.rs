//! Summary reports: category totals with period-over-period change, and
//! per-account views of the classified ledger.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{
    AccountClass, Category, ClassifiedEntry, Granularity, Period, RatioValue, StatementLineItem,
    SummaryCategory, Undefined,
};

use super::ratios::growth;

/// Category totals per period, with delta and growth against the previous
/// period. Categories with no line item at all are left out.
pub fn summarize_categories(line_items: &[StatementLineItem], periods: &[Period]) -> Vec<SummaryCategory> {
    let mut summaries = Vec::new();

    for category in Category::ALL {
        let items: Vec<&StatementLineItem> =
            line_items.iter().filter(|i| i.category == category).collect();
        if items.is_empty() {
            continue;
        }

        let mut previous: Option<Decimal> = None;
        for period in periods {
            let (mut debit, mut credit, mut total, mut entry_count) =
                (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, 0);
            for item in items.iter().filter(|i| i.period == *period) {
                debit += item.debit;
                credit += item.credit;
                total += item.value;
                entry_count += item.entry_count;
            }

            let growth_value = match previous {
                Some(prev) => RatioValue::from(growth(total, prev)),
                None => RatioValue::Undefined(Undefined::NoPriorPeriod),
            };

            summaries.push(SummaryCategory {
                category,
                period: *period,
                debit,
                credit,
                total,
                entry_count,
                previous_total: previous,
                delta: previous.map(|prev| total - prev),
                growth: growth_value,
            });
            previous = Some(total);
        }
    }

    summaries
}

/// Totals of one account over the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub account: String,
    pub name: Option<String>,
    pub category: Category,
    pub subcategory: String,
    pub debit: Decimal,
    pub credit: Decimal,
    /// Natural-sign balance
    pub balance: Decimal,
    /// VAT credit minus VAT debit
    pub vat_net: Decimal,
    pub entry_count: usize,
}

/// Totals of one account for one month or quarter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountPeriodTotal {
    pub account: String,
    pub granularity: Granularity,
    pub period: Period,
    pub debit: Decimal,
    pub credit: Decimal,
    pub balance: Decimal,
    pub entry_count: usize,
}

/// One row of the chart-of-accounts extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountExtract {
    pub account: String,
    pub name: Option<String>,
    pub category: Category,
    pub subcategory: String,
}

/// Per-account totals, ordered by account code.
pub fn summarize_accounts(entries: &[ClassifiedEntry]) -> Vec<AccountSummary> {
    let mut accounts: BTreeMap<&str, AccountSummary> = BTreeMap::new();

    for e in entries {
        let summary = accounts
            .entry(e.entry.account.as_str())
            .or_insert_with(|| AccountSummary {
                account: e.entry.account.clone(),
                name: None,
                category: e.class.category,
                subcategory: e.class.subcategory.clone(),
                debit: Decimal::ZERO,
                credit: Decimal::ZERO,
                balance: Decimal::ZERO,
                vat_net: Decimal::ZERO,
                entry_count: 0,
            });

        if summary.name.is_none() {
            summary.name = e.entry.account_name.clone();
        }
        summary.debit += e.entry.debit;
        summary.credit += e.entry.credit;
        summary.balance += e.natural_amount();
        if e.entry.vat {
            summary.vat_net += e.entry.credit - e.entry.debit;
        }
        summary.entry_count += 1;
    }

    accounts.into_values().collect()
}

/// Monthly and quarterly totals per account.
///
/// Entries booked against a period label rather than a date are counted in
/// that period as given.
pub fn account_period_totals(entries: &[ClassifiedEntry]) -> Vec<AccountPeriodTotal> {
    let mut totals: BTreeMap<(&str, Granularity, Period), AccountPeriodTotal> = BTreeMap::new();

    for e in entries {
        for granularity in [Granularity::Month, Granularity::Quarter] {
            let period = match e.entry.date {
                Some(date) => Period::from_date(date, granularity),
                None => e.entry.period.coarsen(granularity),
            };
            let total = totals
                .entry((e.entry.account.as_str(), granularity, period))
                .or_insert_with(|| AccountPeriodTotal {
                    account: e.entry.account.clone(),
                    granularity,
                    period,
                    debit: Decimal::ZERO,
                    credit: Decimal::ZERO,
                    balance: Decimal::ZERO,
                    entry_count: 0,
                });
            total.debit += e.entry.debit;
            total.credit += e.entry.credit;
            total.balance += e.natural_amount();
            total.entry_count += 1;
        }
    }

    totals.into_values().collect()
}

/// Every account seen in the run, with its classification.
pub fn account_extract(entries: &[ClassifiedEntry]) -> Vec<AccountExtract> {
    let mut accounts: BTreeMap<&str, (Option<&str>, &AccountClass)> = BTreeMap::new();

    for e in entries {
        let slot = accounts
            .entry(e.entry.account.as_str())
            .or_insert((None, &e.class));
        if slot.0.is_none() {
            slot.0 = e.entry.account_name.as_deref();
        }
    }

    accounts
        .into_iter()
        .map(|(account, (name, class))| AccountExtract {
            account: account.to_string(),
            name: name.map(str::to_string),
            category: class.category,
            subcategory: class.subcategory.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CleanEntry, Origin};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn line(category: Category, year: i32, debit: Decimal, credit: Decimal) -> StatementLineItem {
        StatementLineItem {
            category,
            subcategory: "general".into(),
            period: Period::Year(year),
            debit,
            credit,
            value: category.natural_amount(debit, credit),
            entry_count: 1,
        }
    }

    fn entry(account: &str, category: Category, date: (i32, u32, u32), debit: Decimal, credit: Decimal) -> ClassifiedEntry {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        ClassifiedEntry {
            entry: CleanEntry {
                line: 2,
                date: Some(date),
                period: Period::from_date(date, Granularity::Year),
                account: account.into(),
                account_name: None,
                label: String::new(),
                counter_account: None,
                origin_code: None,
                origin: Origin::Manual,
                document: None,
                debit,
                credit,
                vat: false,
            },
            class: AccountClass::new(category, "general"),
        }
    }

    #[test]
    fn test_category_summary_with_deltas() {
        let items = vec![
            line(Category::Revenue, 2023, dec!(0), dec!(200)),
            line(Category::Revenue, 2024, dec!(0), dec!(300)),
            line(Category::Expense, 2024, dec!(50), dec!(0)),
        ];
        let periods = vec![Period::Year(2023), Period::Year(2024)];

        let summary = summarize_categories(&items, &periods);
        assert_eq!(summary.len(), 4);

        let revenue_2024 = &summary[1];
        assert_eq!(revenue_2024.category, Category::Revenue);
        assert_eq!(revenue_2024.total, dec!(300));
        assert_eq!(revenue_2024.previous_total, Some(dec!(200)));
        assert_eq!(revenue_2024.delta, Some(dec!(100)));
        assert_eq!(revenue_2024.growth, RatioValue::Defined(dec!(0.5)));

        let expense_2023 = &summary[2];
        assert_eq!(expense_2023.total, dec!(0));
        assert!(expense_2023.growth.is_undefined());

        let expense_2024 = &summary[3];
        assert_eq!(expense_2024.previous_total, Some(dec!(0)));
        assert_eq!(expense_2024.growth, RatioValue::Undefined(Undefined::ZeroDenominator));
    }

    #[test]
    fn test_account_summary_and_vat() {
        let mut vat = entry("1020", Category::Asset, (2023, 3, 1), dec!(0), dec!(8));
        vat.entry.vat = true;
        let entries = vec![
            entry("3200", Category::Revenue, (2023, 3, 1), dec!(0), dec!(100)),
            entry("1020", Category::Asset, (2023, 3, 1), dec!(108), dec!(0)),
            vat,
        ];

        let summary = summarize_accounts(&entries);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].account, "1020");
        assert_eq!(summary[0].balance, dec!(100));
        assert_eq!(summary[0].vat_net, dec!(8));
        assert_eq!(summary[0].entry_count, 2);
        assert_eq!(summary[1].balance, dec!(100));
    }

    #[test]
    fn test_account_period_totals() {
        let entries = vec![
            entry("6000", Category::Expense, (2023, 1, 10), dec!(10), dec!(0)),
            entry("6000", Category::Expense, (2023, 2, 10), dec!(20), dec!(0)),
        ];

        let totals = account_period_totals(&entries);
        let months: Vec<_> = totals
            .iter()
            .filter(|t| t.granularity == Granularity::Month)
            .map(|t| (t.period.to_string(), t.balance))
            .collect();
        assert_eq!(months, vec![("2023-01".to_string(), dec!(10)), ("2023-02".to_string(), dec!(20))]);

        let quarters: Vec<_> = totals
            .iter()
            .filter(|t| t.granularity == Granularity::Quarter)
            .collect();
        assert_eq!(quarters.len(), 1);
        assert_eq!(quarters[0].balance, dec!(30));
        assert_eq!(quarters[0].entry_count, 2);
    }

    #[test]
    fn test_account_extract_is_unique_and_sorted() {
        let mut named = entry("1020", Category::Asset, (2023, 1, 1), dec!(1), dec!(0));
        named.entry.account_name = Some("Bank".into());
        let entries = vec![
            entry("6000", Category::Expense, (2023, 1, 1), dec!(1), dec!(0)),
            entry("1020", Category::Asset, (2023, 1, 1), dec!(1), dec!(0)),
            named,
        ];

        let extract = account_extract(&entries);
        assert_eq!(extract.len(), 2);
        assert_eq!(extract[0].account, "1020");
        assert_eq!(extract[0].name.as_deref(), Some("Bank"));
        assert_eq!(extract[1].category, Category::Expense);
    }
}
