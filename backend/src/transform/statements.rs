//! Balance sheet and income statement shaped from line items.
//!
//! Balance sheet rows hold closing balances (cumulated over every period up
//! to and including the column's period). Income statement rows hold the
//! flows of each period.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{subcategory, Category, Period, StatementLineItem};

/// Largest difference still treated as balanced.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// One statement row with a value per period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementRow {
    pub category: Category,
    pub subcategory: String,
    /// Aligned with [`Statements::periods`]
    pub values: Vec<Decimal>,
}

/// Assets against liabilities plus equity for one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    pub period: Period,
    pub assets: Decimal,
    pub liabilities_and_equity: Decimal,
    pub difference: Decimal,
    pub balanced: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Statements {
    pub periods: Vec<Period>,
    pub balance_sheet: Vec<StatementRow>,
    pub income_statement: Vec<StatementRow>,
    pub unclassified: Vec<StatementRow>,
    pub balance_checks: Vec<BalanceCheck>,
}

impl Statements {
    /// Sum of the rows of `category` in `rows`, per period.
    pub fn category_totals(&self, rows: &[StatementRow], category: Category) -> Vec<Decimal> {
        let mut totals = vec![Decimal::ZERO; self.periods.len()];
        for row in rows.iter().filter(|r| r.category == category) {
            for (total, value) in totals.iter_mut().zip(&row.values) {
                *total += *value;
            }
        }
        totals
    }

    /// Revenue minus expenses, per period.
    pub fn net_income(&self) -> Vec<Decimal> {
        let revenue = self.category_totals(&self.income_statement, Category::Revenue);
        let expenses = self.category_totals(&self.income_statement, Category::Expense);
        revenue.iter().zip(&expenses).map(|(r, e)| r - e).collect()
    }

    pub fn is_balanced(&self) -> bool {
        self.balance_checks.iter().all(|check| check.balanced)
    }
}

/// Shape the statements. `periods` must be sorted and cover every line item.
pub fn build_statements(line_items: &[StatementLineItem], periods: &[Period]) -> Statements {
    let column = |period: &Period| periods.binary_search(period).ok();

    let mut flows: BTreeMap<(Category, &str), Vec<Decimal>> = BTreeMap::new();
    for item in line_items {
        let Some(index) = column(&item.period) else {
            continue;
        };
        flows
            .entry((item.category, item.subcategory.as_str()))
            .or_insert_with(|| vec![Decimal::ZERO; periods.len()])[index] += item.value;
    }

    let mut statements = Statements {
        periods: periods.to_vec(),
        ..Default::default()
    };

    for ((category, subcategory), values) in flows {
        let row = |values| StatementRow {
            category,
            subcategory: subcategory.to_string(),
            values,
        };
        if category.is_balance_sheet() {
            statements.balance_sheet.push(row(cumulate(&values)));
        } else if category.is_income_statement() {
            statements.income_statement.push(row(values));
        } else {
            statements.unclassified.push(row(values));
        }
    }

    statements.balance_checks = balance_checks(&statements, None);

    if !statements.is_balanced() {
        let current_result = cumulate(&statements.net_income());
        statements.balance_checks = balance_checks(&statements, Some(&current_result));
        let position = statements
            .balance_sheet
            .iter()
            .position(|row| row.category > Category::Equity)
            .unwrap_or(statements.balance_sheet.len());
        statements.balance_sheet.insert(
            position,
            StatementRow {
                category: Category::Equity,
                subcategory: subcategory::CURRENT_RESULT.to_string(),
                values: current_result,
            },
        );
    }

    statements
}

fn cumulate(values: &[Decimal]) -> Vec<Decimal> {
    values
        .iter()
        .scan(Decimal::ZERO, |running, value| {
            *running += *value;
            Some(*running)
        })
        .collect()
}

fn balance_checks(statements: &Statements, current_result: Option<&[Decimal]>) -> Vec<BalanceCheck> {
    let assets = statements.category_totals(&statements.balance_sheet, Category::Asset);
    let liabilities = statements.category_totals(&statements.balance_sheet, Category::Liability);
    let equity = statements.category_totals(&statements.balance_sheet, Category::Equity);

    statements
        .periods
        .iter()
        .enumerate()
        .map(|(i, period)| {
            let extra = current_result.map_or(Decimal::ZERO, |values| values[i]);
            let liabilities_and_equity = liabilities[i] + equity[i] + extra;
            let difference = assets[i] - liabilities_and_equity;
            BalanceCheck {
                period: *period,
                assets: assets[i],
                liabilities_and_equity,
                difference,
                balanced: difference.abs() <= BALANCE_TOLERANCE,
            }
        })
        .collect()
}
