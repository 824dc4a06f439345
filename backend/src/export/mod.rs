//! Export shaping: every pipeline output as a named table, and the writers
//! that serialize tables into downloadable files.

pub mod charts;

use csv::WriterBuilder;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::ExportResult;
use crate::models::{Category, Period, RatioUnit, RatioValue};
use crate::transform::statements::StatementRow;
use crate::transform::LedgerReport;

pub use charts::{chart_data, ChartData};

/// A downloadable output of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    CleanedLedger,
    RejectedRows,
    ChartOfAccounts,
    LineItems,
    BalanceSheet,
    IncomeStatement,
    Ratios,
    Summary,
    AccountSummary,
    AccountPeriods,
}

impl Artifact {
    pub const ALL: [Artifact; 10] = [
        Self::CleanedLedger,
        Self::RejectedRows,
        Self::ChartOfAccounts,
        Self::LineItems,
        Self::BalanceSheet,
        Self::IncomeStatement,
        Self::Ratios,
        Self::Summary,
        Self::AccountSummary,
        Self::AccountPeriods,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Self::CleanedLedger => "cleaned_ledger",
            Self::RejectedRows => "rejected_rows",
            Self::ChartOfAccounts => "chart_of_accounts",
            Self::LineItems => "line_items",
            Self::BalanceSheet => "balance_sheet",
            Self::IncomeStatement => "income_statement",
            Self::Ratios => "ratios",
            Self::Summary => "summary",
            Self::AccountSummary => "account_summary",
            Self::AccountPeriods => "account_periods",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::CleanedLedger => "Cleaned ledger",
            Self::RejectedRows => "Rejected rows",
            Self::ChartOfAccounts => "Chart of accounts extract",
            Self::LineItems => "Statement line items",
            Self::BalanceSheet => "Balance sheet",
            Self::IncomeStatement => "Income statement",
            Self::Ratios => "Financial ratios",
            Self::Summary => "Category summary",
            Self::AccountSummary => "Account summary",
            Self::AccountPeriods => "Account totals by month and quarter",
        }
    }

    /// Accepts the slug with or without a file extension.
    pub fn from_slug(slug: &str) -> Option<Self> {
        let stem = slug.split_once('.').map_or(slug, |(stem, _)| stem);
        Self::ALL.into_iter().find(|a| a.slug() == stem)
    }
}

/// A rectangular table of text cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: &'static str,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(name: &'static str, headers: &[&str]) -> Self {
        Self {
            name,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }
}

/// Serializes tables to a spreadsheet format.
pub trait TableWriter {
    /// File extension, without the dot
    fn extension(&self) -> &'static str;

    fn content_type(&self) -> &'static str;

    fn write(&self, table: &Table, out: &mut dyn Write) -> ExportResult<()>;

    fn write_file(&self, table: &Table, path: &Path) -> ExportResult<()> {
        let mut out = BufWriter::new(File::create(path)?);
        self.write(table, &mut out)?;
        out.flush()?;
        Ok(())
    }
}

/// Delimited-text writer.
#[derive(Debug, Clone, Copy)]
pub struct CsvTableWriter {
    pub delimiter: u8,
}

impl Default for CsvTableWriter {
    fn default() -> Self {
        Self { delimiter: b';' }
    }
}

impl TableWriter for CsvTableWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn content_type(&self) -> &'static str {
        "text/csv; charset=utf-8"
    }

    fn write(&self, table: &Table, out: &mut dyn Write) -> ExportResult<()> {
        let mut wrt = WriterBuilder::new()
            .delimiter(self.delimiter)
            .flexible(false)
            .from_writer(out);
        wrt.write_record(&table.headers)?;
        for row in &table.rows {
            wrt.write_record(row)?;
        }
        wrt.flush()?;
        Ok(())
    }
}

// =============================================================================
// Shaping
// =============================================================================

fn amount(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn opt_amount(value: Option<Decimal>) -> String {
    value.map(amount).unwrap_or_default()
}

fn ratio_cell(value: &RatioValue, unit: RatioUnit) -> String {
    match unit {
        RatioUnit::Ratio => value.display(4),
        RatioUnit::Amount => value.display(2),
    }
}

fn period_headers(first: &[&str], periods: &[Period]) -> Vec<String> {
    first
        .iter()
        .map(|h| h.to_string())
        .chain(periods.iter().map(Period::to_string))
        .collect()
}

/// Shape one artifact of the report.
pub fn shape(report: &LedgerReport, artifact: Artifact) -> Table {
    match artifact {
        Artifact::CleanedLedger => cleaned_ledger(report),
        Artifact::RejectedRows => rejected_rows(report),
        Artifact::ChartOfAccounts => chart_of_accounts(report),
        Artifact::LineItems => line_items(report),
        Artifact::BalanceSheet => balance_sheet(report),
        Artifact::IncomeStatement => income_statement(report),
        Artifact::Ratios => ratios(report),
        Artifact::Summary => summary(report),
        Artifact::AccountSummary => account_summary(report),
        Artifact::AccountPeriods => account_periods(report),
    }
}

/// Every artifact of the report, in [`Artifact::ALL`] order.
pub fn shape_all(report: &LedgerReport) -> Vec<(Artifact, Table)> {
    Artifact::ALL
        .into_iter()
        .map(|artifact| (artifact, shape(report, artifact)))
        .collect()
}

fn cleaned_ledger(report: &LedgerReport) -> Table {
    let mut table = Table::new(
        Artifact::CleanedLedger.slug(),
        &[
            "Line", "Date", "Period", "Account", "Account name", "Label", "Counter account",
            "Code", "Origin", "Document", "Debit", "Credit", "VAT", "Category", "Subcategory",
        ],
    );
    for e in &report.entries {
        let entry = &e.entry;
        table.push(vec![
            entry.line.to_string(),
            entry.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            entry.period.to_string(),
            entry.account.clone(),
            entry.account_name.clone().unwrap_or_default(),
            entry.label.clone(),
            entry.counter_account.clone().unwrap_or_default(),
            entry.origin_code.clone().unwrap_or_default(),
            entry.origin.description().to_string(),
            entry.document.clone().unwrap_or_default(),
            amount(entry.debit),
            amount(entry.credit),
            if entry.vat { "yes" } else { "no" }.to_string(),
            e.class.category.to_string(),
            e.class.subcategory.clone(),
        ]);
    }
    table
}

fn rejected_rows(report: &LedgerReport) -> Table {
    let mut table = Table::new(
        Artifact::RejectedRows.slug(),
        &["Line", "Account", "Label", "Debit", "Credit", "Reason code", "Reason"],
    );
    for row in &report.rejected {
        table.push(vec![
            row.line.to_string(),
            row.account.clone(),
            row.label.clone(),
            row.debit.clone(),
            row.credit.clone(),
            row.reason.code().to_string(),
            row.reason.to_string(),
        ]);
    }
    table
}

fn chart_of_accounts(report: &LedgerReport) -> Table {
    let mut table = Table::new(
        Artifact::ChartOfAccounts.slug(),
        &["Account", "Name", "Category", "Subcategory"],
    );
    for account in &report.chart_extract {
        table.push(vec![
            account.account.clone(),
            account.name.clone().unwrap_or_default(),
            account.category.to_string(),
            account.subcategory.clone(),
        ]);
    }
    table
}

fn line_items(report: &LedgerReport) -> Table {
    let mut table = Table::new(
        Artifact::LineItems.slug(),
        &["Category", "Subcategory", "Period", "Debit", "Credit", "Value", "Entries"],
    );
    for item in &report.line_items {
        table.push(vec![
            item.category.to_string(),
            item.subcategory.clone(),
            item.period.to_string(),
            amount(item.debit),
            amount(item.credit),
            amount(item.value),
            item.entry_count.to_string(),
        ]);
    }
    table
}

/// Rows of each category followed by the category total.
fn push_sections(table: &mut Table, rows: &[StatementRow], categories: &[Category], width: usize) {
    for category in categories {
        let section: Vec<&StatementRow> = rows.iter().filter(|r| r.category == *category).collect();
        if section.is_empty() {
            continue;
        }
        let mut totals = vec![Decimal::ZERO; width];
        for row in section {
            let mut cells = vec![category.label().to_string(), row.subcategory.clone()];
            cells.extend(row.values.iter().map(|v| amount(*v)));
            table.push(cells);
            for (total, value) in totals.iter_mut().zip(&row.values) {
                *total += *value;
            }
        }
        let mut cells = vec![format!("Total {}", category.label().to_lowercase()), String::new()];
        cells.extend(totals.into_iter().map(amount));
        table.push(cells);
    }
}

fn balance_sheet(report: &LedgerReport) -> Table {
    let statements = &report.statements;
    let width = statements.periods.len();
    let mut table = Table {
        name: Artifact::BalanceSheet.slug(),
        headers: period_headers(&["Section", "Line"], &statements.periods),
        rows: Vec::new(),
    };

    push_sections(
        &mut table,
        &statements.balance_sheet,
        &[Category::Asset, Category::Liability, Category::Equity],
        width,
    );

    let mut cells = vec!["Difference".to_string(), "assets - liabilities - equity".to_string()];
    cells.extend(statements.balance_checks.iter().map(|c| amount(c.difference)));
    table.push(cells);
    table
}

fn income_statement(report: &LedgerReport) -> Table {
    let statements = &report.statements;
    let width = statements.periods.len();
    let mut table = Table {
        name: Artifact::IncomeStatement.slug(),
        headers: period_headers(&["Section", "Line"], &statements.periods),
        rows: Vec::new(),
    };

    push_sections(
        &mut table,
        &statements.income_statement,
        &[Category::Revenue, Category::Expense],
        width,
    );

    let mut cells = vec!["Net income".to_string(), String::new()];
    cells.extend(statements.net_income().into_iter().map(amount));
    table.push(cells);

    push_sections(&mut table, &statements.unclassified, &[Category::Unclassified], width);
    table
}

fn ratios(report: &LedgerReport) -> Table {
    let periods = report.periods();
    let mut table = Table {
        name: Artifact::Ratios.slug(),
        headers: period_headers(&["Key", "Ratio", "Group", "Unit"], periods),
        rows: Vec::new(),
    };

    for def in crate::transform::RATIOS {
        let mut cells = vec![
            def.key.to_string(),
            def.label.to_string(),
            def.group.label().to_string(),
            match def.unit {
                RatioUnit::Ratio => "ratio",
                RatioUnit::Amount => "amount",
            }
            .to_string(),
        ];
        for period in periods {
            let cell = report
                .ratios
                .iter()
                .find(|r| r.key == def.key && r.period == *period)
                .map(|r| ratio_cell(&r.value, r.unit))
                .unwrap_or_default();
            cells.push(cell);
        }
        table.push(cells);
    }
    table
}

fn summary(report: &LedgerReport) -> Table {
    let mut table = Table::new(
        Artifact::Summary.slug(),
        &[
            "Category", "Period", "Debit", "Credit", "Total", "Entries", "Previous total",
            "Delta", "Growth",
        ],
    );
    for s in &report.summary {
        table.push(vec![
            s.category.label().to_string(),
            s.period.to_string(),
            amount(s.debit),
            amount(s.credit),
            amount(s.total),
            s.entry_count.to_string(),
            opt_amount(s.previous_total),
            opt_amount(s.delta),
            s.growth.display(4),
        ]);
    }
    table
}

fn account_summary(report: &LedgerReport) -> Table {
    let mut table = Table::new(
        Artifact::AccountSummary.slug(),
        &[
            "Account", "Name", "Category", "Subcategory", "Debit", "Credit", "Balance", "Net VAT",
            "Entries",
        ],
    );
    for a in &report.accounts {
        table.push(vec![
            a.account.clone(),
            a.name.clone().unwrap_or_default(),
            a.category.to_string(),
            a.subcategory.clone(),
            amount(a.debit),
            amount(a.credit),
            amount(a.balance),
            amount(a.vat_net),
            a.entry_count.to_string(),
        ]);
    }
    table
}

fn account_periods(report: &LedgerReport) -> Table {
    let mut table = Table::new(
        Artifact::AccountPeriods.slug(),
        &["Account", "Granularity", "Period", "Debit", "Credit", "Balance", "Entries"],
    );
    for t in &report.account_periods {
        table.push(vec![
            t.account.clone(),
            t.granularity.to_string(),
            t.period.to_string(),
            amount(t.debit),
            amount(t.credit),
            amount(t.balance),
            t.entry_count.to_string(),
        ]);
    }
    table
}
