//! High-level pipeline API: from an uploaded ledger export to a full report.
//!
//! This module chains every stage:
//! parsing, schema check, cleaning, classification, aggregation, statements,
//! ratios and summaries. Serializing the report is left to [`crate::export`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ledgerflow::chart::ChartOfAccounts;
//! use ledgerflow::transform::pipeline::{run_file, PipelineOptions};
//!
//! let chart = ChartOfAccounts::swiss_sme();
//! let report = run_file("grand-livre.csv", &chart, &PipelineOptions::default())?;
//! println!("{} entries, {} rejected", report.entries.len(), report.rejected.len());
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::api::logs::{log_info_indent, log_stage, log_success, log_warning, log_warning_indent};
use crate::chart::ChartOfAccounts;
use crate::error::{ChartError, PipelineError, PipelineResult};
use crate::models::{
    ClassifiedEntry, Granularity, Period, RawEntry, Ratio, StatementLineItem, SummaryCategory,
};
use crate::parser::{parse_bytes_auto, parse_file_auto, ColumnMap, ParseResult};

use super::aggregate::{aggregate, periods, Reconciliation};
use super::classify::classify;
use super::clean::{clean, CleanOutput, RejectedRow};
use super::ratios::compute_ratios;
use super::statements::{build_statements, Statements};
use super::summary::{
    account_extract, account_period_totals, summarize_accounts, summarize_categories,
    AccountExtract, AccountPeriodTotal, AccountSummary,
};

/// Rejections listed individually in the log before summarizing.
const LOGGED_REJECTIONS: usize = 5;

/// Options for a pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Period resolution of statements and ratios
    #[serde(default)]
    pub granularity: Granularity,
}

/// Where the rows came from
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub encoding: String,
    pub delimiter: Option<char>,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReport {
    pub source: SourceInfo,
    pub granularity: Granularity,
    pub chart_name: String,
    pub entries: Vec<ClassifiedEntry>,
    pub rejected: Vec<RejectedRow>,
    pub blank_rows: usize,
    pub unclassified_accounts: BTreeSet<String>,
    pub line_items: Vec<StatementLineItem>,
    pub reconciliation: Reconciliation,
    pub statements: Statements,
    pub ratios: Vec<Ratio>,
    pub summary: Vec<SummaryCategory>,
    pub accounts: Vec<AccountSummary>,
    pub account_periods: Vec<AccountPeriodTotal>,
    pub chart_extract: Vec<AccountExtract>,
}

impl LedgerReport {
    pub fn periods(&self) -> &[Period] {
        &self.statements.periods
    }
}

/// Run the pipeline on a ledger file.
pub fn run_file(
    path: impl AsRef<Path>,
    chart: &ChartOfAccounts,
    options: &PipelineOptions,
) -> PipelineResult<LedgerReport> {
    let path = path.as_ref();
    log_stage("parse", format!("Reading {}", path.display()));
    let bytes = std::fs::read(path).map_err(|e| {
        crate::parser::CsvError::new(0, format!("Cannot read file '{}': {}", path.display(), e))
    })?;
    run_bytes(&bytes, chart, options)
}

/// Run the pipeline on uploaded bytes.
pub fn run_bytes(
    bytes: &[u8],
    chart: &ChartOfAccounts,
    options: &PipelineOptions,
) -> PipelineResult<LedgerReport> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(PipelineError::EmptyInput { rejected: 0 });
    }
    let parsed = parse_bytes_auto(bytes)?;
    run_parsed(parsed, chart, options)
}

/// Run the pipeline on an already-read sheet.
///
/// The header row is checked before any stage runs.
pub fn run_parsed(
    parsed: ParseResult,
    chart: &ChartOfAccounts,
    options: &PipelineOptions,
) -> PipelineResult<LedgerReport> {
    log_stage("parse", "Reading ledger export...");
    match parsed.delimiter {
        Some(delimiter) => {
            log_success(format!("Detected encoding: {}", parsed.encoding));
            log_success(format!("Detected separator: '{}'", format_delimiter(delimiter)));
        }
        None => log_success(format!("Detected {} workbook", parsed.encoding)),
    }
    log_success(format!("Read {} rows", parsed.rows.len()));

    let columns = ColumnMap::resolve(&parsed.headers)?;
    let raw = columns.raw_entries(&parsed.rows);
    let source = SourceInfo {
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        headers: parsed.headers,
        row_count: parsed.rows.len(),
    };

    run_entries(raw, source, chart, options)
}

/// Read a sheet and clean it, without classifying.
pub fn clean_file(path: impl AsRef<Path>, options: &PipelineOptions) -> PipelineResult<CleanOutput> {
    let parsed = parse_file_auto(path)?;
    let columns = ColumnMap::resolve(&parsed.headers)?;
    Ok(clean(columns.raw_entries(&parsed.rows), options.granularity))
}

/// Run every stage after parsing.
pub fn run_entries(
    raw: Vec<RawEntry>,
    source: SourceInfo,
    chart: &ChartOfAccounts,
    options: &PipelineOptions,
) -> PipelineResult<LedgerReport> {
    if chart.is_empty() {
        return Err(ChartError::Empty.into());
    }

    // Step 1: Cleaning
    log_stage("clean", "Cleaning and validating rows...");
    let cleaned = clean(raw, options.granularity);
    log_success(format!("{} valid entries", cleaned.entries.len()));
    if cleaned.blank_rows > 0 {
        log_info_indent(format!("{} blank rows skipped", cleaned.blank_rows), 1);
    }
    if cleaned.header_rows > 0 {
        log_info_indent(format!("{} period header rows read", cleaned.header_rows), 1);
    }
    if !cleaned.rejected.is_empty() {
        log_warning(format!("{} rows rejected", cleaned.rejected.len()));
        for row in cleaned.rejected.iter().take(LOGGED_REJECTIONS) {
            log_warning_indent(format!("Line {}: {}", row.line, row.reason), 1);
        }
    }
    if cleaned.entries.is_empty() {
        return Err(PipelineError::EmptyInput {
            rejected: cleaned.rejected.len(),
        });
    }

    // Step 2: Classification
    log_stage("classify", format!("Classifying with {}...", chart.name()));
    let classification = classify(cleaned.entries, chart);
    if classification.unclassified_accounts.is_empty() {
        log_success("All accounts classified");
    } else {
        log_warning(format!(
            "{} entries on {} unknown account(s): {}",
            classification.unclassified_count(),
            classification.unclassified_accounts.len(),
            classification
                .unclassified_accounts
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    // Step 3: Aggregation
    log_stage("aggregate", "Aggregating line items...");
    let mut aggregation = aggregate(&classification.entries)?;
    aggregation.reconciliation.rejected_count = cleaned.rejected.len();
    let periods = periods(&aggregation.line_items);
    log_success(format!(
        "{} line items over {} period(s), totals reconciled",
        aggregation.line_items.len(),
        periods.len()
    ));

    // Step 4: Statements
    log_stage("statements", "Building balance sheet and income statement...");
    let statements = build_statements(&aggregation.line_items, &periods);
    for check in statements.balance_checks.iter().filter(|c| !c.balanced) {
        log_warning(format!(
            "Balance sheet off by {} in {}",
            check.difference.round_dp(2),
            check.period
        ));
    }

    // Step 5: Ratios
    log_stage("ratios", "Computing ratios...");
    let ratios = compute_ratios(&statements, &aggregation.line_items);
    let undefined = ratios.iter().filter(|r| r.value.is_undefined()).count();
    log_success(format!(
        "{} ratios computed ({} undefined)",
        ratios.len(),
        undefined
    ));

    // Step 6: Summaries
    log_stage("summary", "Summarizing...");
    let summary = summarize_categories(&aggregation.line_items, &periods);
    let accounts = summarize_accounts(&classification.entries);
    let account_periods = account_period_totals(&classification.entries);
    let chart_extract = account_extract(&classification.entries);
    log_success(format!("{} accounts summarized", accounts.len()));

    Ok(LedgerReport {
        source,
        granularity: options.granularity,
        chart_name: chart.name().to_string(),
        entries: classification.entries,
        rejected: cleaned.rejected,
        blank_rows: cleaned.blank_rows,
        unclassified_accounts: classification.unclassified_accounts,
        line_items: aggregation.line_items,
        reconciliation: aggregation.reconciliation,
        statements,
        ratios,
        summary,
        accounts,
        account_periods,
        chart_extract,
    })
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{ChartFile, PrefixDef};
    use crate::models::{Category, RatioValue};
    use rust_decimal_macros::dec;

    fn chart() -> ChartOfAccounts {
        ChartOfAccounts::from_file(ChartFile {
            name: "test".into(),
            accounts: vec![],
            prefixes: vec![
                PrefixDef {
                    prefix: "6".into(),
                    category: Category::Expense,
                    subcategory: None,
                },
                PrefixDef {
                    prefix: "7".into(),
                    category: Category::Revenue,
                    subcategory: None,
                },
            ],
        })
        .unwrap()
    }

    #[test]
    fn test_run_bytes_end_to_end() {
        let sheet = "Date;Account;Label;Debit;Credit\n\
                     2023-01-10;601;Purchases;100;\n\
                     2023-02-10;701;Sales;;200\n";
        let report = run_bytes(sheet.as_bytes(), &chart(), &PipelineOptions::default()).unwrap();

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.periods(), &[Period::Year(2023)]);
        assert!(report.reconciliation.is_balanced());
        let net_margin = report.ratios.iter().find(|r| r.key == "net_margin").unwrap();
        assert_eq!(net_margin.value, RatioValue::Defined(dec!(0.5)));
    }

    #[test]
    fn test_whitespace_only_upload_is_empty_input() {
        let err = run_bytes(b"  \n\t\n", &chart(), &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput { rejected: 0 }));
    }

    #[test]
    fn test_header_only_upload_is_empty_input() {
        let err = run_bytes(
            b"Date;Account;Label;Debit;Credit\n",
            &chart(),
            &PipelineOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput { .. }));
    }

    #[test]
    fn test_schema_checked_before_stages() {
        let err = run_bytes(b"Date;Amount\n2023-01-01;5\n", &chart(), &PipelineOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_all_rows_rejected_is_empty_input() {
        let sheet = "Date;Account;Label;Debit;Credit\n2023-01-10;601;Bad;abc;\n";
        let err = run_bytes(sheet.as_bytes(), &chart(), &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput { rejected: 1 }));
    }

    #[test]
    fn test_quarter_granularity() {
        let sheet = "Date;Account;Label;Debit;Credit\n\
                     2023-01-10;701;Sales;;100\n\
                     2023-05-10;701;Sales;;150\n";
        let options = PipelineOptions {
            granularity: Granularity::Quarter,
        };
        let report = run_bytes(sheet.as_bytes(), &chart(), &options).unwrap();

        assert_eq!(report.periods().len(), 2);
        let growth = report
            .ratios
            .iter()
            .find(|r| r.key == "revenue_growth" && r.period == Period::Quarter { year: 2023, quarter: 2 })
            .unwrap();
        assert_eq!(growth.value, RatioValue::Defined(dec!(0.5)));
    }

    #[test]
    fn test_bad_row_rejected_rest_still_reported() {
        let sheet = "Date;Account;Label;Debit;Credit\n\
                     2023-01-10;601;Purchases;100;\n\
                     2023-01-11;601;Broken;abc;\n\
                     2023-02-10;701;Sales;;200\n\
                     2023-02-11;999;Suspense;5;\n";
        let report = run_bytes(sheet.as_bytes(), &chart(), &PipelineOptions::default()).unwrap();

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 3);
        assert!(report.rejected[0].reason.to_string().contains("non-numeric amount"));

        assert_eq!(report.entries.len(), 3);
        assert!(report.unclassified_accounts.contains("999"));
        assert_eq!(report.statements.unclassified.len(), 1);
        assert_eq!(report.statements.net_income(), vec![dec!(100)]);
        assert_eq!(report.reconciliation.rejected_count, 1);
        assert!(report.reconciliation.is_balanced());
    }

    #[test]
    fn test_runs_are_deterministic() {
        let sheet = "Date;Account;Label;Debit;Credit\n\
                     2023-03-10;701;Sales;;80\n\
                     2023-01-10;601;Purchases;30;\n\
                     2022-12-10;701;Sales;;50\n";
        let first = run_bytes(sheet.as_bytes(), &chart(), &PipelineOptions::default()).unwrap();
        let second = run_bytes(sheet.as_bytes(), &chart(), &PipelineOptions::default()).unwrap();

        assert_eq!(first.line_items, second.line_items);
        assert_eq!(first.ratios, second.ratios);
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.periods(), &[Period::Year(2022), Period::Year(2023)]);
    }
}
