//! Cleaning and validation of raw ledger rows.
//!
//! Every raw row ends up in exactly one of four places: the clean entries,
//! the rejection list (with a reason), the blank-row counter, or the
//! period-header counter. Nothing else is dropped.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::models::{parse_date, CleanEntry, Granularity, Origin, Period, RawEntry};

static ACCOUNT_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{3,10}(\.[0-9]{1,4})?$").expect("valid account code regex"));

static VAT_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(TVA|VAT|MWST)\b").expect("valid VAT regex"));

/// `Solde 01.01.2023 - 31.12.2023`, printed above the entries of a period.
static PERIOD_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:solde|balance|saldo)\s+(\d{2}\.\d{2}\.\d{4})\s*-\s*(\d{2}\.\d{2}\.\d{4})$")
        .expect("valid period header regex")
});

/// Counter-account prefixes of input tax and VAT payable accounts.
const VAT_ACCOUNT_PREFIXES: [&str; 2] = ["117", "2200"];

const EXCHANGE_COMPENSATION_LABELS: [&str; 2] = ["compensation de change", "exchange compensation"];

const OPENING_BALANCE_LABELS: [&str; 3] = ["report de solde", "opening balance", "saldovortrag"];

/// Largest absolute amount accepted in a single cell.
const MAX_AMOUNT: i64 = 1_000_000_000_000_000;

/// Why a row was excluded from the clean ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectReason {
    MissingAccountCode,
    InvalidAccountCode { value: String },
    NonNumericAmount { column: &'static str, value: String },
    AmountOutOfRange { column: &'static str, value: String },
    MissingPeriod,
    InvalidPeriod { value: String },
    PeriodTooCoarse { value: String, granularity: Granularity },
    ExchangeCompensation,
    DuplicateOpeningBalance,
}

impl RejectReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAccountCode => "missing_account_code",
            Self::InvalidAccountCode { .. } => "invalid_account_code",
            Self::NonNumericAmount { .. } => "non_numeric_amount",
            Self::AmountOutOfRange { .. } => "amount_out_of_range",
            Self::MissingPeriod => "missing_period",
            Self::InvalidPeriod { .. } => "invalid_period",
            Self::PeriodTooCoarse { .. } => "period_too_coarse",
            Self::ExchangeCompensation => "exchange_compensation",
            Self::DuplicateOpeningBalance => "duplicate_opening_balance",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingAccountCode => f.write_str("missing account code"),
            Self::InvalidAccountCode { value } => write!(f, "invalid account code '{}'", value),
            Self::NonNumericAmount { column, value } => {
                write!(f, "non-numeric amount in {}: '{}'", column, value)
            }
            Self::AmountOutOfRange { column, value } => {
                write!(f, "amount in {} out of range: '{}'", column, value)
            }
            Self::MissingPeriod => f.write_str("missing date or period"),
            Self::InvalidPeriod { value } => write!(f, "unrecognized date or period '{}'", value),
            Self::PeriodTooCoarse { value, granularity } => {
                write!(f, "period '{}' is coarser than a {}", value, granularity)
            }
            Self::ExchangeCompensation => f.write_str("exchange compensation entry excluded"),
            Self::DuplicateOpeningBalance => {
                f.write_str("opening balance already carried for this account")
            }
        }
    }
}

/// A row excluded from the clean ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub account: String,
    pub label: String,
    pub debit: String,
    pub credit: String,
    pub reason: RejectReason,
}

impl RejectedRow {
    fn new(raw: &RawEntry, reason: RejectReason) -> Self {
        Self {
            line: raw.line,
            account: raw.account.trim().to_string(),
            label: normalize_text(&raw.label),
            debit: raw.debit.trim().to_string(),
            credit: raw.credit.trim().to_string(),
            reason,
        }
    }

    fn from_entry(entry: &CleanEntry, reason: RejectReason) -> Self {
        Self {
            line: entry.line,
            account: entry.account.clone(),
            label: entry.label.clone(),
            debit: entry.debit.to_string(),
            credit: entry.credit.to_string(),
            reason,
        }
    }
}

/// Output of the cleaning stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanOutput {
    pub entries: Vec<CleanEntry>,
    pub rejected: Vec<RejectedRow>,
    /// Fully empty rows, dropped without a rejection
    pub blank_rows: usize,
    /// `Solde dd.mm.yyyy - dd.mm.yyyy` rows, read for the period start
    pub header_rows: usize,
}

/// Clean a sequence of raw rows.
///
/// A VAT row without a date inherits the date of the preceding dated row,
/// as ledger exports print tax lines under the booking they belong to.
///
/// Opening-balance rows (`Report de solde`) are dated at the start of the
/// period named by the last period header, or by their own date cell. Only
/// the earliest one per account is kept, so a balance carried into a later
/// export of the same ledger is not counted twice.
pub fn clean(raw: Vec<RawEntry>, granularity: Granularity) -> CleanOutput {
    let mut output = CleanOutput::default();
    let mut last_dated: Option<(Option<NaiveDate>, Period)> = None;
    let mut period_start: Option<NaiveDate> = None;

    for row in raw {
        if row.is_blank() {
            output.blank_rows += 1;
            continue;
        }
        if let Some(start) = period_header(&row) {
            output.header_rows += 1;
            period_start = Some(start);
            continue;
        }

        let result = if is_opening_balance(&row) {
            clean_opening_row(&row, granularity, period_start)
        } else {
            clean_row(&row, granularity, last_dated)
        };

        match result {
            Ok(entry) => {
                if entry.origin != Origin::OpeningBalance && !row.date.trim().is_empty() {
                    last_dated = Some((entry.date, entry.period));
                }
                output.entries.push(entry);
            }
            Err(reason) => output.rejected.push(RejectedRow::new(&row, reason)),
        }
    }

    drop_repeated_openings(&mut output);
    output
}

fn clean_row(
    raw: &RawEntry,
    granularity: Granularity,
    last_dated: Option<(Option<NaiveDate>, Period)>,
) -> Result<CleanEntry, RejectReason> {
    let label = normalize_text(&raw.label);

    let lowered = label.to_lowercase();
    if EXCHANGE_COMPENSATION_LABELS
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return Err(RejectReason::ExchangeCompensation);
    }

    let account = validate_account(&raw.account)?;
    let (debit, credit) = sides(
        amount(&raw.debit, "Debit")?,
        amount(&raw.credit, "Credit")?,
    );

    let counter_account = non_empty(normalize_account_code(&raw.counter_account));
    let vat = is_vat(counter_account.as_deref(), &label);

    let (date, period) = resolve_period(&raw.date, granularity)?.map_or_else(
        || match last_dated {
            Some(previous) if vat => Ok(previous),
            _ => Err(RejectReason::MissingPeriod),
        },
        Ok,
    )?;

    let origin_code = non_empty(raw.origin_code.trim().to_string());

    Ok(CleanEntry {
        line: raw.line,
        date,
        period,
        account,
        account_name: non_empty(normalize_text(&raw.account_name)),
        label,
        counter_account,
        origin: Origin::from_code(origin_code.as_deref().unwrap_or("")),
        origin_code,
        document: non_empty(raw.document.trim().to_string()),
        debit,
        credit,
        vat,
    })
}

/// An opening-balance row. Its amount comes from the debit and credit
/// cells, or from the balance cell when both are empty.
fn clean_opening_row(
    raw: &RawEntry,
    granularity: Granularity,
    period_start: Option<NaiveDate>,
) -> Result<CleanEntry, RejectReason> {
    let account = validate_account(&raw.account)?;

    let mut debit = amount(&raw.debit, "Debit")?;
    let mut credit = amount(&raw.credit, "Credit")?;
    if debit.is_zero() && credit.is_zero() {
        debit = amount(&raw.balance, "Balance")?;
    }
    let (debit, credit) = sides(debit, credit);

    let date = period_start
        .or_else(|| parse_date(raw.date.trim()))
        .ok_or(RejectReason::MissingPeriod)?;

    let label = match normalize_text(&raw.label) {
        label if label.is_empty() => normalize_text(&raw.date),
        label => label,
    };

    Ok(CleanEntry {
        line: raw.line,
        date: Some(date),
        period: Period::from_date(date, granularity),
        account,
        account_name: non_empty(normalize_text(&raw.account_name)),
        label,
        counter_account: None,
        origin_code: non_empty(raw.origin_code.trim().to_string()),
        origin: Origin::OpeningBalance,
        document: non_empty(raw.document.trim().to_string()),
        debit,
        credit,
        vat: false,
    })
}

fn validate_account(value: &str) -> Result<String, RejectReason> {
    let account = normalize_account_code(value);
    if account.is_empty() {
        return Err(RejectReason::MissingAccountCode);
    }
    if !ACCOUNT_CODE.is_match(&account) {
        return Err(RejectReason::InvalidAccountCode {
            value: value.trim().to_string(),
        });
    }
    Ok(account)
}

/// Parse one amount cell, bounded by [`MAX_AMOUNT`].
fn amount(value: &str, column: &'static str) -> Result<Decimal, RejectReason> {
    let parsed = parse_amount(value).ok_or_else(|| RejectReason::NonNumericAmount {
        column,
        value: value.trim().to_string(),
    })?;
    if parsed.abs() > Decimal::from(MAX_AMOUNT) {
        return Err(RejectReason::AmountOutOfRange {
            column,
            value: value.trim().to_string(),
        });
    }
    Ok(parsed)
}

/// Move negative amounts to the opposite side. Both inputs are bounded by
/// [`MAX_AMOUNT`], so the sums stay in range.
fn sides(debit: Decimal, credit: Decimal) -> (Decimal, Decimal) {
    (
        debit.max(Decimal::ZERO) + (-credit).max(Decimal::ZERO),
        credit.max(Decimal::ZERO) + (-debit).max(Decimal::ZERO),
    )
}

/// Start date of a `Solde dd.mm.yyyy - dd.mm.yyyy` header row.
fn period_header(raw: &RawEntry) -> Option<NaiveDate> {
    [&raw.date, &raw.label, &raw.account_name, &raw.account]
        .iter()
        .find_map(|cell| {
            let captures = PERIOD_HEADER.captures(cell.trim())?;
            NaiveDate::parse_from_str(&captures[1], "%d.%m.%Y").ok()
        })
}

fn is_opening_balance(raw: &RawEntry) -> bool {
    [&raw.date, &raw.label].iter().any(|cell| {
        let lowered = normalize_text(cell).to_lowercase();
        OPENING_BALANCE_LABELS
            .iter()
            .any(|label| lowered.starts_with(label))
    })
}

/// Keep the earliest opening balance of each account and reject the rest.
fn drop_repeated_openings(output: &mut CleanOutput) {
    let mut earliest: HashMap<String, (Option<NaiveDate>, u64)> = HashMap::new();
    for entry in output
        .entries
        .iter()
        .filter(|e| e.origin == Origin::OpeningBalance)
    {
        let key = (entry.date, entry.line);
        earliest
            .entry(entry.account.clone())
            .and_modify(|k| *k = (*k).min(key))
            .or_insert(key);
    }

    let (kept, repeated): (Vec<CleanEntry>, Vec<CleanEntry>) = std::mem::take(&mut output.entries)
        .into_iter()
        .partition(|e| {
            e.origin != Origin::OpeningBalance
                || earliest.get(&e.account) == Some(&(e.date, e.line))
        });

    output.entries = kept;
    if !repeated.is_empty() {
        output.rejected.extend(
            repeated
                .iter()
                .map(|e| RejectedRow::from_entry(e, RejectReason::DuplicateOpeningBalance)),
        );
        output.rejected.sort_by_key(|r| r.line);
    }
}

/// Resolve the date cell. `Ok(None)` means the cell is empty.
///
/// A period label coarser than the run granularity (`2023` in a monthly
/// run) is rejected, as it cannot be placed in any single period column.
fn resolve_period(
    value: &str,
    granularity: Granularity,
) -> Result<Option<(Option<NaiveDate>, Period)>, RejectReason> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Some(date) = parse_date(value) {
        return Ok(Some((Some(date), Period::from_date(date, granularity))));
    }
    if let Some(period) = Period::parse_label(value) {
        if period.granularity() < granularity {
            return Err(RejectReason::PeriodTooCoarse {
                value: value.to_string(),
                granularity,
            });
        }
        return Ok(Some((None, period.coarsen(granularity))));
    }
    Err(RejectReason::InvalidPeriod {
        value: value.to_string(),
    })
}

/// Trim and collapse internal whitespace.
pub fn normalize_text(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip spaces and the `.0` suffix spreadsheet tools add to numeric codes.
pub fn normalize_account_code(value: &str) -> String {
    let code: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    match code.strip_suffix(".0") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => code,
    }
}

/// Parse an amount cell. Empty cells are zero; `None` means non-numeric.
///
/// Accepts thousands separators (`'`, `’`, spaces), a decimal comma, and
/// accounting parentheses for negatives.
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let mut s: String = value
        .chars()
        .filter(|c| !matches!(c, '\'' | '’' | '\u{a0}' | '\u{202f}') && !c.is_whitespace())
        .collect();

    if s.is_empty() || s == "-" {
        return Some(Decimal::ZERO);
    }

    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = s[1..s.len() - 1].to_string();
    }

    s = match (s.rfind(','), s.rfind('.')) {
        // 1.234,56
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        // 1,234.56
        (Some(_), Some(_)) => s.replace(',', ""),
        // 12,5 or 1,234,567
        (Some(_), None) if s.matches(',').count() == 1 => s.replace(',', "."),
        (Some(_), None) => s.replace(',', ""),
        _ => s,
    };

    if !s.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let amount = Decimal::from_str(&s).ok()?;
    Some(if negative { -amount } else { amount })
}

fn is_vat(counter_account: Option<&str>, label: &str) -> bool {
    let vat_account = counter_account.is_some_and(|code| {
        VAT_ACCOUNT_PREFIXES
            .iter()
            .any(|prefix| code.starts_with(prefix))
    });
    vat_account || VAT_LABEL.is_match(label)
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
