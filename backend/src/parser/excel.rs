//! Excel workbook reader (`.xlsx`, `.xls`).
//!
//! Every sheet with ledger columns contributes rows, re-ordered into the
//! canonical [`Column::ALL`] layout so the rest of the parser sees a single
//! sheet. Sheets named `_<account>_<name>` hold the entries of one account;
//! the account code and name come from the sheet name, and such a sheet may
//! have no header row at all (see [`ACCOUNT_SHEET_LAYOUT`]).
//!
//! Line numbers are the row numbers within each sheet.

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

use super::columns::Column;
use super::{CsvError, ParseResult, SourceRow};

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";
const OLE_SIGNATURE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Leading rows searched for a header row.
const HEADER_SEARCH_ROWS: usize = 20;

/// Cell layout of a per-account sheet without headers: date, text, an
/// unused column, counter account, code, document, debit, credit, balance.
pub const ACCOUNT_SHEET_LAYOUT: [Option<Column>; 9] = [
    Some(Column::Date),
    Some(Column::Label),
    None,
    Some(Column::CounterAccount),
    Some(Column::OriginCode),
    Some(Column::Document),
    Some(Column::Debit),
    Some(Column::Credit),
    Some(Column::Balance),
];

static ACCOUNT_SHEET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^_(\d+)_(.+)$").expect("valid sheet name regex"));

/// True when the bytes start with an xlsx (zip) or xls (OLE) signature.
pub fn is_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_SIGNATURE) || bytes.starts_with(OLE_SIGNATURE)
}

/// Read every ledger sheet of a workbook.
pub fn parse_workbook(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let format = if bytes.starts_with(OLE_SIGNATURE) { "xls" } else { "xlsx" };
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| CsvError::new(0, format!("Cannot open workbook: {}", e)))?;

    let mut rows = Vec::new();
    let mut ledger_sheets = 0;
    let mut other_headers: Option<Vec<String>> = None;

    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| CsvError::new(0, format!("Cannot read sheet '{}': {}", name, e)))?;

        match read_sheet(&name, &range) {
            SheetRead::Ledger(sheet_rows) => {
                tracing::debug!(sheet = %name, rows = sheet_rows.len(), "ledger sheet read");
                ledger_sheets += 1;
                rows.extend(sheet_rows);
            }
            SheetRead::Other(headers) => {
                tracing::debug!(sheet = %name, "no ledger columns, sheet skipped");
                other_headers.get_or_insert(headers);
            }
        }
    }

    let headers = if ledger_sheets > 0 {
        Column::ALL.iter().map(|c| c.name().to_string()).collect()
    } else {
        // Let the schema check name what is missing.
        other_headers.unwrap_or_default()
    };
    if headers.iter().all(|h: &String| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    Ok(ParseResult {
        headers,
        rows,
        encoding: format.to_string(),
        delimiter: None,
    })
}

/// What a sheet turned out to hold.
#[derive(Debug, PartialEq, Eq)]
enum SheetRead {
    /// Rows in canonical column order
    Ledger(Vec<SourceRow>),
    /// No ledger layout; the first non-empty row
    Other(Vec<String>),
}

fn read_sheet(name: &str, range: &Range<Data>) -> SheetRead {
    let first_line = range.start().map_or(1, |(row, _)| u64::from(row) + 1);
    let lines: Vec<SourceRow> = range
        .rows()
        .enumerate()
        .map(|(i, cells)| SourceRow {
            line: first_line + i as u64,
            cells: cells.iter().map(cell_text).collect(),
        })
        .collect();

    let account = ACCOUNT_SHEET.captures(name).map(|captures| {
        let account_name = captures[2].replace("___", " ").replace('_', " ");
        (captures[1].to_string(), account_name)
    });

    let header = lines.iter().take(HEADER_SEARCH_ROWS).position(|row| {
        Column::Debit.position(&row.cells).is_some() && Column::Credit.position(&row.cells).is_some()
    });

    let (layout, data): (Vec<Option<Column>>, &[SourceRow]) = match header {
        Some(index) => (header_layout(&lines[index].cells), &lines[index + 1..]),
        None if account.is_some() => (ACCOUNT_SHEET_LAYOUT.to_vec(), &lines[..]),
        None => return SheetRead::Other(first_non_empty(&lines)),
    };

    let has = |column: Column| layout.contains(&Some(column));
    let complete = Column::REQUIRED
        .iter()
        .all(|c| has(*c) || (*c == Column::Account && account.is_some()));
    if !complete {
        return SheetRead::Other(first_non_empty(&lines));
    }

    let rows = data
        .iter()
        .map(|row| {
            let mut cells: Vec<String> = Column::ALL
                .iter()
                .map(|column| {
                    layout
                        .iter()
                        .position(|c| *c == Some(*column))
                        .map(|i| row.cell(i).to_string())
                        .unwrap_or_default()
                })
                .collect();

            let blank = cells.iter().all(|c| c.is_empty());
            if let (Some((code, account_name)), false) = (&account, blank) {
                fill(&mut cells, Column::Account, code);
                fill(&mut cells, Column::AccountName, account_name);
            }
            SourceRow {
                line: row.line,
                cells,
            }
        })
        .collect();

    SheetRead::Ledger(rows)
}

/// Column of each header cell.
fn header_layout(headers: &[String]) -> Vec<Option<Column>> {
    headers
        .iter()
        .map(|header| {
            Column::ALL
                .into_iter()
                .find(|column| column.position(std::slice::from_ref(header)).is_some())
        })
        .collect()
}

fn first_non_empty(lines: &[SourceRow]) -> Vec<String> {
    lines
        .iter()
        .find(|row| row.cells.iter().any(|c| !c.is_empty()))
        .map(|row| row.cells.clone())
        .unwrap_or_default()
}

/// Set a canonical cell when the sheet left it empty.
fn fill(cells: &mut [String], column: Column, value: &str) {
    if let Some(cell) = Column::ALL
        .iter()
        .position(|c| *c == column)
        .and_then(|i| cells.get_mut(i))
    {
        if cell.is_empty() {
            *cell = value.to_string();
        }
    }
}

/// Text of a cell as the cleaning stage expects it. Dates become ISO
/// dates and whole numbers lose their `.0`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::Error(e) => e.to_string(),
    }
}
