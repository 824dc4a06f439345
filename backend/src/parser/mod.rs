//! Spreadsheet reader for ledger exports.
//!
//! Reads delimited-text spreadsheets (CSV, semicolon or tab separated) with
//! encoding and delimiter auto-detection, or Excel workbooks through
//! [`excel`], and returns the header row plus the raw cells of every data
//! row. Mapping cells to ledger columns lives in [`columns`].

pub mod columns;
pub mod excel;

use std::path::Path;

pub use columns::{Column, ColumnMap};

/// Spreadsheet reading error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvError {
    pub line: u64,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            _ => {
                write!(f, "Line {}: {}", self.line, self.message)
            }
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl From<csv::Error> for CsvError {
    fn from(e: csv::Error) -> Self {
        let line = e.position().map(|p| p.line()).unwrap_or(0);
        CsvError::new(line, e.to_string())
    }
}

/// One data row of the sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRow {
    /// 1-based line number in the file
    pub line: u64,
    pub cells: Vec<String>,
}

impl SourceRow {
    /// Cell at `index`, empty when the row is shorter than the header.
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Result of reading a sheet, with detection metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
    /// Detected encoding, or the workbook format
    pub encoding: String,
    /// Detected or used delimiter, `None` for workbooks
    pub delimiter: Option<char>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Invalid UTF-8 falls back to lossy decoding rather than failing the upload.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Read a decoded sheet with an explicit delimiter.
pub fn parse_str(content: &str, delimiter: char, encoding: impl Into<String>) -> Result<ParseResult, CsvError> {
    if !delimiter.is_ascii() {
        return Err(CsvError::new(0, format!("Unsupported delimiter '{}'", delimiter)));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push(SourceRow {
            line,
            cells: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(ParseResult {
        headers,
        rows,
        encoding: encoding.into(),
        delimiter: Some(delimiter),
    })
}

/// Read sheet bytes with auto-detection of encoding and delimiter.
/// Excel workbooks are recognised by their signature.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    if excel::is_workbook(bytes) {
        return excel::parse_workbook(bytes);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    parse_str(&content, delimiter, encoding)
}

/// Read a sheet file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| {
        CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e))
    })?;

    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_sheet() {
        let sheet = "Date;Account;Debit\n01.01.2023;1020;100\n02.01.2023;3200;";
        let result = parse_str(sheet, ';', "utf-8").unwrap();

        assert_eq!(result.headers, vec!["Date", "Account", "Debit"]);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].cell(1), "1020");
        assert_eq!(result.rows[1].cell(2), "");
        assert_eq!(result.rows[0].line, 2);
        assert_eq!(result.rows[1].line, 3);
    }

    #[test]
    fn test_quoted_values_with_delimiter_inside() {
        let sheet = "Label,Debit\n\"Rent, office\",\"1,200.00\"";
        let result = parse_str(sheet, ',', "utf-8").unwrap();

        assert_eq!(result.rows[0].cell(0), "Rent, office");
        assert_eq!(result.rows[0].cell(1), "1,200.00");
    }

    #[test]
    fn test_missing_trailing_cells_read_as_empty() {
        let sheet = "a;b;c\n1";
        let result = parse_str(sheet, ';', "utf-8").unwrap();

        assert_eq!(result.rows[0].cell(0), "1");
        assert_eq!(result.rows[0].cell(2), "");
    }

    #[test]
    fn test_cells_are_trimmed() {
        let sheet = "a;b\n  x ; y  ";
        let result = parse_str(sheet, ';', "utf-8").unwrap();

        assert_eq!(result.rows[0].cells, vec!["x", "y"]);
    }

    #[test]
    fn test_empty_sheet_error() {
        let err = parse_str("", ';', "utf-8").unwrap_err();
        assert!(err.message.contains("No headers"));
    }

    #[test]
    fn test_error_message_format() {
        let err = CsvError::new(5, "Invalid value")
            .with_column("Debit")
            .with_value("abc");

        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'Debit'"));
        assert!(msg.contains("value 'abc'"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_auto_parse_strips_bom() {
        let bytes = "\u{feff}Date;Account\n2023;1020".as_bytes();
        let result = parse_bytes_auto(bytes).unwrap();

        assert_eq!(result.delimiter, Some(';'));
        assert_eq!(result.headers[0], "Date");
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Crédit" in ISO-8859-1
        let bytes: &[u8] = &[0x43, 0x72, 0xE9, 0x64, 0x69, 0x74];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Crédit");
    }
}
