//! Header resolution: map spreadsheet headers to ledger columns.
//!
//! General-ledger exports name their columns differently depending on the
//! accounting package and the language (`Débit`, `Soll`, `Debit`, ...).
//! Headers are compared after lowercasing, stripping accents and collapsing
//! separators, then matched against a list of aliases per column.

use crate::error::PipelineError;
use crate::models::RawEntry;

use super::SourceRow;

/// A ledger column the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Date,
    Account,
    AccountName,
    Label,
    CounterAccount,
    OriginCode,
    Document,
    Debit,
    Credit,
    Balance,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Self::Date,
        Self::Account,
        Self::AccountName,
        Self::Label,
        Self::CounterAccount,
        Self::OriginCode,
        Self::Document,
        Self::Debit,
        Self::Credit,
        Self::Balance,
    ];

    /// Columns an upload must provide.
    pub const REQUIRED: [Column; 5] = [
        Self::Date,
        Self::Account,
        Self::Label,
        Self::Debit,
        Self::Credit,
    ];

    /// Canonical header name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::Account => "Account",
            Self::AccountName => "Account name",
            Self::Label => "Label",
            Self::CounterAccount => "Counter account",
            Self::OriginCode => "Code",
            Self::Document => "Document",
            Self::Debit => "Debit",
            Self::Credit => "Credit",
            Self::Balance => "Balance",
        }
    }

    /// Normalized header spellings accepted for this column.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Date => &["date", "period", "periode", "booking date", "datum", "valuta"],
            Self::Account => &[
                "account",
                "compte",
                "account number",
                "account code",
                "account no",
                "numero de compte",
                "no compte",
                "konto",
            ],
            Self::AccountName => &["account name", "nom de compte", "account label", "kontoname"],
            Self::Label => &[
                "label",
                "text",
                "texte",
                "description",
                "libelle",
                "narration",
                "buchungstext",
            ],
            Self::CounterAccount => &[
                "counter account",
                "contra account",
                "contre ecr",
                "contre ecriture",
                "contrepartie",
                "gegenkonto",
            ],
            Self::OriginCode => &["code", "origin code", "source code"],
            Self::Document => &["document", "doc", "piece", "reference", "ref", "beleg"],
            Self::Debit => &["debit", "debit amount", "soll"],
            Self::Credit => &["credit", "credit amount", "haben"],
            Self::Balance => &["balance", "solde", "saldo"],
        }
    }

    /// Position of this column among `headers`.
    pub fn position(&self, headers: &[String]) -> Option<usize> {
        headers
            .iter()
            .position(|h| self.aliases().contains(&normalize_header(h).as_str()))
    }
}

/// Lowercase, strip accents and collapse punctuation so that
/// `"Contre écr."` and `"contre_ecr"` compare equal.
fn normalize_header(header: &str) -> String {
    let folded: String = header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' | 'á' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' => 'i',
            'ô' | 'ö' | 'ó' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ç' => 'c',
            '_' | '.' | '-' | '/' | '°' => ' ',
            other => other,
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Column positions resolved from a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    indices: [Option<usize>; Column::ALL.len()],
}

impl ColumnMap {
    /// Resolve headers, failing with a schema mismatch naming every
    /// required column that could not be found.
    pub fn resolve(headers: &[String]) -> Result<Self, PipelineError> {
        let mut indices = [None; Column::ALL.len()];
        for (slot, column) in indices.iter_mut().zip(Column::ALL) {
            *slot = column.position(headers);
        }

        let map = Self { indices };
        let missing: Vec<String> = Column::REQUIRED
            .iter()
            .filter(|c| map.index(**c).is_none())
            .map(|c| c.name().to_string())
            .collect();

        if missing.is_empty() {
            Ok(map)
        } else {
            Err(PipelineError::SchemaMismatch {
                missing,
                found: headers.to_vec(),
            })
        }
    }

    /// Position of `column` in the sheet, if present.
    pub fn index(&self, column: Column) -> Option<usize> {
        let slot = Column::ALL.iter().position(|c| *c == column)?;
        self.indices[slot]
    }

    fn cell(&self, row: &SourceRow, column: Column) -> String {
        self.index(column)
            .map(|i| row.cell(i).to_string())
            .unwrap_or_default()
    }

    /// Build the typed raw entry for one sheet row.
    pub fn raw_entry(&self, row: &SourceRow) -> RawEntry {
        RawEntry {
            line: row.line,
            date: self.cell(row, Column::Date),
            account: self.cell(row, Column::Account),
            account_name: self.cell(row, Column::AccountName),
            label: self.cell(row, Column::Label),
            counter_account: self.cell(row, Column::CounterAccount),
            origin_code: self.cell(row, Column::OriginCode),
            document: self.cell(row, Column::Document),
            debit: self.cell(row, Column::Debit),
            credit: self.cell(row, Column::Credit),
            balance: self.cell(row, Column::Balance),
        }
    }

    pub fn raw_entries(&self, rows: &[SourceRow]) -> Vec<RawEntry> {
        rows.iter().map(|row| self.raw_entry(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_english_headers() {
        let map = ColumnMap::resolve(&headers(&["Date", "Account", "Label", "Debit", "Credit"])).unwrap();
        assert_eq!(map.index(Column::Date), Some(0));
        assert_eq!(map.index(Column::Credit), Some(4));
        assert_eq!(map.index(Column::Document), None);
    }

    #[test]
    fn test_resolve_french_export_headers() {
        let map = ColumnMap::resolve(&headers(&[
            "Date",
            "Texte",
            "Compte",
            "Contre écr.",
            "Code",
            "Document",
            "Débit",
            "Crédit",
            "Solde",
        ]))
        .unwrap();

        assert_eq!(map.index(Column::Label), Some(1));
        assert_eq!(map.index(Column::Account), Some(2));
        assert_eq!(map.index(Column::CounterAccount), Some(3));
        assert_eq!(map.index(Column::OriginCode), Some(4));
        assert_eq!(map.index(Column::Debit), Some(6));
        assert_eq!(map.index(Column::Credit), Some(7));
        assert_eq!(map.index(Column::Balance), Some(8));
    }

    #[test]
    fn test_missing_columns_are_all_named() {
        let err = ColumnMap::resolve(&headers(&["Date", "Account", "Amount"])).unwrap_err();
        match err {
            PipelineError::SchemaMismatch { missing, .. } => {
                assert_eq!(missing, vec!["Label", "Debit", "Credit"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_raw_entry_from_row() {
        let map = ColumnMap::resolve(&headers(&["Account", "Date", "Label", "Debit", "Credit"])).unwrap();
        let row = SourceRow {
            line: 7,
            cells: vec!["601".into(), "2023-03-01".into(), "Rent".into(), "100".into()],
        };

        let raw = map.raw_entry(&row);
        assert_eq!(raw.line, 7);
        assert_eq!(raw.account, "601");
        assert_eq!(raw.date, "2023-03-01");
        assert_eq!(raw.debit, "100");
        assert_eq!(raw.credit, "");
        assert_eq!(raw.document, "");
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Contre_Écr. "), "contre ecr");
        assert_eq!(normalize_header("N° compte"), "n compte");
    }
}
