//! Chart of accounts - maps account codes to categories.
//!
//! A chart holds exact account entries and prefix rules. Lookup tries the
//! exact code first, then the longest matching prefix. Codes matching
//! neither are left to the caller to tag as unclassified.
//!
//! The built-in chart follows the Swiss SME numbering used by the ledgers
//! this tool was written for (`1` assets, `2` liabilities and equity, `3`
//! revenue, `4`-`8` expenses, `9` closing accounts left unclassified).
//! Custom charts are JSON files:
//!
//! ```json
//! {
//!   "name": "French PCG extract",
//!   "accounts": [{ "code": "601", "category": "expense", "name": "Purchases" }],
//!   "prefixes": [{ "prefix": "7", "category": "revenue", "subcategory": "sales" }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{ChartError, ChartResult};
use crate::models::{subcategory as sub, AccountClass, Category};

/// Name of the built-in chart
pub const DEFAULT_CHART_NAME: &str = "Swiss SME chart of accounts";

/// Serialized chart file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub accounts: Vec<AccountDef>,
    #[serde(default)]
    pub prefixes: Vec<PrefixDef>,
}

/// An exact account entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountDef {
    pub code: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A rule matching every code starting with `prefix`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixDef {
    pub prefix: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AccountInfo {
    class: AccountClass,
    name: Option<String>,
}

/// Read-only mapping from account code to classification.
#[derive(Debug, Clone)]
pub struct ChartOfAccounts {
    name: String,
    accounts: BTreeMap<String, AccountInfo>,
    /// Sorted longest prefix first
    prefixes: Vec<(String, AccountClass)>,
}

impl ChartOfAccounts {
    /// The built-in Swiss SME chart.
    pub fn swiss_sme() -> Self {
        let rules: &[(&[&str], Category, &str)] = &[
            (&["10"], Category::Asset, sub::CASH),
            (&["11"], Category::Asset, sub::RECEIVABLES),
            (&["12"], Category::Asset, sub::INVENTORY),
            (&["13"], Category::Asset, sub::PREPAID_EXPENSES),
            (&["14"], Category::Asset, sub::FINANCIAL_ASSETS),
            (&["15", "16", "17", "18"], Category::Asset, sub::FIXED_ASSETS),
            (&["1"], Category::Asset, sub::OTHER_ASSETS),
            (&["20", "21", "22", "23"], Category::Liability, sub::CURRENT_LIABILITIES),
            (&["24", "25", "27"], Category::Liability, sub::LONG_TERM_DEBT),
            (&["26"], Category::Liability, sub::PROVISIONS),
            (&["28", "29"], Category::Equity, sub::EQUITY),
            (&["2"], Category::Liability, sub::OTHER_LIABILITIES),
            (&["3"], Category::Revenue, sub::OPERATING_REVENUE),
            (&["4"], Category::Expense, sub::DIRECT_COSTS),
            (&["5"], Category::Expense, sub::PERSONNEL),
            (&["6"], Category::Expense, sub::OPERATING_EXPENSES),
            (&["7"], Category::Expense, sub::ANCILLARY),
            (&["8"], Category::Expense, sub::FINANCIAL_EXTRAORDINARY),
        ];

        let prefixes = rules
            .iter()
            .flat_map(|(prefixes, category, subcategory)| {
                prefixes.iter().map(move |p| PrefixDef {
                    prefix: p.to_string(),
                    category: *category,
                    subcategory: Some(subcategory.to_string()),
                })
            })
            .collect();

        let file = ChartFile {
            name: DEFAULT_CHART_NAME.to_string(),
            accounts: Vec::new(),
            prefixes,
        };

        // The table above is static and well-formed.
        Self::build(file)
    }

    /// Build a chart from its file representation, validating every entry.
    pub fn from_file(file: ChartFile) -> ChartResult<Self> {
        if file.accounts.is_empty() && file.prefixes.is_empty() {
            return Err(ChartError::Empty);
        }

        for account in &file.accounts {
            validate_code(&account.code, category_is_assignable(account.category))?;
        }
        for rule in &file.prefixes {
            validate_code(&rule.prefix, category_is_assignable(rule.category))?;
        }

        Ok(Self::build(file))
    }

    fn build(file: ChartFile) -> Self {
        let class_of = |category: Category, subcategory: Option<String>| {
            AccountClass::new(
                category,
                subcategory
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| sub::GENERAL.to_string()),
            )
        };

        let accounts = file
            .accounts
            .into_iter()
            .map(|a| {
                let info = AccountInfo {
                    class: class_of(a.category, a.subcategory),
                    name: a.name.filter(|n| !n.trim().is_empty()),
                };
                (a.code.trim().to_string(), info)
            })
            .collect();

        let mut prefixes: Vec<(String, AccountClass)> = file
            .prefixes
            .into_iter()
            .map(|p| (p.prefix.trim().to_string(), class_of(p.category, p.subcategory)))
            .collect();
        // Longest first; ties keep file order.
        prefixes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let name = if file.name.trim().is_empty() {
            "Custom chart of accounts".to_string()
        } else {
            file.name
        };

        Self {
            name,
            accounts,
            prefixes,
        }
    }

    /// Parse a chart from JSON text.
    pub fn from_json(json: &str) -> ChartResult<Self> {
        let file: ChartFile = serde_json::from_str(json)?;
        Self::from_file(file)
    }

    /// Load a chart from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> ChartResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ChartError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// File representation, e.g. to export the built-in chart as a template.
    pub fn to_file(&self) -> ChartFile {
        ChartFile {
            name: self.name.clone(),
            accounts: self
                .accounts
                .iter()
                .map(|(code, info)| AccountDef {
                    code: code.clone(),
                    category: info.class.category,
                    subcategory: Some(info.class.subcategory.clone()),
                    name: info.name.clone(),
                })
                .collect(),
            prefixes: self
                .prefixes
                .iter()
                .map(|(prefix, class)| PrefixDef {
                    prefix: prefix.clone(),
                    category: class.category,
                    subcategory: Some(class.subcategory.clone()),
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.prefixes.is_empty()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn prefix_count(&self) -> usize {
        self.prefixes.len()
    }

    /// Classification for `code`: exact entry, then longest prefix.
    pub fn classify(&self, code: &str) -> Option<&AccountClass> {
        if let Some(info) = self.accounts.get(code) {
            return Some(&info.class);
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| code.starts_with(prefix.as_str()))
            .map(|(_, class)| class)
    }

    /// Name registered for an exact account code.
    pub fn account_name(&self, code: &str) -> Option<&str> {
        self.accounts.get(code).and_then(|info| info.name.as_deref())
    }
}

impl Default for ChartOfAccounts {
    fn default() -> Self {
        Self::swiss_sme()
    }
}

/// Unclassified is the fallback bucket, never an explicit mapping.
fn category_is_assignable(category: Category) -> Result<(), &'static str> {
    if category == Category::Unclassified {
        Err("category 'unclassified' cannot be assigned explicitly")
    } else {
        Ok(())
    }
}

fn validate_code(code: &str, assignable: Result<(), &'static str>) -> ChartResult<()> {
    let trimmed = code.trim();
    let invalid = |message: &str| ChartError::InvalidEntry {
        code: code.to_string(),
        message: message.to_string(),
    };

    if trimmed.is_empty() {
        return Err(invalid("empty code"));
    }
    if !trimmed.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(invalid("codes must be numeric"));
    }
    assignable.map_err(invalid)
}
