//! Tag clean entries with a category from the chart of accounts.

use std::collections::BTreeSet;

use crate::chart::ChartOfAccounts;
use crate::models::{AccountClass, CleanEntry, ClassifiedEntry};

/// Output of the classification stage.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub entries: Vec<ClassifiedEntry>,
    /// Account codes the chart could not place
    pub unclassified_accounts: BTreeSet<String>,
}

impl Classification {
    pub fn unclassified_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.class.is_unclassified())
            .count()
    }
}

/// Classify every entry. Unknown codes go to the unclassified bucket.
pub fn classify(entries: Vec<CleanEntry>, chart: &ChartOfAccounts) -> Classification {
    let mut unclassified_accounts = BTreeSet::new();

    let entries = entries
        .into_iter()
        .map(|mut entry| {
            let class = match chart.classify(&entry.account) {
                Some(class) => class.clone(),
                None => {
                    unclassified_accounts.insert(entry.account.clone());
                    AccountClass::unclassified()
                }
            };
            if entry.account_name.is_none() {
                entry.account_name = chart.account_name(&entry.account).map(str::to_string);
            }
            ClassifiedEntry { entry, class }
        })
        .collect();

    Classification {
        entries,
        unclassified_accounts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{AccountDef, ChartFile};
    use crate::models::{Category, Origin, Period};
    use rust_decimal_macros::dec;

    fn entry(account: &str) -> CleanEntry {
        CleanEntry {
            line: 2,
            date: None,
            period: Period::Year(2023),
            account: account.into(),
            account_name: None,
            label: "Entry".into(),
            counter_account: None,
            origin_code: None,
            origin: Origin::Manual,
            document: None,
            debit: dec!(10),
            credit: dec!(0),
            vat: false,
        }
    }

    #[test]
    fn test_unknown_code_is_kept_as_unclassified() {
        let chart = ChartOfAccounts::swiss_sme();
        let result = classify(vec![entry("1020"), entry("9100")], &chart);

        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[0].category(), Category::Asset);
        assert_eq!(result.entries[1].category(), Category::Unclassified);
        assert_eq!(result.unclassified_count(), 1);
        assert!(result.unclassified_accounts.contains("9100"));
    }

    #[test]
    fn test_account_name_filled_from_chart() {
        let chart = ChartOfAccounts::from_file(ChartFile {
            name: "test".into(),
            accounts: vec![AccountDef {
                code: "601".into(),
                category: Category::Expense,
                subcategory: None,
                name: Some("Purchases".into()),
            }],
            prefixes: vec![],
        })
        .unwrap();

        let mut named = entry("601");
        named.account_name = Some("Own name".into());
        let result = classify(vec![entry("601"), named], &chart);

        assert_eq!(result.entries[0].entry.account_name.as_deref(), Some("Purchases"));
        assert_eq!(result.entries[1].entry.account_name.as_deref(), Some("Own name"));
        assert!(result.unclassified_accounts.is_empty());
    }
}
