//! Group classified entries into statement line items.
//!
//! Line items are keyed by (category, subcategory, period) and come out in
//! that order. The totals are reconciled against the entries they were built
//! from before anything downstream sees them.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Category, ClassifiedEntry, Period, StatementLineItem};

/// Control totals proving line items add up to the clean ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub entry_count: usize,
    pub rejected_count: usize,
    pub entry_debit: Decimal,
    pub entry_credit: Decimal,
    pub entry_value: Decimal,
    pub line_debit: Decimal,
    pub line_credit: Decimal,
    pub line_value: Decimal,
}

impl Reconciliation {
    pub fn is_balanced(&self) -> bool {
        self.entry_debit == self.line_debit
            && self.entry_credit == self.line_credit
            && self.entry_value == self.line_value
    }

    /// First measure that does not reconcile.
    fn check(&self) -> PipelineResult<()> {
        let measures = [
            ("debit", self.entry_debit, self.line_debit),
            ("credit", self.entry_credit, self.line_credit),
            ("value", self.entry_value, self.line_value),
        ];
        for (measure, expected, actual) in measures {
            if expected != actual {
                return Err(PipelineError::Reconciliation {
                    measure,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}

/// Output of the aggregation stage.
#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub line_items: Vec<StatementLineItem>,
    pub reconciliation: Reconciliation,
}

#[derive(Default)]
struct Bucket {
    debit: Decimal,
    credit: Decimal,
    value: Decimal,
    entry_count: usize,
}

/// Sum entries per (category, subcategory, period).
///
/// Fails with [`PipelineError::Reconciliation`] when the line items do not
/// add up to the entries.
pub fn aggregate(entries: &[ClassifiedEntry]) -> PipelineResult<Aggregation> {
    let mut buckets: BTreeMap<(Category, &str, Period), Bucket> = BTreeMap::new();
    let mut reconciliation = Reconciliation {
        entry_count: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        let value = entry.natural_amount();
        reconciliation.entry_debit += entry.entry.debit;
        reconciliation.entry_credit += entry.entry.credit;
        reconciliation.entry_value += value;

        let bucket = buckets
            .entry((entry.category(), entry.class.subcategory.as_str(), entry.entry.period))
            .or_default();
        bucket.debit += entry.entry.debit;
        bucket.credit += entry.entry.credit;
        bucket.value += value;
        bucket.entry_count += 1;
    }

    let line_items: Vec<StatementLineItem> = buckets
        .into_iter()
        .map(|((category, subcategory, period), bucket)| StatementLineItem {
            category,
            subcategory: subcategory.to_string(),
            period,
            debit: bucket.debit,
            credit: bucket.credit,
            value: bucket.value,
            entry_count: bucket.entry_count,
        })
        .collect();

    for item in &line_items {
        reconciliation.line_debit += item.debit;
        reconciliation.line_credit += item.credit;
        reconciliation.line_value += item.value;
    }
    reconciliation.check()?;

    Ok(Aggregation {
        line_items,
        reconciliation,
    })
}

/// Distinct periods of a set of line items, in chronological order.
pub fn periods(line_items: &[StatementLineItem]) -> Vec<Period> {
    let mut periods: Vec<Period> = line_items.iter().map(|item| item.period).collect();
    periods.sort();
    periods.dedup();
    periods
}
