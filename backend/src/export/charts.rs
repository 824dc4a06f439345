//! Chart data for the dashboard: breakdowns per period and one series per
//! ratio.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Category, RatioGroup, RatioUnit};
use crate::transform::LedgerReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Label/value breakdowns of one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodBreakdown {
    pub period: String,
    pub assets: Vec<ChartPoint>,
    pub liabilities_and_equity: Vec<ChartPoint>,
    pub revenue_by_account: Vec<ChartPoint>,
    pub expenses: Vec<ChartPoint>,
}

/// One ratio across periods; `None` where undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatioSeries {
    pub key: String,
    pub label: String,
    pub group: RatioGroup,
    pub unit: RatioUnit,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    pub periods: Vec<String>,
    pub breakdowns: Vec<PeriodBreakdown>,
    pub ratio_series: Vec<RatioSeries>,
}

fn points(items: impl Iterator<Item = (String, Decimal)>) -> Vec<ChartPoint> {
    items
        .filter(|(_, value)| !value.is_zero())
        .map(|(label, value)| ChartPoint {
            label,
            value: value.to_f64().unwrap_or_default(),
        })
        .collect()
}

/// Build the dashboard data of a report. Zero points are left out.
pub fn chart_data(report: &LedgerReport) -> ChartData {
    let statements = &report.statements;

    let breakdowns = statements
        .periods
        .iter()
        .enumerate()
        .map(|(index, period)| {
            let rows = move |category: Category| {
                statements
                    .balance_sheet
                    .iter()
                    .filter(move |r| r.category == category)
                    .map(move |r| (r.subcategory.clone(), r.values[index]))
            };

            let mut revenue: BTreeMap<String, Decimal> = BTreeMap::new();
            for e in report
                .entries
                .iter()
                .filter(|e| e.category() == Category::Revenue && e.entry.period == *period)
            {
                let label = match &e.entry.account_name {
                    Some(name) => format!("{} {}", e.entry.account, name),
                    None => e.entry.account.clone(),
                };
                *revenue.entry(label).or_default() += e.natural_amount();
            }

            let expenses = statements
                .income_statement
                .iter()
                .filter(|r| r.category == Category::Expense)
                .map(|r| (r.subcategory.clone(), r.values[index]));

            PeriodBreakdown {
                period: period.to_string(),
                assets: points(rows(Category::Asset)),
                liabilities_and_equity: points(rows(Category::Liability).chain(rows(Category::Equity))),
                revenue_by_account: points(revenue.into_iter()),
                expenses: points(expenses),
            }
        })
        .collect();

    let ratio_series = crate::transform::RATIOS
        .iter()
        .map(|def| RatioSeries {
            key: def.key.to_string(),
            label: def.label.to_string(),
            group: def.group,
            unit: def.unit,
            values: statements
                .periods
                .iter()
                .map(|period| {
                    report
                        .ratios
                        .iter()
                        .find(|r| r.key == def.key && r.period == *period)
                        .and_then(|r| r.value.as_decimal())
                        .and_then(|v| v.to_f64())
                })
                .collect(),
        })
        .collect();

    ChartData {
        periods: statements.periods.iter().map(|p| p.to_string()).collect(),
        breakdowns,
        ratio_series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChartOfAccounts;
    use crate::transform::pipeline::{run_bytes, PipelineOptions};

    #[test]
    fn test_chart_data_breakdowns_and_series() {
        let sheet = "Date;Account;Account name;Label;Debit;Credit\n\
                     2023-03-01;1020;Bank;Invoice;300;\n\
                     2023-03-01;3200;Sales;Invoice;;300\n\
                     2023-03-05;1100;Debtors;Cleared;0;\n";
        let report =
            run_bytes(sheet.as_bytes(), &ChartOfAccounts::swiss_sme(), &PipelineOptions::default()).unwrap();

        let data = chart_data(&report);
        assert_eq!(data.periods, vec!["2023"]);

        let breakdown = &data.breakdowns[0];
        assert_eq!(breakdown.assets, vec![ChartPoint { label: "cash".into(), value: 300.0 }]);
        assert_eq!(breakdown.revenue_by_account[0].label, "3200 Sales");
        assert!(breakdown.expenses.is_empty());

        let net_margin = data.ratio_series.iter().find(|s| s.key == "net_margin").unwrap();
        assert_eq!(net_margin.values, vec![None]);
        let asset_turnover = data.ratio_series.iter().find(|s| s.key == "asset_turnover").unwrap();
        assert_eq!(asset_turnover.values, vec![Some(1.0)]);
    }

    #[test]
    fn test_chart_data_serializes_camel_case() {
        let data = ChartData {
            periods: vec![],
            breakdowns: vec![],
            ratio_series: vec![],
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("ratioSeries").is_some());
    }
}
