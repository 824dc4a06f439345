//! Financial ratios computed per period from the statements.
//!
//! Every ratio is a pure function of named figures. A figure with no line
//! item behind it, a zero denominator or a missing prior period makes that one
//! ratio undefined; the others still compute.
//!
//! Balance sheet figures are closing balances, income figures are the flows
//! of the period. Unclassified entries never feed a ratio.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::{
    subcategory as sub, Category, Ratio, RatioGroup, RatioUnit, RatioValue, StatementLineItem,
    Undefined,
};

use super::statements::Statements;

/// Decimal places kept on computed ratios.
const RATIO_DP: u32 = 8;

type Formula = fn(&Figures, Option<&Figures>) -> Result<Decimal, Undefined>;

/// Static description of one ratio.
pub struct RatioDef {
    pub key: &'static str,
    pub label: &'static str,
    pub group: RatioGroup,
    pub unit: RatioUnit,
    formula: Formula,
}

/// Every ratio, in reporting order.
pub static RATIOS: &[RatioDef] = &[
    // Liquidity
    RatioDef {
        key: "current_ratio",
        label: "Current ratio",
        group: RatioGroup::Liquidity,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.current_assets()?, f.current_liabilities()?),
    },
    RatioDef {
        key: "quick_ratio",
        label: "Quick ratio",
        group: RatioGroup::Liquidity,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.quick_assets()?, f.current_liabilities()?),
    },
    RatioDef {
        key: "cash_ratio",
        label: "Cash ratio",
        group: RatioGroup::Liquidity,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.cash()?, f.current_liabilities()?),
    },
    RatioDef {
        key: "working_capital",
        label: "Working capital",
        group: RatioGroup::Liquidity,
        unit: RatioUnit::Amount,
        formula: |f, _| subtract(f.current_assets()?, f.current_liabilities()?),
    },
    // Profitability
    RatioDef {
        key: "net_margin",
        label: "Net margin",
        group: RatioGroup::Profitability,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.net_income()?, f.revenue()?),
    },
    RatioDef {
        key: "ebitda_margin",
        label: "EBITDA margin",
        group: RatioGroup::Profitability,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.ebitda()?, f.revenue()?),
    },
    RatioDef {
        key: "return_on_assets",
        label: "Return on assets",
        group: RatioGroup::Profitability,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.net_income()?, f.total_assets()?),
    },
    RatioDef {
        key: "return_on_equity",
        label: "Return on equity",
        group: RatioGroup::Profitability,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.net_income()?, f.equity()?),
    },
    // Solvency
    RatioDef {
        key: "equity_ratio",
        label: "Equity ratio",
        group: RatioGroup::Solvency,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.equity()?, f.total_assets()?),
    },
    RatioDef {
        key: "debt_to_equity",
        label: "Debt to equity",
        group: RatioGroup::Solvency,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.total_debt()?, f.equity()?),
    },
    RatioDef {
        key: "debt_to_assets",
        label: "Debt to assets",
        group: RatioGroup::Solvency,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.total_debt()?, f.total_assets()?),
    },
    RatioDef {
        key: "interest_coverage",
        label: "Interest coverage",
        group: RatioGroup::Solvency,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.ebitda()?, f.financial_expenses()?),
    },
    // Efficiency
    RatioDef {
        key: "asset_turnover",
        label: "Asset turnover",
        group: RatioGroup::Efficiency,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.revenue()?, f.total_assets()?),
    },
    RatioDef {
        key: "fixed_asset_turnover",
        label: "Fixed asset turnover",
        group: RatioGroup::Efficiency,
        unit: RatioUnit::Ratio,
        formula: |f, _| divide(f.revenue()?, f.fixed_assets()?),
    },
    // Growth
    RatioDef {
        key: "revenue_growth",
        label: "Revenue growth",
        group: RatioGroup::Growth,
        unit: RatioUnit::Ratio,
        formula: |f, prev| {
            let prev = prev.ok_or(Undefined::NoPriorPeriod)?;
            growth(f.revenue()?, prev.revenue()?)
        },
    },
    RatioDef {
        key: "net_income_growth",
        label: "Net income growth",
        group: RatioGroup::Growth,
        unit: RatioUnit::Ratio,
        formula: |f, prev| {
            let prev = prev.ok_or(Undefined::NoPriorPeriod)?;
            growth(f.net_income()?, prev.net_income()?)
        },
    },
];

/// Look a ratio definition up by key.
pub fn ratio_def(key: &str) -> Option<&'static RatioDef> {
    RATIOS.iter().find(|def| def.key == key)
}

/// `numerator / denominator`, undefined on a zero denominator or overflow.
pub fn divide(numerator: Decimal, denominator: Decimal) -> Result<Decimal, Undefined> {
    if denominator.is_zero() {
        return Err(Undefined::ZeroDenominator);
    }
    numerator
        .checked_div(denominator)
        .map(|v| v.round_dp(RATIO_DP))
        .ok_or(Undefined::Overflow)
}

/// Relative change from `previous`, measured against its magnitude so a
/// recovering loss reads as growth.
pub fn growth(current: Decimal, previous: Decimal) -> Result<Decimal, Undefined> {
    divide(subtract(current, previous)?, previous.abs())
}

fn subtract(a: Decimal, b: Decimal) -> Result<Decimal, Undefined> {
    a.checked_sub(b).ok_or(Undefined::Overflow)
}

fn add(a: Decimal, b: Decimal) -> Result<Decimal, Undefined> {
    a.checked_add(b).ok_or(Undefined::Overflow)
}

/// Named figures of one period. Only rows with a line item behind them are
/// present.
pub struct Figures<'a> {
    values: BTreeMap<(Category, &'a str), Decimal>,
}

impl<'a> Figures<'a> {
    /// Figures of the period at `index` in `statements.periods`.
    pub fn collect(statements: &'a Statements, line_items: &[StatementLineItem], index: usize) -> Self {
        let period = statements.periods[index];
        let mut values = BTreeMap::new();

        for row in &statements.balance_sheet {
            let booked = row.subcategory == sub::CURRENT_RESULT
                || line_items.iter().any(|item| {
                    item.category == row.category
                        && item.subcategory == row.subcategory
                        && item.period <= period
                });
            if booked {
                values.insert((row.category, row.subcategory.as_str()), row.values[index]);
            }
        }

        for row in &statements.income_statement {
            let booked = line_items.iter().any(|item| {
                item.category == row.category
                    && item.subcategory == row.subcategory
                    && item.period == period
            });
            if booked {
                values.insert((row.category, row.subcategory.as_str()), row.values[index]);
            }
        }

        Self { values }
    }

    /// Sum of the category's rows, restricted to `subcategories` when given.
    fn sum(
        &self,
        category: Category,
        subcategories: Option<&[&str]>,
        name: &'static str,
    ) -> Result<Decimal, Undefined> {
        let mut matched = self
            .values
            .iter()
            .filter(|((c, s), _)| *c == category && subcategories.map_or(true, |subs| subs.contains(s)))
            .map(|(_, value)| *value)
            .peekable();

        if matched.peek().is_none() {
            return Err(Undefined::MissingLineItem(name));
        }
        matched.try_fold(Decimal::ZERO, add)
    }

    pub fn cash(&self) -> Result<Decimal, Undefined> {
        self.sum(Category::Asset, Some(&[sub::CASH]), "cash")
    }

    /// Current assets less inventory. A period without inventory counts it
    /// as zero.
    pub fn quick_assets(&self) -> Result<Decimal, Undefined> {
        let inventory = or_zero(self.sum(Category::Asset, Some(&[sub::INVENTORY]), "inventory"))?;
        subtract(self.current_assets()?, inventory)
    }

    pub fn current_assets(&self) -> Result<Decimal, Undefined> {
        self.sum(Category::Asset, Some(sub::CURRENT_ASSETS), "current assets")
    }

    pub fn fixed_assets(&self) -> Result<Decimal, Undefined> {
        self.sum(Category::Asset, Some(&[sub::FIXED_ASSETS]), "fixed assets")
    }

    pub fn total_assets(&self) -> Result<Decimal, Undefined> {
        self.sum(Category::Asset, None, "total assets")
    }

    pub fn current_liabilities(&self) -> Result<Decimal, Undefined> {
        self.sum(Category::Liability, Some(&[sub::CURRENT_LIABILITIES]), "current liabilities")
    }

    pub fn total_debt(&self) -> Result<Decimal, Undefined> {
        self.sum(
            Category::Liability,
            Some(&[sub::CURRENT_LIABILITIES, sub::LONG_TERM_DEBT]),
            "debt",
        )
    }

    pub fn equity(&self) -> Result<Decimal, Undefined> {
        self.sum(Category::Equity, None, "equity")
    }

    pub fn revenue(&self) -> Result<Decimal, Undefined> {
        self.sum(Category::Revenue, None, "revenue")
    }

    pub fn expenses(&self) -> Result<Decimal, Undefined> {
        self.sum(Category::Expense, None, "expenses")
    }

    pub fn financial_expenses(&self) -> Result<Decimal, Undefined> {
        self.sum(
            Category::Expense,
            Some(&[sub::FINANCIAL_EXTRAORDINARY]),
            "financial and extraordinary expenses",
        )
    }

    pub fn net_income(&self) -> Result<Decimal, Undefined> {
        subtract(self.revenue()?, self.expenses()?)
    }

    /// Revenue less expenses other than financial and extraordinary ones.
    pub fn ebitda(&self) -> Result<Decimal, Undefined> {
        let financial = or_zero(self.financial_expenses())?;
        subtract(self.revenue()?, subtract(self.expenses()?, financial)?)
    }
}

/// Treat a figure with no line item as zero.
fn or_zero(figure: Result<Decimal, Undefined>) -> Result<Decimal, Undefined> {
    match figure {
        Err(Undefined::MissingLineItem(_)) => Ok(Decimal::ZERO),
        other => other,
    }
}

/// Compute every ratio for every period, period by period in chronological
/// order.
pub fn compute_ratios(statements: &Statements, line_items: &[StatementLineItem]) -> Vec<Ratio> {
    let figures: Vec<Figures> = (0..statements.periods.len())
        .map(|index| Figures::collect(statements, line_items, index))
        .collect();

    let mut ratios = Vec::with_capacity(figures.len() * RATIOS.len());
    for (index, current) in figures.iter().enumerate() {
        let previous = index.checked_sub(1).map(|i| &figures[i]);
        for def in RATIOS {
            ratios.push(Ratio {
                key: def.key,
                label: def.label,
                group: def.group,
                unit: def.unit,
                period: statements.periods[index],
                value: RatioValue::from((def.formula)(current, previous)),
            });
        }
    }
    ratios
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Period;
    use crate::transform::statements::build_statements;
    use rust_decimal_macros::dec;

    fn item(category: Category, subcategory: &str, year: i32, value: Decimal) -> StatementLineItem {
        StatementLineItem {
            category,
            subcategory: subcategory.into(),
            period: Period::Year(year),
            debit: Decimal::ZERO,
            credit: Decimal::ZERO,
            value,
            entry_count: 1,
        }
    }

    fn ratios_for(items: &[StatementLineItem]) -> Vec<Ratio> {
        let periods = crate::transform::aggregate::periods(items);
        let statements = build_statements(items, &periods);
        compute_ratios(&statements, items)
    }

    fn value(ratios: &[Ratio], key: &str, year: i32) -> RatioValue {
        ratios
            .iter()
            .find(|r| r.key == key && r.period == Period::Year(year))
            .map(|r| r.value.clone())
            .unwrap()
    }

    #[test]
    fn test_keys_are_unique() {
        let mut keys: Vec<_> = RATIOS.iter().map(|d| d.key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), RATIOS.len());
        assert!(ratio_def("net_margin").is_some());
        assert!(ratio_def("unknown").is_none());
    }

    #[test]
    fn test_net_margin_from_revenue_and_expense() {
        let ratios = ratios_for(&[
            item(Category::Expense, "purchases", 2023, dec!(100)),
            item(Category::Revenue, "sales", 2023, dec!(200)),
        ]);

        assert_eq!(value(&ratios, "net_margin", 2023), RatioValue::Defined(dec!(0.5)));
        assert_eq!(value(&ratios, "ebitda_margin", 2023), RatioValue::Defined(dec!(0.5)));
        assert_eq!(
            value(&ratios, "current_ratio", 2023),
            RatioValue::Undefined(Undefined::MissingLineItem("current assets"))
        );
    }

    #[test]
    fn test_zero_denominator_is_undefined() {
        let ratios = ratios_for(&[
            item(Category::Asset, sub::CASH, 2023, dec!(500)),
            item(Category::Liability, sub::CURRENT_LIABILITIES, 2023, dec!(0)),
            item(Category::Equity, sub::EQUITY, 2023, dec!(500)),
        ]);

        assert_eq!(
            value(&ratios, "current_ratio", 2023),
            RatioValue::Undefined(Undefined::ZeroDenominator)
        );
        assert_eq!(value(&ratios, "working_capital", 2023), RatioValue::Defined(dec!(500)));
        assert_eq!(value(&ratios, "equity_ratio", 2023), RatioValue::Defined(dec!(1)));
    }

    #[test]
    fn test_liquidity_ratios() {
        let ratios = ratios_for(&[
            item(Category::Asset, sub::CASH, 2023, dec!(50)),
            item(Category::Asset, sub::RECEIVABLES, 2023, dec!(30)),
            item(Category::Asset, sub::INVENTORY, 2023, dec!(20)),
            item(Category::Liability, sub::CURRENT_LIABILITIES, 2023, dec!(40)),
            item(Category::Equity, sub::EQUITY, 2023, dec!(60)),
        ]);

        assert_eq!(value(&ratios, "current_ratio", 2023), RatioValue::Defined(dec!(2.5)));
        assert_eq!(value(&ratios, "quick_ratio", 2023), RatioValue::Defined(dec!(2)));
        assert_eq!(value(&ratios, "cash_ratio", 2023), RatioValue::Defined(dec!(1.25)));
        assert_eq!(value(&ratios, "debt_to_equity", 2023).as_decimal(), Some(dec!(0.66666667)));
    }

    #[test]
    fn test_quick_ratio_keeps_prepaid_expenses() {
        let ratios = ratios_for(&[
            item(Category::Asset, sub::CASH, 2023, dec!(50)),
            item(Category::Asset, sub::RECEIVABLES, 2023, dec!(30)),
            item(Category::Asset, sub::INVENTORY, 2023, dec!(20)),
            item(Category::Asset, sub::PREPAID_EXPENSES, 2023, dec!(10)),
            item(Category::Liability, sub::CURRENT_LIABILITIES, 2023, dec!(40)),
        ]);
        // (50 + 30 + 20 + 10 - 20) / 40
        assert_eq!(value(&ratios, "quick_ratio", 2023), RatioValue::Defined(dec!(2.25)));

        // No inventory booked at all
        let ratios = ratios_for(&[
            item(Category::Asset, sub::CASH, 2023, dec!(30)),
            item(Category::Asset, sub::PREPAID_EXPENSES, 2023, dec!(10)),
            item(Category::Liability, sub::CURRENT_LIABILITIES, 2023, dec!(20)),
        ]);
        assert_eq!(value(&ratios, "quick_ratio", 2023), RatioValue::Defined(dec!(2)));
    }

    #[test]
    fn test_growth_needs_prior_period() {
        let ratios = ratios_for(&[
            item(Category::Revenue, "sales", 2023, dec!(100)),
            item(Category::Expense, "rent", 2023, dec!(40)),
            item(Category::Revenue, "sales", 2024, dec!(150)),
            item(Category::Expense, "rent", 2024, dec!(30)),
        ]);

        assert_eq!(
            value(&ratios, "revenue_growth", 2023),
            RatioValue::Undefined(Undefined::NoPriorPeriod)
        );
        assert_eq!(value(&ratios, "revenue_growth", 2024), RatioValue::Defined(dec!(0.5)));
        assert_eq!(value(&ratios, "net_income_growth", 2024), RatioValue::Defined(dec!(1)));
    }

    #[test]
    fn test_every_ratio_reported_for_every_period() {
        let ratios = ratios_for(&[
            item(Category::Revenue, "sales", 2022, dec!(1)),
            item(Category::Revenue, "sales", 2023, dec!(1)),
        ]);
        assert_eq!(ratios.len(), 2 * RATIOS.len());
    }

    #[test]
    fn test_unclassified_never_feeds_a_ratio() {
        let ratios = ratios_for(&[
            item(Category::Unclassified, sub::UNCLASSIFIED, 2023, dec!(1000)),
            item(Category::Revenue, "sales", 2023, dec!(200)),
        ]);
        assert_eq!(
            value(&ratios, "net_margin", 2023),
            RatioValue::Undefined(Undefined::MissingLineItem("expenses"))
        );
    }

    #[test]
    fn test_divide_overflow() {
        assert_eq!(divide(Decimal::MAX, dec!(0.0001)), Err(Undefined::Overflow));
        assert_eq!(divide(dec!(1), dec!(0)), Err(Undefined::ZeroDenominator));
    }
}
