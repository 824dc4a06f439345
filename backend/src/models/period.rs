//! Accounting periods and date parsing.
//!
//! Ledger exports carry either a booking date (`31.12.2023`, `2023-12-31`, ...)
//! or a period label (`2023`, `2023-Q4`, `2023-12`). Both resolve to a
//! [`Period`] at the run's [`Granularity`].

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Date formats accepted in the date column, tried in order.
///
/// `%Y` also reads a two-digit year (`15.03.23` as year 23), so a match is
/// only kept when its year lies in [`YEARS`]; the `%y` forms then apply.
const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d", "%d/%m/%Y", "%d.%m.%y", "%d/%m/%y"];

/// Years a ledger date or period label may fall in.
const YEARS: std::ops::RangeInclusive<i32> = 1900..=2999;

/// Resolution at which entries are grouped into periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Year,
    Quarter,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Quarter => "quarter",
            Self::Month => "month",
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "year" | "yearly" | "annual" | "y" => Ok(Self::Year),
            "quarter" | "quarterly" | "q" => Ok(Self::Quarter),
            "month" | "monthly" | "m" => Ok(Self::Month),
            other => Err(format!(
                "unknown granularity '{}' (expected year, quarter or month)",
                other
            )),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reporting period.
///
/// Periods order chronologically by year first, so `2023-Q4 < 2024`.
/// Within a single year a whole-year period sorts before its quarters and
/// months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Year(i32),
    Quarter { year: i32, quarter: u8 },
    Month { year: i32, month: u8 },
}

impl Period {
    /// Period containing `date` at the given granularity.
    pub fn from_date(date: NaiveDate, granularity: Granularity) -> Self {
        let year = date.year();
        let month = date.month() as u8;
        match granularity {
            Granularity::Year => Self::Year(year),
            Granularity::Quarter => Self::Quarter {
                year,
                quarter: (month - 1) / 3 + 1,
            },
            Granularity::Month => Self::Month { year, month },
        }
    }

    /// Parse a period label: `2023`, `2023-Q1` / `Q1 2023`, `2023-05` / `05.2023`.
    pub fn parse_label(label: &str) -> Option<Self> {
        let s = label.trim().to_uppercase();
        let valid_year = |y: i32| YEARS.contains(&y);

        if s.len() == 4 {
            let year: i32 = s.parse().ok()?;
            return valid_year(year).then_some(Self::Year(year));
        }

        if let Some((a, b)) = s.split_once(['-', ' ', '/', '.']) {
            let (a, b) = (a.trim(), b.trim());

            let quarter = |q: &str| -> Option<u8> {
                let n: u8 = q.strip_prefix('Q')?.parse().ok()?;
                (1..=4).contains(&n).then_some(n)
            };
            if let (Ok(year), Some(quarter)) = (a.parse::<i32>(), quarter(b)) {
                return valid_year(year).then_some(Self::Quarter { year, quarter });
            }
            if let (Some(quarter), Ok(year)) = (quarter(a), b.parse::<i32>()) {
                return valid_year(year).then_some(Self::Quarter { year, quarter });
            }

            let month = |m: &str| -> Option<u8> {
                if m.len() > 2 {
                    return None;
                }
                let n: u8 = m.parse().ok()?;
                (1..=12).contains(&n).then_some(n)
            };
            if a.len() == 4 {
                if let (Ok(year), Some(month)) = (a.parse::<i32>(), month(b)) {
                    return valid_year(year).then_some(Self::Month { year, month });
                }
            }
            if b.len() == 4 {
                if let (Some(month), Ok(year)) = (month(a), b.parse::<i32>()) {
                    return valid_year(year).then_some(Self::Month { year, month });
                }
            }
        }

        None
    }

    /// Coarsen a period to `granularity`. Periods already coarser are kept.
    pub fn coarsen(self, granularity: Granularity) -> Self {
        match (self, granularity) {
            (Self::Month { year, .. }, Granularity::Year)
            | (Self::Quarter { year, .. }, Granularity::Year) => Self::Year(year),
            (Self::Month { year, month }, Granularity::Quarter) => Self::Quarter {
                year,
                quarter: (month - 1) / 3 + 1,
            },
            (p, _) => p,
        }
    }

    /// Resolution of this period.
    pub fn granularity(&self) -> Granularity {
        match self {
            Self::Year(_) => Granularity::Year,
            Self::Quarter { .. } => Granularity::Quarter,
            Self::Month { .. } => Granularity::Month,
        }
    }

    pub fn year(&self) -> i32 {
        match *self {
            Self::Year(year) | Self::Quarter { year, .. } | Self::Month { year, .. } => year,
        }
    }

    fn sort_key(&self) -> (i32, u8, u8) {
        match *self {
            Self::Year(year) => (year, 0, 0),
            Self::Quarter { year, quarter } => (year, 1, quarter),
            Self::Month { year, month } => (year, 2, month),
        }
    }
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{}", year),
            Self::Quarter { year, quarter } => write!(f, "{}-Q{}", year, quarter),
            Self::Month { year, month } => write!(f, "{}-{:02}", year, month),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parse a booking date in any of the supported export formats.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let in_range = |date: &NaiveDate| YEARS.contains(&date.year());

    if let Some(date) = DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .find(in_range)
    {
        return Some(date);
    }

    // Spreadsheet tools often export dates as timestamps at midnight.
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d.%m.%Y %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| dt.date())
        .filter(in_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("31.12.2023"), Some(date(2023, 12, 31)));
        assert_eq!(parse_date("2023-12-31"), Some(date(2023, 12, 31)));
        assert_eq!(parse_date("31/12/2023"), Some(date(2023, 12, 31)));
        assert_eq!(parse_date("2023-12-31 00:00:00"), Some(date(2023, 12, 31)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_two_digit_years() {
        assert_eq!(parse_date("15.03.23"), Some(date(2023, 3, 15)));
        assert_eq!(parse_date("15/03/23"), Some(date(2023, 3, 15)));
        assert_eq!(parse_date("23-03-15"), None);
        assert_eq!(parse_date("01.01.0023"), None);
    }

    #[test]
    fn test_from_date_granularity() {
        let d = date(2023, 5, 17);
        assert_eq!(Period::from_date(d, Granularity::Year), Period::Year(2023));
        assert_eq!(
            Period::from_date(d, Granularity::Quarter),
            Period::Quarter { year: 2023, quarter: 2 }
        );
        assert_eq!(
            Period::from_date(d, Granularity::Month),
            Period::Month { year: 2023, month: 5 }
        );
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(Period::parse_label("2023"), Some(Period::Year(2023)));
        assert_eq!(
            Period::parse_label("2023-Q3"),
            Some(Period::Quarter { year: 2023, quarter: 3 })
        );
        assert_eq!(
            Period::parse_label("q1 2024"),
            Some(Period::Quarter { year: 2024, quarter: 1 })
        );
        assert_eq!(
            Period::parse_label("2023-05"),
            Some(Period::Month { year: 2023, month: 5 })
        );
        assert_eq!(
            Period::parse_label("05.2023"),
            Some(Period::Month { year: 2023, month: 5 })
        );
        assert_eq!(Period::parse_label("2023-Q5"), None);
        assert_eq!(Period::parse_label("2023-13"), None);
        assert_eq!(Period::parse_label("abcd"), None);
    }

    #[test]
    fn test_ordering_is_chronological() {
        let mut periods = vec![
            Period::Year(2024),
            Period::Quarter { year: 2023, quarter: 4 },
            Period::Year(2023),
            Period::Quarter { year: 2023, quarter: 1 },
        ];
        periods.sort();
        assert_eq!(
            periods,
            vec![
                Period::Year(2023),
                Period::Quarter { year: 2023, quarter: 1 },
                Period::Quarter { year: 2023, quarter: 4 },
                Period::Year(2024),
            ]
        );
    }

    #[test]
    fn test_coarsen_and_display() {
        let month = Period::Month { year: 2023, month: 11 };
        assert_eq!(month.coarsen(Granularity::Quarter).to_string(), "2023-Q4");
        assert_eq!(month.coarsen(Granularity::Year).to_string(), "2023");
        assert_eq!(Period::Year(2023).coarsen(Granularity::Month), Period::Year(2023));
        assert_eq!(month.to_string(), "2023-11");
        assert_eq!(month.granularity(), Granularity::Month);
        assert!(Period::Year(2023).granularity() < Granularity::Month);
    }

    #[test]
    fn test_granularity_from_str() {
        assert_eq!("Quarterly".parse::<Granularity>(), Ok(Granularity::Quarter));
        assert!("weekly".parse::<Granularity>().is_err());
    }
}
