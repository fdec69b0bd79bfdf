//! Tenant keys, tax periods, and the canonical currency-cleanup rule.

use crate::error::CoreError;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Newtype for the taxpayer identifier (RUT) used to key sessions.
///
/// Construction normalizes the value by stripping `.` and `-` separators,
/// so `"12.345.678-9"` and `"123456789"` are the same tenant key. The
/// check digit `K` is uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rut(String);

impl Rut {
    /// Create a new `Rut`, normalizing separators.
    ///
    /// # Errors
    /// Returns error if, after normalization, the value is not digits with
    /// an optional trailing check digit.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, CoreError> {
        static RUT_REGEX: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^[0-9]{6,9}[0-9K]$").expect("valid regex"));

        let normalized: String = raw
            .as_ref()
            .chars()
            .filter(|c| *c != '.' && *c != '-' && !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if RUT_REGEX.is_match(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(CoreError::Validation(format!(
                "invalid RUT: expected digits plus check digit, got '{}'",
                raw.as_ref()
            )))
        }
    }

    /// Get the normalized value (no separators).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monthly tax period (`YYYY-MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    /// Calendar year
    pub year: i32,
    /// Calendar month, 1-12
    pub month: u32,
}

impl Period {
    /// Create a new period.
    ///
    /// # Errors
    /// Returns error if the month is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, CoreError> {
        if (1..=12).contains(&month) {
            Ok(Self { year, month })
        } else {
            Err(CoreError::Validation(format!(
                "invalid period month: {month}"
            )))
        }
    }

    /// The period containing the given date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a `"YYYY-MM"` label.
    ///
    /// # Errors
    /// Returns error if the label does not parse.
    pub fn parse(label: &str) -> Result<Self, CoreError> {
        let (year, month) = label
            .split_once('-')
            .ok_or_else(|| CoreError::Validation(format!("invalid period label '{label}'")))?;
        let year: i32 = year
            .parse()
            .map_err(|_| CoreError::Validation(format!("invalid period year in '{label}'")))?;
        let month: u32 = month
            .parse()
            .map_err(|_| CoreError::Validation(format!("invalid period month in '{label}'")))?;
        Self::new(year, month)
    }

    /// The `"YYYY-MM"` label used in reports and period matching.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// The preceding calendar period, rolling January back to December.
    #[must_use]
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The `len` calendar periods ending at the period containing `anchor`,
    /// in chronological order.
    #[must_use]
    pub fn window_ending(anchor: NaiveDate, len: usize) -> Vec<Self> {
        let mut periods = Vec::with_capacity(len);
        let mut current = Self::from_date(anchor);
        for _ in 0..len {
            periods.push(current);
            current = current.previous();
        }
        periods.reverse();
        periods
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Canonical currency cleanup: keep ASCII digits, drop everything else.
///
/// This is the only rule in the system for turning on-screen currency text
/// into something parseable. An empty result means "no value".
#[must_use]
pub fn clean_amount(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Parse on-screen currency text as an integer amount via [`clean_amount`].
///
/// Returns `None` when the cleaned form is empty or does not fit an `i64`.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<i64> {
    let cleaned = clean_amount(raw);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rut_normalization() {
        let rut = Rut::new("12.345.678-9").expect("valid RUT");
        assert_eq!(rut.as_str(), "123456789");

        let same = Rut::new("123456789").expect("valid RUT");
        assert_eq!(rut, same);
    }

    #[test]
    fn test_rut_check_digit_k() {
        let rut = Rut::new("7.654.321-k").expect("valid RUT");
        assert_eq!(rut.as_str(), "7654321K");
    }

    #[test]
    fn test_rut_invalid() {
        for raw in ["", "abc", "12.345", "12.345.678-99-9"] {
            assert!(Rut::new(raw).is_err(), "should fail for '{raw}'");
        }
    }

    #[test]
    fn test_period_label_and_parse() {
        let period = Period::new(2025, 7).expect("valid period");
        assert_eq!(period.label(), "2025-07");
        assert_eq!(Period::parse("2025-07").expect("parse"), period);
    }

    #[test]
    fn test_period_invalid_month() {
        assert!(Period::new(2025, 0).is_err());
        assert!(Period::new(2025, 13).is_err());
    }

    #[test]
    fn test_period_previous_rolls_year() {
        let january = Period::new(2026, 1).expect("valid period");
        assert_eq!(january.previous(), Period::new(2025, 12).expect("valid"));
    }

    #[test]
    fn test_window_ending_rolls_december_to_january() {
        let anchor = NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date");
        let window = Period::window_ending(anchor, 12);

        assert_eq!(window.len(), 12);
        assert_eq!(window.first().expect("first").label(), "2025-02");
        assert_eq!(window.last().expect("last").label(), "2026-01");

        // Contiguous, chronological
        for pair in window.windows(2) {
            assert_eq!(pair[1].previous(), pair[0]);
        }
    }

    #[test]
    fn test_clean_amount_is_pure() {
        assert_eq!(clean_amount("1.234.567"), "1234567");
        assert_eq!(clean_amount("$0"), "0");
        assert_eq!(clean_amount("N/A"), "");
        assert_eq!(clean_amount("$ 1.500.000 CLP"), "1500000");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$15.000"), Some(15_000));
        assert_eq!(parse_amount("0"), Some(0));
        assert_eq!(parse_amount("N/A"), None);
        assert_eq!(parse_amount(""), None);
    }
}
