//! Canonical row shape and date window helpers

use crate::core::error::DateParseError;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Format used by the provider for request windows, e.g. `01-Jan-2024`.
pub const DMY_FORMAT: &str = "%d-%b-%Y";
pub const ISO_FORMAT: &str = "%Y-%m-%d";

/// One observation for one index on one date.
///
/// `close` is mandatory; every other numeric field may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub div_yield: Option<f64>,
}

impl IndexRow {
    pub fn key(&self) -> (&str, NaiveDate) {
        (&self.symbol, self.date)
    }
}

/// Inclusive `[start, end]` range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Window covering the `days` days before `end`, up to and including `end`.
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        let start = end
            .checked_sub_signed(Duration::days(days))
            .unwrap_or(NaiveDate::MIN);
        Self { start, end }
    }

    pub fn start_dmy(&self) -> String {
        self.start.format(DMY_FORMAT).to_string()
    }

    pub fn end_dmy(&self) -> String {
        self.end.format(DMY_FORMAT).to_string()
    }
}

impl Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.start_dmy(), self.end_dmy())
    }
}

/// Parses a user supplied date in either `YYYY-MM-DD` or `DD-Mon-YYYY` form.
pub fn parse_user_date(input: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, ISO_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, DMY_FORMAT))
        .map_err(|_| DateParseError {
            input: input.to_string(),
        })
}

/// Parses a provider date such as `21 Dec 2023` (or `21-Dec-2023`).
pub fn parse_provider_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%d %b %Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, DMY_FORMAT))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_user_date_accepts_both_formats() {
        assert_eq!(parse_user_date("2025-08-18").unwrap(), d(2025, 8, 18));
        assert_eq!(parse_user_date("18-Aug-2025").unwrap(), d(2025, 8, 18));
        assert_eq!(
            parse_user_date("18/08/2025").unwrap_err().input,
            "18/08/2025"
        );
    }

    #[test]
    fn test_parse_provider_date() {
        assert_eq!(parse_provider_date("21 Dec 2023"), Some(d(2023, 12, 21)));
        assert_eq!(parse_provider_date(" 01-Jan-2024 "), Some(d(2024, 1, 1)));
        assert_eq!(parse_provider_date("2024-01-01"), None);
    }

    #[test]
    fn test_trailing_window() {
        let window = DateWindow::trailing(d(2024, 12, 31), 365);
        assert_eq!(window.start, d(2024, 1, 1));
        assert_eq!(window.end, d(2024, 12, 31));
        assert_eq!(window.to_string(), "01-Jan-2024 -> 31-Dec-2024");
    }
}
