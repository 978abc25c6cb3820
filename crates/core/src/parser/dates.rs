//! Minguo (ROC) calendar date handling.
//!
//! The registry renders dates in the Republic of China calendar in a few
//! layouts (民國114年11月7日, 114年11月7日, 114/11/7, 114-11-07). Records
//! are stored with both the proleptic Gregorian date and the source-native
//! `114-11-07` string.

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::text::clean_text;

/// Offset between ROC and Gregorian years.
const ROC_YEAR_OFFSET: i32 = 1911;

/// Plausibility window for ROC years in assignment dates. The registry
/// only publishes recent assignments; anything outside this range is a
/// scrape artifact.
const ROC_YEAR_MIN: i32 = 100;
const ROC_YEAR_MAX: i32 = 120;

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^民國(\d{2,3})年(\d{1,2})月(\d{1,2})日$").unwrap(),
        Regex::new(r"^(\d{2,3})年(\d{1,2})月(\d{1,2})日$").unwrap(),
        Regex::new(r"^(\d{2,3})/(\d{1,2})/(\d{1,2})$").unwrap(),
        Regex::new(r"^(\d{2,3})-(\d{1,2})-(\d{1,2})$").unwrap(),
    ]
});

/// Parse a Minguo date string into a calendar date.
///
/// Returns `None` for unrecognized layouts, ROC years outside the
/// plausibility window, calendar-invalid dates, and dates in the future.
pub fn parse_minguo_date(input: &str) -> Option<NaiveDate> {
    let cleaned = clean_text(input);

    for pattern in DATE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(&cleaned) else {
            continue;
        };

        let roc_year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;

        if !(ROC_YEAR_MIN..=ROC_YEAR_MAX).contains(&roc_year) {
            return None;
        }

        let date = NaiveDate::from_ymd_opt(roc_year + ROC_YEAR_OFFSET, month, day)?;
        if date > Utc::now().date_naive() {
            return None;
        }
        return Some(date);
    }

    None
}

/// Render a calendar date back to the source-native `114-11-07` form.
pub fn to_minguo_string(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!(
        "{}-{:02}-{:02}",
        date.year() - ROC_YEAR_OFFSET,
        date.month(),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_all_layouts_agree() {
        let expected = Some(d(2025, 11, 7));
        assert_eq!(parse_minguo_date("民國114年11月7日"), expected);
        assert_eq!(parse_minguo_date("114年11月7日"), expected);
        assert_eq!(parse_minguo_date("114/11/7"), expected);
        assert_eq!(parse_minguo_date("114-11-07"), expected);
    }

    #[test]
    fn test_parse_fullwidth_digits() {
        assert_eq!(parse_minguo_date("１１４－１１－０７"), Some(d(2025, 11, 7)));
        assert_eq!(parse_minguo_date("１１４-１１-０７"), Some(d(2025, 11, 7)));
    }

    #[test]
    fn test_parse_with_surrounding_whitespace() {
        assert_eq!(parse_minguo_date(" 114-11-07 "), Some(d(2025, 11, 7)));
    }

    #[test]
    fn test_out_of_window_year_rejected() {
        assert_eq!(parse_minguo_date("99-01-01"), None);
        assert_eq!(parse_minguo_date("121-01-01"), None);
    }

    #[test]
    fn test_calendar_invalid_rejected() {
        assert_eq!(parse_minguo_date("114-02-30"), None);
        assert_eq!(parse_minguo_date("114-13-01"), None);
    }

    #[test]
    fn test_future_date_rejected() {
        // ROC 120 = 2031, inside the year window but in the future.
        assert_eq!(parse_minguo_date("120-01-01"), None);
    }

    #[test]
    fn test_unrecognized_layout_rejected() {
        assert_eq!(parse_minguo_date("2025-11-07"), None);
        assert_eq!(parse_minguo_date("not a date"), None);
        assert_eq!(parse_minguo_date(""), None);
    }

    #[test]
    fn test_to_minguo_string() {
        assert_eq!(to_minguo_string(d(2025, 11, 7)), "114-11-07");
        assert_eq!(to_minguo_string(d(2025, 1, 2)), "114-01-02");
    }

    #[test]
    fn test_round_trip() {
        let date = parse_minguo_date("114年1月2日").unwrap();
        assert_eq!(to_minguo_string(date), "114-01-02");
    }
}
