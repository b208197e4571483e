//! Date parsing and human date-range sentences.

use chrono::{Datelike, Local, NaiveDate};

use crate::validation::{ValidationError, ValidationViolation};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Batch and collision timestamps, `YYYYMMDD_HHMMSS`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a strict `YYYY-MM-DD` string. Blank input means "no date".
pub fn parse_date_ymd(input: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(None);
    }

    let invalid = || {
        ValidationError::from(
            ValidationViolation::new("date_format", "Date must be YYYY-MM-DD")
                .expected("YYYY-MM-DD")
                .actual(s),
        )
    };

    let b = s.as_bytes();
    let shape_ok = b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter().enumerate().all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit());
    if !shape_ok {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map(Some)
        .map_err(|_| invalid())
}

fn long_date(d: NaiveDate) -> String {
    format!("{} {}, {}", d.format("%B"), d.day(), d.year())
}

/// Render an optional start/end pair as one sentence fragment.
///
/// ```
/// use certify_core::dates::format_date_range;
/// assert_eq!(format_date_range("2025-01-01", "2025-01-03").unwrap(), "January 1–3, 2025");
/// ```
pub fn format_date_range(start: &str, end: &str) -> Result<String, ValidationError> {
    let start = parse_date_ymd(start);
    let end = parse_date_ymd(end);

    let (start, end) = match (start, end) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(mut a), Err(b)) => {
            a.violations.extend(b.violations);
            return Err(a);
        }
        (Err(e), _) | (_, Err(e)) => return Err(e),
    };

    Ok(match (start, end) {
        (None, None) => String::new(),
        (Some(d), None) | (None, Some(d)) => long_date(d),
        (Some(s), Some(e)) if s == e => long_date(s),
        (Some(s), Some(e)) if s.year() == e.year() && s.month() == e.month() => {
            format!("{} {}–{}, {}", s.format("%B"), s.day(), e.day(), s.year())
        }
        (Some(s), Some(e)) => format!("{}–{}", long_date(s), long_date(e)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_day() {
        assert_eq!(format_date_range("2025-01-01", "2025-01-01").unwrap(), "January 1, 2025");
    }

    #[test]
    fn same_month() {
        assert_eq!(format_date_range("2025-01-01", "2025-01-03").unwrap(), "January 1–3, 2025");
    }

    #[test]
    fn across_months() {
        assert_eq!(
            format_date_range("2025-01-30", "2025-02-02").unwrap(),
            "January 30, 2025–February 2, 2025"
        );
    }

    #[test]
    fn across_years() {
        assert_eq!(
            format_date_range("2024-12-30", "2025-01-02").unwrap(),
            "December 30, 2024–January 2, 2025"
        );
    }

    #[test]
    fn single_sided() {
        assert_eq!(format_date_range("", "").unwrap(), "");
        assert_eq!(format_date_range("2025-03-09", "").unwrap(), "March 9, 2025");
        assert_eq!(format_date_range("  ", "2025-07-04").unwrap(), "July 4, 2025");
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(parse_date_ymd("2025-1-1").is_err());
        assert!(parse_date_ymd("2025/01/01").is_err());
        assert!(parse_date_ymd("2025-02-30").is_err());
        assert!(parse_date_ymd("+2025-01-1").is_err());

        let err = format_date_range("yesterday", "tomorrow").unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert!(format_date_range("2025-01-01", "soon").is_err());
    }

    #[test]
    fn parse_trims_whitespace() {
        let d = parse_date_ymd(" 2025-06-15 ").unwrap().unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2025, 6, 15));
        assert_eq!(parse_date_ymd("").unwrap(), None);
    }

    #[test]
    fn timestamp_shape() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
    }
}
