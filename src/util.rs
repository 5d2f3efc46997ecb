// Utility helpers for parsing text fields and formatting numbers.
//
// Source files are read with every field as text; this module is where the
// "dirty" timestamp and number handling lives so the normalizers can work
// with typed values.
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters (except an exponent).
/// - Strips thousands separators like `","` before parsing.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%Y/%m/%d"];

/// Parse a free-text timestamp. Returns `None` when no known layout fits.
///
/// Offsets are dropped and the local wall-clock time is kept, so an
/// observation made at 23:30 local time stays in its local day.
pub fn parse_timestamp_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Some(dt.naive_local());
    }
    // "2019-05-04 13:02:11 UTC" and similar named-zone suffixes
    let bare = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix(" GMT"))
        .unwrap_or(s);
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(bare, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(bare, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    // Month-granularity stamps such as "2017-01" in monthly station files.
    NaiveDate::parse_from_str(&format!("{bare}-01"), "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

pub fn average(v: &[f64]) -> Option<f64> {
    if v.is_empty() {
        return None;
    }
    let sum: f64 = v.iter().copied().sum();
    Some(sum / v.len() as f64)
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators, e.g. `1,234.50`.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let int_val: u64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = parts.next() {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn numbers_with_separators_and_text() {
        assert_eq!(parse_f64_safe(Some(" 1,234.5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("7.2e1")), Some(72.0));
        assert_eq!(parse_f64_safe(Some("n/a")), None);
        assert_eq!(parse_f64_safe(Some("")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn timestamps_in_common_layouts() {
        let d = parse_timestamp_safe(Some("2017-01-15")).unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2017, 1, 15));

        let t = parse_timestamp_safe(Some("2019-05-04 13:02:11 UTC")).unwrap();
        assert_eq!(t.hour(), 13);

        let z = parse_timestamp_safe(Some("2019-05-04T23:30:00-05:00")).unwrap();
        assert_eq!((z.day(), z.hour()), (4, 23));

        let us = parse_timestamp_safe(Some("12/01/2017")).unwrap();
        assert_eq!((us.year(), us.month(), us.day()), (2017, 12, 1));

        let monthly = parse_timestamp_safe(Some("2018-07")).unwrap();
        assert_eq!((monthly.month(), monthly.day()), (7, 1));
    }

    #[test]
    fn garbage_timestamps_are_rejected() {
        assert!(parse_timestamp_safe(Some("sometime in spring")).is_none());
        assert!(parse_timestamp_safe(Some("2017-13-01")).is_none());
        assert!(parse_timestamp_safe(Some("  ")).is_none());
    }

    #[test]
    fn formatting() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-3.5, 1), "-3.5");
        assert_eq!(format_int(9855), "9,855");
        assert_eq!(average(&[]), None);
        assert_eq!(average(&[1.0, 2.0]), Some(1.5));
    }
}
