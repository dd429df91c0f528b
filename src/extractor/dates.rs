// file: src/extractor/dates.rs
// description: lenient timestamp parsing, invariant formats first then german formats
// reference: https://docs.rs/chrono

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const INVARIANT_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const INVARIANT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%:z"];

const GERMAN_DATETIME_FORMATS: &[&str] = &["%d.%m.%Y %H:%M:%S", "%d.%m.%Y %H:%M"];

// Two-digit years first, `%Y` would accept "23" as year 23.
const GERMAN_DATE_FORMATS: &[&str] = &["%d.%m.%y", "%d.%m.%Y"];

/// Parses a timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    parse_invariant(value).or_else(|| parse_german(value))
}

fn parse_invariant(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    naive_datetime(value, INVARIANT_DATETIME_FORMATS)
        .or_else(|| naive_date(value, INVARIANT_DATE_FORMATS))
        .or_else(|| year_month(value))
}

fn parse_german(value: &str) -> Option<DateTime<Utc>> {
    naive_datetime(value, GERMAN_DATETIME_FORMATS).or_else(|| naive_date(value, GERMAN_DATE_FORMATS))
}

fn naive_datetime(value: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| dt.and_utc())
}

fn naive_date(value: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// FHIR partial dates such as `2023-05` resolve to the first day of the month.
fn year_month(value: &str) -> Option<DateTime<Utc>> {
    if value.len() != 7 {
        return None;
    }
    naive_date(&format!("{}-01", value), &["%Y-%m-%d"])
}
