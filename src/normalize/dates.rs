use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// How a date column was read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStrategy {
    /// This candidate pattern parsed every non-missing value in the column.
    Format(String),
    /// No candidate fit the whole column; each value was parsed on its own.
    BestEffort,
}

/// Extra patterns tried per value once the candidates have failed.
const FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
];

/// Parse `s` with one strftime-style pattern, with or without time fields.
pub fn parse_with_format(s: &str, fmt: &str) -> Option<NaiveDate> {
    NaiveDateTime::parse_from_str(s, fmt)
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(s, fmt))
        .ok()
}

/// `YYYYMMDD` with no separators.
fn parse_compact(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u32 = s[4..6].parse().ok()?;
    let day: u32 = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Permissive single-value parse: candidates, RFC 3339, fallbacks, then an ISO date prefix.
pub fn parse_best_effort(s: &str, candidates: &[String]) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    candidates
        .iter()
        .find_map(|fmt| parse_with_format(s, fmt))
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.naive_local().date())
        })
        .or_else(|| {
            FALLBACK_FORMATS
                .iter()
                .find_map(|fmt| parse_with_format(s, fmt))
        })
        .or_else(|| parse_compact(s))
        .or_else(|| {
            s.get(..10)
                .filter(|_| s.len() > 10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

/// Try each candidate against the whole column; adopt the first that parses every
/// present value, otherwise fall back to per-value best effort.
pub fn parse_date_column(
    values: &[Option<String>],
    candidates: &[String],
) -> (DateStrategy, Vec<Option<NaiveDate>>) {
    for fmt in candidates {
        let parsed: Option<Vec<Option<NaiveDate>>> = values
            .iter()
            .map(|v| match v {
                None => Some(None),
                Some(s) => parse_with_format(s, fmt).map(Some),
            })
            .collect();
        if let Some(dates) = parsed {
            return (DateStrategy::Format(fmt.clone()), dates);
        }
    }

    let dates = values
        .iter()
        .map(|v| v.as_deref().and_then(|s| parse_best_effort(s, candidates)))
        .collect();
    (DateStrategy::BestEffort, dates)
}
