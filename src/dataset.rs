// src/dataset.rs

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// One upstream record: field name → JSON scalar, in the order the API sent them.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A cleaned reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedRow {
    pub date: NaiveDate,
    pub value: f64,
    pub year: i32,
    pub month: u32,
    pub day_of_year: u32,
}

impl NormalizedRow {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self {
            date,
            value,
            year: date.year(),
            month: date.month(),
            day_of_year: date.ordinal(),
        }
    }
}

/// Rows ordered by `date` (non-decreasing). Same-day readings are all kept.
///
/// Only built through `from_rows`; saved output is read back via `normalize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Dataset {
    rows: Vec<NormalizedRow>,
}

impl Dataset {
    /// Column names every consumer can rely on, even for an empty dataset.
    pub const FIELDS: [&'static str; 5] = ["date", "value", "year", "month", "day_of_year"];

    pub fn empty() -> Self {
        Self::default()
    }

    /// Stable-sorts by date, so equal dates keep their input order.
    pub fn from_rows(mut rows: Vec<NormalizedRow>) -> Self {
        rows.sort_by_key(|r| r.date);
        Self { rows }
    }

    pub fn field_names(&self) -> &'static [&'static str] {
        &Self::FIELDS
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NormalizedRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NormalizedRow> {
        self.rows.get(index)
    }

    pub fn first(&self) -> Option<&NormalizedRow> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&NormalizedRow> {
        self.rows.last()
    }

    /// Rows whose date falls in `[from, to]`.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> &[NormalizedRow] {
        let start = self.rows.partition_point(|r| r.date < from);
        let end = self.rows.partition_point(|r| r.date <= to);
        if start >= end {
            &[]
        } else {
            &self.rows[start..end]
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a NormalizedRow;
    type IntoIter = std::slice::Iter<'a, NormalizedRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
