// src/normalize/mod.rs

pub mod dates;
pub mod fields;
pub mod values;

pub use dates::{parse_best_effort, parse_date_column, parse_with_format, DateStrategy};
pub use fields::{find_field, infer_fields, InferredFields};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::NormalizeConfig;
use crate::dataset::{Dataset, NormalizedRow, RawRecord};
use crate::error::SchemaInferenceError;

/// What happened while turning raw records into a `Dataset`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    /// `None` only for empty input.
    pub fields: Option<InferredFields>,
    pub date_strategy: Option<DateStrategy>,
    pub input_rows: usize,
    pub bad_values: usize,
    pub bad_dates: usize,
    /// Rows removed for a missing date or value (a row bad in both counts once).
    pub dropped_rows: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub dataset: Dataset,
    pub report: NormalizeReport,
}

/// Infer fields from the first record, coerce values, detect the date format,
/// drop incomplete rows and sort by date.
pub fn normalize(
    records: &[RawRecord],
    cfg: &NormalizeConfig,
) -> Result<Normalized, SchemaInferenceError> {
    let Some(first) = records.first() else {
        debug!("no records; returning empty dataset");
        return Ok(Normalized {
            dataset: Dataset::empty(),
            report: NormalizeReport::default(),
        });
    };

    let fields = infer_fields(
        first.keys().map(String::as_str),
        &cfg.date_field_keywords,
        &cfg.value_field_keywords,
    )?;
    info!(date_field = %fields.date, value_field = %fields.value, "inferred fields");

    let values: Vec<Option<f64>> = records
        .iter()
        .map(|r| values::coerce_value(r.get(&fields.value)))
        .collect();
    let date_cells: Vec<Option<String>> = records
        .iter()
        .map(|r| values::date_text(r.get(&fields.date)))
        .collect();

    let (strategy, dates) = parse_date_column(&date_cells, &cfg.date_format_candidates);
    match &strategy {
        DateStrategy::Format(fmt) => info!(format = %fmt, "date format adopted"),
        DateStrategy::BestEffort => {
            warn!("no candidate format fits every date; parsed each value on its own")
        }
    }

    let bad_values = values.iter().filter(|v| v.is_none()).count();
    let bad_dates = dates.iter().filter(|d| d.is_none()).count();

    let rows: Vec<NormalizedRow> = dates
        .into_iter()
        .zip(values)
        .filter_map(|(date, value)| Some(NormalizedRow::new(date?, value?)))
        .collect();

    let dropped_rows = records.len() - rows.len();
    if dropped_rows > 0 {
        warn!(
            dropped_rows,
            bad_values, bad_dates, "dropped rows with missing date or value"
        );
    }

    let dataset = Dataset::from_rows(rows);
    info!(rows = dataset.len(), "normalized");

    Ok(Normalized {
        dataset,
        report: NormalizeReport {
            fields: Some(fields),
            date_strategy: Some(strategy),
            input_rows: records.len(),
            bad_values,
            bad_dates,
            dropped_rows,
        },
    })
}
