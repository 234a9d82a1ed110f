// src/export.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Date32Array, Float64Array, Int32Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Deserialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};
use tracing::info;

use crate::dataset::{Dataset, RawRecord};
use crate::fetch::envelope::Envelope;

fn dataset_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("value", DataType::Float64, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::UInt32, false),
        Field::new("day_of_year", DataType::UInt32, false),
    ])
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    (date - epoch).num_days() as i32
}

/// Columnar view of the dataset; an empty dataset gives a zero-row batch.
pub fn to_record_batch(ds: &Dataset) -> Result<RecordBatch> {
    let schema = Arc::new(dataset_schema());
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from_iter_values(
            ds.iter().map(|r| days_since_epoch(r.date)),
        )),
        Arc::new(Float64Array::from_iter_values(ds.iter().map(|r| r.value))),
        Arc::new(Int32Array::from_iter_values(ds.iter().map(|r| r.year))),
        Arc::new(UInt32Array::from_iter_values(ds.iter().map(|r| r.month))),
        Arc::new(UInt32Array::from_iter_values(
            ds.iter().map(|r| r.day_of_year),
        )),
    ];
    RecordBatch::try_new(schema, columns).context("building dataset record batch")
}

/// Write the dataset as a single Snappy-compressed Parquet file.
pub fn write_parquet(ds: &Dataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }

    let batch = to_record_batch(ds)?;
    let file = File::create(path).with_context(|| format!("creating parquet file {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(&batch).context("writing dataset batch")?;
    writer.close().context("closing parquet writer")?;

    info!(rows = ds.len(), path = %path.display(), "wrote parquet");
    Ok(())
}

/// JSON array of rows.
pub fn write_json<W: Write>(ds: &Dataset, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, ds).context("serializing dataset")
}

/// Persist fetched records so later runs can skip the network.
pub fn save_records(records: &[RawRecord], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, records).context("serializing records")?;
    writer.flush()?;
    info!(records = records.len(), path = %path.display(), "saved raw records");
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SavedRecords {
    Plain(Vec<RawRecord>),
    Envelope(Envelope),
}

/// Load records saved by `save_records`, or a raw API response body.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let saved: SavedRecords = serde_json::from_str(&text)
        .with_context(|| format!("{:?} is neither a record list nor an API envelope", path))?;
    match saved {
        SavedRecords::Plain(records) => Ok(records),
        SavedRecords::Envelope(env) => {
            let page = env.into_page(&path.display().to_string())?;
            Ok(page.records)
        }
    }
}
