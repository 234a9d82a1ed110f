// src/pipeline.rs

use serde::Serialize;
use std::fmt;
use tracing::{error, info, instrument, warn};

use crate::config::Config;
use crate::dataset::{Dataset, RawRecord};
use crate::fetch::{fetch_all, DatastoreClient, FetchOutcome, PageSource, RetryPolicy};
use crate::normalize::{normalize, NormalizeReport};

/// Overall result of one pipeline run, most severe condition first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Every page arrived and the schema resolved.
    Complete,
    /// Upstream answered but had no records.
    NoData,
    /// Some pages arrived before a fetch failure.
    Partial,
    /// Nothing could be fetched.
    FetchFailed,
    /// Records arrived and the schema resolved, but no row had a usable date and value.
    AllRowsDropped,
    /// Records arrived but no date/value field could be identified.
    SchemaUnresolved,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Complete => "complete",
            Status::NoData => "no data",
            Status::Partial => "partial",
            Status::FetchFailed => "fetch failed",
            Status::AllRowsDropped => "all rows dropped",
            Status::SchemaUnresolved => "schema unresolved",
        };
        f.write_str(s)
    }
}

/// Side channel handed to consumers alongside the dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub total_reported: Option<u64>,
    pub retrieved: usize,
    pub requests: usize,
    pub fetch_error: Option<String>,
    pub schema_error: Option<String>,
    pub normalize: NormalizeReport,
}

impl Diagnostics {
    pub fn status(&self) -> Status {
        if self.schema_error.is_some() {
            Status::SchemaUnresolved
        } else if self.fetch_error.is_some() && self.retrieved == 0 {
            Status::FetchFailed
        } else if self.retrieved > 0
            && self.normalize.input_rows > 0
            && self.normalize.dropped_rows == self.normalize.input_rows
        {
            Status::AllRowsDropped
        } else if self.fetch_error.is_some() {
            Status::Partial
        } else if self.retrieved == 0 {
            Status::NoData
        } else {
            Status::Complete
        }
    }

    /// Human-readable explanation for anything short of `Complete`.
    pub fn reason(&self) -> Option<String> {
        match self.status() {
            Status::Complete => None,
            Status::NoData => Some("upstream returned no records".to_string()),
            Status::Partial => Some(format!(
                "fetch stopped after {} of {} records: {}",
                self.retrieved,
                self.total_reported
                    .map_or_else(|| "?".to_string(), |t| t.to_string()),
                self.fetch_error.as_deref().unwrap_or_default()
            )),
            Status::FetchFailed => Some(format!(
                "fetch failed: {}",
                self.fetch_error.as_deref().unwrap_or_default()
            )),
            Status::AllRowsDropped => Some(self.with_fetch_error(format!(
                "all {} records were dropped ({} bad dates, {} bad values)",
                self.normalize.input_rows, self.normalize.bad_dates, self.normalize.bad_values
            ))),
            Status::SchemaUnresolved => self
                .schema_error
                .clone()
                .map(|reason| self.with_fetch_error(reason)),
        }
    }

    /// A failed fetch also explains why the records on hand may be unrepresentative.
    fn with_fetch_error(&self, reason: String) -> String {
        match &self.fetch_error {
            Some(e) => format!("{}; fetch also stopped early: {}", reason, e),
            None => reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub dataset: Dataset,
    pub diagnostics: Diagnostics,
}

/// Normalize already-fetched records and fold the outcome into diagnostics.
fn finish(records: &[RawRecord], cfg: &Config, mut diagnostics: Diagnostics) -> PipelineOutput {
    let dataset = match normalize(records, &cfg.normalize_config()) {
        Ok(n) => {
            diagnostics.normalize = n.report;
            n.dataset
        }
        Err(e) => {
            error!(error = %e, "schema inference failed");
            diagnostics.schema_error = Some(e.to_string());
            Dataset::empty()
        }
    };

    match diagnostics.reason() {
        Some(reason) => warn!(
            status = %diagnostics.status(),
            %reason,
            rows = dataset.len(),
            "pipeline finished"
        ),
        None => info!(rows = dataset.len(), "pipeline finished"),
    }

    PipelineOutput {
        dataset,
        diagnostics,
    }
}

fn diagnostics_from(outcome: &FetchOutcome) -> Diagnostics {
    Diagnostics {
        total_reported: outcome.total,
        retrieved: outcome.retrieved(),
        requests: outcome.requests,
        fetch_error: outcome.error.as_ref().map(ToString::to_string),
        ..Diagnostics::default()
    }
}

/// Normalize the result of a fetch the caller already ran.
pub fn run_fetched(outcome: &FetchOutcome, cfg: &Config) -> PipelineOutput {
    finish(&outcome.records, cfg, diagnostics_from(outcome))
}

/// Fetch from any page source, then normalize. Never fails; see `Diagnostics`.
pub async fn run_with_source<S: PageSource>(source: &S, cfg: &Config) -> PipelineOutput {
    let outcome = fetch_all(source, cfg.page_size, &RetryPolicy::from_config(cfg)).await;
    run_fetched(&outcome, cfg)
}

/// Fetch the configured resource over HTTP, then normalize.
#[instrument(level = "info", skip(cfg), fields(resource_id = %cfg.resource_id))]
pub async fn run(cfg: &Config) -> PipelineOutput {
    match DatastoreClient::from_config(cfg) {
        Ok(client) => run_with_source(&client, cfg).await,
        Err(e) => {
            error!(error = %e, "could not build datastore client");
            let diagnostics = Diagnostics {
                fetch_error: Some(format!("{:#}", e)),
                ..Diagnostics::default()
            };
            finish(&[], cfg, diagnostics)
        }
    }
}

/// Normalize records loaded from disk instead of the network.
pub fn run_offline(records: &[RawRecord], cfg: &Config) -> PipelineOutput {
    let diagnostics = Diagnostics {
        total_reported: Some(records.len() as u64),
        retrieved: records.len(),
        ..Diagnostics::default()
    };
    finish(records, cfg, diagnostics)
}
