// src/error.rs

use thiserror::Error;

/// Why a fetch stopped early. Fatal to that fetch, never to the process.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    #[error("API reported failure: {0}")]
    Api(String),
}

/// The first record had no field matching the date and/or value keywords.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not identify required columns (missing {missing}); available fields: {available:?}")]
pub struct SchemaInferenceError {
    pub missing: String,
    pub available: Vec<String>,
}
