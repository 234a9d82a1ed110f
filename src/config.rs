// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Kinneret water level dataset on data.gov.il.
pub const DEFAULT_RESOURCE_ID: &str = "2de7b543-e13d-4e7e-b4c8-56071bc4d3c8";
pub const DEFAULT_ENDPOINT_URL: &str = "https://data.gov.il/api/3/action/datastore_search";
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Everything the pipeline needs, passed explicitly; nothing is global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resource_id: String,
    pub endpoint_url: String,
    pub page_size: usize,
    pub date_format_candidates: Vec<String>,
    pub date_field_keywords: Vec<String>,
    pub value_field_keywords: Vec<String>,
    /// Per-request timeout applied by the HTTP client. `None` disables it.
    pub request_timeout_secs: Option<u64>,
    /// 0 keeps the single-shot behaviour: the first failed page ends the fetch.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            date_format_candidates: to_strings(&[
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%d",
                "%d/%m/%Y",
                "%m/%d/%Y",
            ]),
            date_field_keywords: to_strings(&["date", "survey", "תאריך"]),
            value_field_keywords: to_strings(&["level", "kinneret", "מפלס", "כנרת", "value"]),
            request_timeout_secs: Some(30),
            max_retries: 0,
            retry_backoff_ms: 500,
            cache_ttl_secs: 3600,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Load a YAML config file. Missing keys fall back to the defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let cfg: Config =
            serde_yaml::from_str(&text).with_context(|| format!("parsing config {:?}", path))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            bail!("page_size must be at least 1");
        }
        if self.resource_id.trim().is_empty() {
            bail!("resource_id must not be empty");
        }
        url::Url::parse(&self.endpoint_url)
            .with_context(|| format!("endpoint_url {:?} is not a valid URL", self.endpoint_url))?;
        if self.date_field_keywords.is_empty() || self.value_field_keywords.is_empty() {
            bail!("field keyword sets must not be empty");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The subset the normalizer cares about.
    pub fn normalize_config(&self) -> NormalizeConfig {
        NormalizeConfig {
            date_format_candidates: self.date_format_candidates.clone(),
            date_field_keywords: self.date_field_keywords.clone(),
            value_field_keywords: self.value_field_keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeConfig {
    pub date_format_candidates: Vec<String>,
    pub date_field_keywords: Vec<String>,
    pub value_field_keywords: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Config::default().normalize_config()
    }
}
