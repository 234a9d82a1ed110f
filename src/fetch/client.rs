use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::envelope::{parse_envelope, Page};
use super::PageSource;
use crate::config::Config;
use crate::error::FetchError;

/// HTTP client bound to one datastore resource.
#[derive(Debug, Clone)]
pub struct DatastoreClient {
    client: Client,
    endpoint: Url,
    resource_id: String,
}

impl DatastoreClient {
    pub fn new(endpoint: &str, resource_id: &str, timeout: Option<Duration>) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("parsing endpoint URL {}", endpoint))?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("building HTTP client")?;
        Ok(Self {
            client,
            endpoint,
            resource_id: resource_id.to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        Self::new(&cfg.endpoint_url, &cfg.resource_id, cfg.request_timeout())
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn page_url(&self, offset: usize, limit: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("resource_id", &self.resource_id)
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        url
    }
}

impl PageSource for DatastoreClient {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Page, FetchError> {
        let url = self.page_url(offset, limit);
        debug!(%url, "GET page");

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = resp.text().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;
        parse_envelope(&body, url.as_str())
    }

    fn describe(&self) -> String {
        format!("{} [{}]", self.endpoint, self.resource_id)
    }
}
