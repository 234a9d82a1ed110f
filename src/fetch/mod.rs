// src/fetch/mod.rs

use anyhow::Result;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub mod client;
pub mod envelope;

pub use client::DatastoreClient;
pub use envelope::{parse_envelope, Page};

use crate::config::Config;
use crate::dataset::RawRecord;
use crate::error::FetchError;

/// Anything that can serve one `offset`/`limit` page of a datastore resource.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Page, FetchError>;

    /// Short label for log lines.
    fn describe(&self) -> String;
}

/// Per-page retry. `none()` means a single failed page ends the fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_retries: cfg.max_retries,
            initial_backoff: Duration::from_millis(cfg.retry_backoff_ms),
        }
    }

    /// Doubles after each failed attempt, starting at `initial_backoff`.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Everything accumulated by one `fetch_all` call.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    /// Total reported by the server on the first page, if any page arrived.
    pub total: Option<u64>,
    /// HTTP attempts made, retries included.
    pub requests: usize,
    /// Set when pagination stopped on a failure; `records` is then partial.
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    pub fn retrieved(&self) -> usize {
        self.records.len()
    }

    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

async fn fetch_page_with_retry<S: PageSource>(
    source: &S,
    offset: usize,
    limit: usize,
    retry: &RetryPolicy,
) -> (Result<Page, FetchError>, usize) {
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match source.fetch_page(offset, limit).await {
            Ok(page) => return (Ok(page), attempts as usize),
            Err(e) if attempts <= retry.max_retries => {
                let backoff = retry.backoff_for(attempts);
                warn!(
                    offset,
                    attempt = attempts,
                    delay_ms = backoff.as_millis() as u64,
                    error = %e,
                    "retrying page"
                );
                sleep(backoff).await;
            }
            Err(e) => return (Err(e), attempts as usize),
        }
    }
}

/// Walk every page of `source` until an empty page, the reported total, or the first failure.
#[instrument(level = "info", skip(source, retry), fields(src = %source.describe()))]
pub async fn fetch_all<S: PageSource>(
    source: &S,
    page_size: usize,
    retry: &RetryPolicy,
) -> FetchOutcome {
    let page_size = page_size.max(1);
    let mut outcome = FetchOutcome::default();
    let mut offset = 0usize;

    loop {
        let (result, attempts) = fetch_page_with_retry(source, offset, page_size, retry).await;
        outcome.requests += attempts;

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    offset,
                    retrieved = outcome.records.len(),
                    error = %e,
                    "fetch aborted; keeping what was retrieved"
                );
                outcome.error = Some(e);
                break;
            }
        };

        let expected = *outcome.total.get_or_insert_with(|| {
            info!(total = page.total, "total records in dataset");
            page.total
        });

        if page.records.is_empty() {
            debug!(offset, "empty page; done");
            break;
        }

        outcome.records.extend(page.records);
        offset += page_size;
        info!(
            "retrieved {} of {} records",
            outcome.records.len(),
            expected
        );

        if outcome.records.len() as u64 >= expected {
            break;
        }
    }

    if let Some(total) = outcome.total {
        let cap = usize::try_from(total).unwrap_or(usize::MAX);
        if outcome.records.len() > cap {
            warn!(
                retrieved = outcome.records.len(),
                total, "server sent more records than it reported; truncating"
            );
            outcome.records.truncate(cap);
        }
    }

    outcome
}

/// One-shot convenience: build a client for `endpoint`/`resource_id` and fetch everything.
pub async fn fetch_resource(
    endpoint: &str,
    resource_id: &str,
    page_size: usize,
) -> Result<FetchOutcome> {
    let client = DatastoreClient::new(endpoint, resource_id, None)?;
    Ok(fetch_all(&client, page_size, &RetryPolicy::none()).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init_test_logging;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves pages from a closure and remembers the offsets it was asked for.
    struct FnSource<F> {
        serve: F,
        offsets: Mutex<Vec<usize>>,
    }

    impl<F> FnSource<F>
    where
        F: Fn(usize, usize) -> Result<Page, FetchError>,
    {
        fn new(serve: F) -> Self {
            Self {
                serve,
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn offsets(&self) -> Vec<usize> {
            self.offsets.lock().unwrap().clone()
        }
    }

    impl<F> PageSource for FnSource<F>
    where
        F: Fn(usize, usize) -> Result<Page, FetchError>,
    {
        async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Page, FetchError> {
            self.offsets.lock().unwrap().push(offset);
            (self.serve)(offset, limit)
        }

        fn describe(&self) -> String {
            "fake".to_string()
        }
    }

    fn record(i: usize) -> RawRecord {
        match json!({"_id": i, "Survey_Date": "01/01/2020", "Kinneret_Level": -210.0}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    /// A well-behaved server over `n` records.
    fn slice_server(n: usize) -> impl Fn(usize, usize) -> Result<Page, FetchError> {
        move |offset, limit| {
            let end = (offset + limit).min(n);
            let records = (offset.min(n)..end).map(record).collect();
            Ok(Page {
                total: n as u64,
                records,
            })
        }
    }

    #[tokio::test]
    async fn collects_every_page() {
        init_test_logging();
        let source = FnSource::new(slice_server(5));
        let outcome = fetch_all(&source, 2, &RetryPolicy::none()).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.retrieved(), 5);
        assert_eq!(outcome.total, Some(5));
        assert_eq!(source.offsets(), vec![0, 2, 4]);
        // ceil(5 / 2) + 1
        assert!(outcome.requests <= 4);
    }

    #[tokio::test]
    async fn empty_page_stops_even_if_total_is_larger() {
        init_test_logging();
        let source = FnSource::new(|offset, _limit| {
            let records = if offset == 0 {
                vec![record(0), record(1)]
            } else {
                Vec::new()
            };
            Ok(Page {
                total: 10,
                records,
            })
        });
        let outcome = fetch_all(&source, 2, &RetryPolicy::none()).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.retrieved(), 2);
        assert_eq!(outcome.requests, 2);
    }

    #[tokio::test]
    async fn oversized_page_is_capped_at_total() {
        init_test_logging();
        let source = FnSource::new(|_offset, _limit| {
            Ok(Page {
                total: 3,
                records: (0..5).map(record).collect(),
            })
        });
        let outcome = fetch_all(&source, 10, &RetryPolicy::none()).await;

        assert_eq!(outcome.retrieved(), 3);
        assert_eq!(outcome.requests, 1);
    }

    #[tokio::test]
    async fn failure_midway_keeps_partial_records() {
        init_test_logging();
        let source = FnSource::new(|offset, limit| {
            if offset >= 4 {
                Err(FetchError::Status {
                    url: "fake".into(),
                    status: 503,
                })
            } else {
                slice_server(10)(offset, limit)
            }
        });
        let outcome = fetch_all(&source, 2, &RetryPolicy::none()).await;

        assert_eq!(outcome.retrieved(), 4);
        assert_eq!(outcome.total, Some(10));
        assert!(matches!(
            outcome.error,
            Some(FetchError::Status { status: 503, .. })
        ));
        assert_eq!(source.offsets(), vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn first_page_failure_returns_nothing() {
        init_test_logging();
        let source =
            FnSource::new(|_offset, _limit| Err(FetchError::Api("resource not found".into())));
        let outcome = fetch_all(&source, 100, &RetryPolicy::none()).await;

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.total, None);
        assert_eq!(outcome.requests, 1);
        assert!(!outcome.is_complete());
    }

    #[tokio::test]
    async fn retry_recovers_a_flaky_page() {
        init_test_logging();
        let failures = AtomicUsize::new(0);
        let source = FnSource::new(|offset, limit| {
            if offset == 2 && failures.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(FetchError::Status {
                    url: "fake".into(),
                    status: 502,
                });
            }
            slice_server(4)(offset, limit)
        });
        let retry = RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
        };
        let outcome = fetch_all(&source, 2, &retry).await;

        assert!(outcome.is_complete());
        assert_eq!(outcome.retrieved(), 4);
        assert_eq!(source.offsets(), vec![0, 2, 2, 2]);
        assert_eq!(outcome.requests, 4);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        init_test_logging();
        let source = FnSource::new(|_offset, _limit| {
            Err(FetchError::Status {
                url: "fake".into(),
                status: 500,
            })
        });
        let retry = RetryPolicy {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
        };
        let outcome = fetch_all(&source, 2, &retry).await;

        assert_eq!(outcome.requests, 3);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn backoff_doubles() {
        init_test_logging();
        let retry = RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
        };
        assert_eq!(retry.backoff_for(1), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(3), Duration::from_millis(400));
    }
}
