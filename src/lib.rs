pub mod cache;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod report;

pub use config::Config;
pub use dataset::{Dataset, NormalizedRow, RawRecord};
pub use error::{FetchError, SchemaInferenceError};
pub use pipeline::{Diagnostics, PipelineOutput, Status};

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,lakescraper=debug")),
        )
        .with_test_writer()
        .try_init();
}
