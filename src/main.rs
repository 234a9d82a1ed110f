use anyhow::Result;
use chrono::Days;
use clap::{Parser, Subcommand};
use lakescraper::{
    cache::Memo,
    config::Config,
    export,
    fetch::{fetch_all, DatastoreClient, RetryPolicy},
    pipeline::{self, PipelineOutput},
    report,
};
use std::{io, path::PathBuf, time::Duration};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Fetch and normalize the Lake Kinneret water level series from data.gov.il"
)]
struct Args {
    /// YAML config file; flags below override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// -v for debug, -vv for trace. RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once and print a summary.
    Fetch(FetchArgs),
    /// Re-print the summary every `interval` seconds, refetching once the cache TTL expires.
    Watch {
        #[arg(long, default_value_t = 300)]
        interval: u64,
        #[arg(long)]
        iterations: Option<usize>,
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(clap::Args)]
struct SourceArgs {
    #[arg(long)]
    resource_id: Option<String>,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    page_size: Option<usize>,
    #[arg(long)]
    max_retries: Option<u32>,
    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
    /// Cache TTL in seconds (watch only).
    #[arg(long)]
    cache_ttl: Option<u64>,
}

#[derive(clap::Args)]
struct FetchArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Normalize a saved record file instead of calling the API.
    #[arg(long)]
    records: Option<PathBuf>,
    /// Save the raw fetched records as JSON.
    #[arg(long)]
    save_raw: Option<PathBuf>,
    /// Write the normalized dataset to Parquet.
    #[arg(long)]
    parquet: Option<PathBuf>,
    /// Print the normalized dataset as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();
}

fn build_config(path: Option<&PathBuf>, src: &SourceArgs) -> Result<Config> {
    let mut cfg = match path {
        Some(p) => Config::from_yaml_file(p)?,
        None => Config::default(),
    };
    if let Some(id) = &src.resource_id {
        cfg.resource_id = id.clone();
    }
    if let Some(endpoint) = &src.endpoint {
        cfg.endpoint_url = endpoint.clone();
    }
    if let Some(n) = src.page_size {
        cfg.page_size = n;
    }
    if let Some(n) = src.max_retries {
        cfg.max_retries = n;
    }
    if let Some(secs) = src.timeout {
        cfg.request_timeout_secs = Some(secs);
    }
    if let Some(secs) = src.cache_ttl {
        cfg.cache_ttl_secs = secs;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Years shown in the per-year comparison.
const RECENT_YEARS: usize = 3;

fn fmt_change(v: Option<f64>) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{:+.2}m", v))
}

fn print_summary(out: &PipelineOutput) {
    let diag = &out.diagnostics;
    println!("status:    {}", diag.status());
    if let Some(reason) = diag.reason() {
        println!("reason:    {}", reason);
    }
    println!(
        "records:   {} retrieved of {} reported, {} requests",
        diag.retrieved,
        diag.total_reported
            .map_or_else(|| "?".to_string(), |t| t.to_string()),
        diag.requests
    );
    if let Some(fields) = &diag.normalize.fields {
        println!("fields:    date={} value={}", fields.date, fields.value);
    }
    println!(
        "rows:      {} kept, {} dropped",
        out.dataset.len(),
        diag.normalize.dropped_rows
    );

    let Some(s) = report::summary(&out.dataset) else {
        return;
    };
    println!("range:     {} to {}", s.first_date, s.last_date);
    println!(
        "level:     min {:.2} / max {:.2} / mean {:.2}",
        s.min, s.max, s.mean
    );
    println!("latest:    {:.2}m on {}", s.latest.value, s.latest.date.format("%d/%m/%Y"));

    if let Some(c) = report::changes(&out.dataset) {
        println!(
            "change:    day {} / month {} / year {}",
            fmt_change(c.daily),
            fmt_change(c.monthly),
            fmt_change(c.yearly)
        );
    }
    if let Some((lo, hi)) = report::percentile_band(&out.dataset) {
        println!("p10/p90:   {:.2} / {:.2}", lo, hi);
    }
    let year_ago = s
        .last_date
        .checked_sub_days(Days::new(365))
        .unwrap_or(s.first_date);
    let last_year = out.dataset.between(year_ago, s.last_date);
    println!("last 365d: {} readings", last_year.len());

    let years = report::recent_years(&out.dataset, RECENT_YEARS);
    for (year, series) in report::year_comparison(&out.dataset, &years) {
        let values = series.iter().map(|(_, v)| *v);
        let lo = values.clone().fold(f64::INFINITY, f64::min);
        let hi = values.fold(f64::NEG_INFINITY, f64::max);
        println!(
            "{}:      {} readings, {:.2} to {:.2}",
            year,
            series.len(),
            lo,
            hi
        );
    }

    let seasonal: Vec<String> = report::monthly_averages(&out.dataset)
        .iter()
        .map(|m| format!("{} {:.2}", report::MONTH_NAMES[(m.month - 1) as usize], m.mean))
        .collect();
    println!("seasonal:  {}", seasonal.join(", "));

    let q = report::quality(&out.dataset);
    if !q.sparse_years.is_empty() {
        println!("sparse:    {:?}", q.sparse_years);
    }
    println!(
        "quality:   {} gaps > {} days, {} outliers",
        q.gaps.len(),
        report::GAP_THRESHOLD_DAYS,
        q.outliers.len()
    );
}

async fn fetch_cmd(cfg: &Config, args: &FetchArgs) -> Result<()> {
    let out = match &args.records {
        Some(path) => {
            let records = export::load_records(path)?;
            info!(records = records.len(), path = %path.display(), "loaded saved records");
            pipeline::run_offline(&records, cfg)
        }
        None => {
            let client = DatastoreClient::from_config(cfg)?;
            info!(resource_id = client.resource_id(), "fetching resource");
            let outcome = fetch_all(&client, cfg.page_size, &RetryPolicy::from_config(cfg)).await;
            if let Some(path) = &args.save_raw {
                export::save_records(&outcome.records, path)?;
            }
            pipeline::run_fetched(&outcome, cfg)
        }
    };

    if let Some(path) = &args.parquet {
        export::write_parquet(&out.dataset, path)?;
    }
    if args.json {
        export::write_json(&out.dataset, io::stdout().lock())?;
        println!();
    } else {
        print_summary(&out);
    }
    Ok(())
}

async fn watch_cmd(cfg: &Config, interval: u64, iterations: Option<usize>) -> Result<()> {
    let mut memo = Memo::new(cfg.cache_ttl());
    info!(ttl_secs = memo.ttl().as_secs(), interval, "watching");
    let mut round = 0usize;
    loop {
        round += 1;
        if memo.peek().is_some() {
            debug!(round, "serving cached pipeline output");
        }
        let out = memo.get_or_refresh(|| pipeline::run(cfg)).await;
        print_summary(out);
        if iterations.is_some_and(|n| round >= n) {
            break;
        }
        println!();
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("startup");

    match &args.command {
        Command::Fetch(fetch) => {
            let cfg = build_config(args.config.as_ref(), &fetch.source)?;
            fetch_cmd(&cfg, fetch).await?;
        }
        Command::Watch {
            interval,
            iterations,
            source,
        } => {
            let cfg = build_config(args.config.as_ref(), source)?;
            if *interval == 0 {
                warn!("interval 0 refreshes as fast as the cache allows");
            }
            watch_cmd(&cfg, *interval, *iterations).await?;
        }
    }

    info!("all done");
    Ok(())
}
