//! Bulk hydrator.
//!
//! Walks `HYDRATOR_ZIPS` through the RapidAPI realtor search, persisting every
//! listing into SQLite. Runs every `HYDRATOR_INTERVAL` (default 6h) until
//! interrupted, or once with `--run-once` / `HYDRATOR_RUN_ONCE=1`.
//!
//! ```text
//! RAPIDAPI_KEY=... HYDRATOR_ZIPS="62704,78701" hydrator --database domus.db
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use domus::settings::HydratorSettings;
use domus::{BulkJob, Hydrator, InMemoryPublisher};
use domus_middleware::{ConnectorBuilder, QuotaGate};
use domus_rapid::{RapidConfig, RapidConnector};
use domus_store::SqliteStore;
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hydrator", about = "Quota-bounded bulk listing hydration")]
struct Args {
    /// Optional TOML settings file; `HYDRATOR_*` variables override it.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// RapidAPI key.
    #[arg(long, env = "RAPIDAPI_KEY", hide_env_values = true)]
    rapidapi_key: String,

    /// SQLite database path.
    #[arg(long, env = "HYDRATOR_DB", default_value = "domus.db")]
    database: PathBuf,

    /// Run a single pass and exit.
    #[arg(long)]
    run_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    let settings =
        HydratorSettings::load(args.config.as_deref()).context("failed to read settings")?;
    let mut config = settings.hydrate_config().context("invalid hydrator settings")?;
    if args.run_once {
        config.interval = None;
    }

    let raw = RapidConnector::new_arc(RapidConfig::new(args.rapidapi_key))
        .context("failed to build provider connector")?;
    let gate = Arc::new(QuotaGate::new(settings.quota_config()));
    let connector = ConnectorBuilder::new(raw)
        .with_quota(Arc::clone(&gate))
        .with_retry(Default::default())
        .build();

    let store = SqliteStore::open(&args.database)
        .await
        .with_context(|| format!("failed to open store at {}", args.database.display()))?;
    let hydrator = Arc::new(
        Hydrator::new(Arc::new(store))
            .with_publisher(Arc::new(InMemoryPublisher::new(InMemoryPublisher::DEFAULT_BUFFER))),
    );
    let job = BulkJob::new(connector, hydrator, config).context("invalid bulk job")?;

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; stopping");
            let _ = stop.send(true);
        }
    });

    tracing::info!(
        zips = job.config().zips.len(),
        run_once = job.config().interval.is_none(),
        "hydrator starting"
    );
    job.run(shutdown).await.context("hydrator bulk run failed")?;

    let quota = gate.snapshot();
    tracing::info!(
        limit = quota.limit,
        remaining = quota.remaining,
        "hydrator finished"
    );
    Ok(())
}
