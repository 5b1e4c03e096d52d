use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use std::{fmt::Debug, path::PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use charts_server::background_jobs::jobs::ChartRefreshJob;
use charts_server::background_jobs::{create_scheduler, JobContext};
use charts_server::catalog::{MediaStores, SqliteMediaStore};
use charts_server::charts::{rebuild_channel, ChartBuilder, ItemStatsResolver, SqliteChartStore};
use charts_server::config;
use charts_server::engagement::EngagementService;
use charts_server::realtime::{Broadcaster, ConnectionManager};
use charts_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding media.db and charts.db. Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Minimum seconds between engagement-triggered rebuilds of one chart.
    #[clap(long, default_value_t = 30)]
    pub rebuild_cooldown_secs: u64,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            rebuild_cooldown_secs: args.rebuild_cooldown_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  port: {}", app_config.port);
    info!("  charts: {:?}", app_config.charts);

    info!("Initializing metrics...");
    metrics::init_metrics();

    let media_store = Arc::new(SqliteMediaStore::new(app_config.media_db_path())?);
    let chart_store = Arc::new(SqliteChartStore::new(app_config.charts_db_path())?);
    let stores = MediaStores::new(media_store);

    let connection_manager = Arc::new(ConnectionManager::with_queue_capacity(
        app_config.charts.fanout_queue_capacity(),
    ));
    connection_manager.start().await;

    let chart_builder = Arc::new(ChartBuilder::new(
        stores.clone(),
        chart_store.clone(),
        connection_manager.clone(),
        app_config.charts.clone(),
    ));
    let stats_resolver = Arc::new(ItemStatsResolver::new(
        stores.clone(),
        chart_store,
        chart_builder.scorer(),
        app_config.charts.clone(),
    ));

    let shutdown_token = CancellationToken::new();

    let (rebuild_trigger, rebuild_worker) = rebuild_channel(
        chart_builder.clone(),
        Duration::from_secs(app_config.charts.rebuild_cooldown_secs),
        shutdown_token.child_token(),
    );
    let rebuild_handle = tokio::spawn(rebuild_worker.run());

    let engagement = Arc::new(EngagementService::new(
        stores.clone(),
        rebuild_trigger,
        connection_manager.clone(),
    ));

    let job_context = JobContext::new(
        shutdown_token.child_token(),
        tokio::runtime::Handle::current(),
        chart_builder.clone(),
    );
    let (mut scheduler, scheduler_handle) =
        create_scheduler(shutdown_token.clone(), job_context);
    scheduler
        .register_job(Arc::new(ChartRefreshJob::from_hours(
            app_config.charts.refresh_interval_hours,
        )))
        .await;

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        metrics_port: app_config.metrics_port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
    };
    let state = ServerState::new(
        server_config,
        stores,
        chart_builder,
        stats_resolver,
        engagement,
        connection_manager.clone(),
        scheduler_handle,
    );

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    let result = tokio::select! {
        result = run_server(state, shutdown_token.clone()) => {
            info!("HTTP server stopped: {:?}", result);
            result
        },
        _ = scheduler.run() => {
            info!("Scheduler stopped");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            Ok(())
        }
    };

    shutdown_token.cancel();
    connection_manager.stop().await;
    if tokio::time::timeout(Duration::from_secs(5), rebuild_handle)
        .await
        .is_err()
    {
        info!("Rebuild worker did not stop in time");
    }
    result
}
