mod file_config;

pub use file_config::{ChartsConfig, FileConfig};

use crate::charts::ScoreWeights;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI values that a TOML config file may override.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub rebuild_cooldown_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub charts: ChartSettings,
}

/// Tuning of chart computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSettings {
    /// Candidates scored per build; the upper bound for a chart's length.
    pub pool_size: usize,
    pub lookback_days: u32,
    pub default_limit: usize,
    /// Weeks of chart history attached to an item's stats.
    pub history_weeks: usize,
    /// Minimum gap between engagement-triggered rebuilds of one category.
    pub rebuild_cooldown_secs: u64,
    pub refresh_interval_hours: u64,
    pub comments_page_size: usize,
    pub weights: ScoreWeights,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            pool_size: 200,
            lookback_days: 365,
            default_limit: 50,
            history_weeks: 12,
            rebuild_cooldown_secs: 30,
            refresh_interval_hours: 6,
            comments_page_size: 10,
            weights: ScoreWeights::default(),
        }
    }
}

impl ChartSettings {
    /// Outgoing queue length per websocket connection. One build publishes
    /// a category event plus one event per item, and this leaves room for
    /// two back-to-back builds of the longest possible chart.
    pub fn fanout_queue_capacity(&self) -> usize {
        2 * (self.pool_size + 1)
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port && port != 0 {
            bail!("port and metrics_port must differ (both are {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());
        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let defaults = ChartSettings::default();
        let charts_file = file.charts.unwrap_or_default();
        let charts = ChartSettings {
            pool_size: charts_file.pool_size.unwrap_or(defaults.pool_size),
            lookback_days: charts_file.lookback_days.unwrap_or(defaults.lookback_days),
            default_limit: charts_file.default_limit.unwrap_or(defaults.default_limit),
            history_weeks: charts_file.history_weeks.unwrap_or(defaults.history_weeks),
            rebuild_cooldown_secs: charts_file
                .rebuild_cooldown_secs
                .unwrap_or(cli.rebuild_cooldown_secs),
            refresh_interval_hours: charts_file
                .refresh_interval_hours
                .unwrap_or(defaults.refresh_interval_hours),
            comments_page_size: charts_file
                .comments_page_size
                .unwrap_or(defaults.comments_page_size),
            weights: ScoreWeights {
                like: charts_file.like_weight.unwrap_or(defaults.weights.like),
                share: charts_file.share_weight.unwrap_or(defaults.weights.share),
                download: charts_file
                    .download_weight
                    .unwrap_or(defaults.weights.download),
            },
        };
        if charts.pool_size == 0 {
            bail!("charts.pool_size must be positive");
        }
        if charts.default_limit == 0 || charts.default_limit > charts.pool_size {
            bail!(
                "charts.default_limit must be between 1 and pool_size ({})",
                charts.pool_size
            );
        }
        if charts.refresh_interval_hours == 0 {
            bail!("charts.refresh_interval_hours must be positive");
        }

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            charts,
        })
    }

    pub fn media_db_path(&self) -> PathBuf {
        self.db_dir.join("media.db")
    }

    pub fn charts_db_path(&self) -> PathBuf {
        self.db_dir.join("charts.db")
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
