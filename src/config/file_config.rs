use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    pub charts: Option<ChartsConfig>,
}

/// `[charts]` table. Every key is optional.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ChartsConfig {
    pub pool_size: Option<usize>,
    pub lookback_days: Option<u32>,
    pub default_limit: Option<usize>,
    pub history_weeks: Option<usize>,
    pub rebuild_cooldown_secs: Option<u64>,
    pub refresh_interval_hours: Option<u64>,
    pub comments_page_size: Option<usize>,
    pub like_weight: Option<f64>,
    pub share_weight: Option<f64>,
    pub download_weight: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
