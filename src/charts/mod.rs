mod builder;
mod iso_week;
mod models;
mod ranking;
mod schema;
mod scorer;
mod sqlite_chart_store;
mod stats;
mod store;
mod trigger;

pub use builder::ChartBuilder;
pub use iso_week::IsoWeek;
pub use models::{
    ChartEntry, ChartHistoryEntry, ChartItem, ChartItemStats, ChartQuery, ChartSnapshot,
    PriorHistory, SnapshotState, SortMode, TrendingCandidate, DEFAULT_REGION, UNRANKED_LAST_WEEK,
};
pub use ranking::{plan_entries, sort_for_display};
pub use scorer::{rank_candidates, ScoreWeights, TrendingScorer};
pub use sqlite_chart_store::SqliteChartStore;
pub use stats::{ItemStatsResolver, ItemWithStats};
pub use store::ChartStore;
pub use trigger::{rebuild_channel, ChartRebuildTrigger, RebuildGate, RebuildReason, RebuildWorker};

use crate::sqlite_persistence::run_blocking;
use anyhow::Result;
use tracing::warn;

/// Runs a store read that is allowed to fail, substituting the default.
async fn read_or_default<T, F>(what: &str, f: F) -> T
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Default + Send + 'static,
{
    match run_blocking(f).await {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to load {}, using defaults: {:#}", what, e);
            T::default()
        }
    }
}
