use super::models::{ChartEntry, ChartHistoryEntry, ChartSnapshot, PriorHistory, SnapshotState};
use super::IsoWeek;
use crate::catalog::ChartCategory;
use anyhow::Result;
use std::collections::HashMap;

pub trait ChartStore: Send + Sync {
    /// Returns Ok(None) if no chart was built for that week.
    fn get_snapshot(&self, category: ChartCategory, week: &IsoWeek) -> Result<Option<ChartSnapshot>>;

    fn get_snapshot_state(&self, category: ChartCategory, week: &IsoWeek) -> Result<SnapshotState>;

    /// Best peak and latest weeks-on per item over all weeks before `before`.
    /// Items that never charted are absent.
    fn get_prior_history(
        &self,
        category: ChartCategory,
        before: &IsoWeek,
        item_ids: &[String],
    ) -> Result<HashMap<String, PriorHistory>>;

    /// Atomically replaces the entries of (category, week) with `entries`.
    ///
    /// Items already charted that week keep their weeks-on count and never
    /// get a worse peak. Items new to the week get one more week than their
    /// latest earlier appearance. Returns the committed entries by rank.
    fn commit_week(
        &self,
        category: ChartCategory,
        week: &IsoWeek,
        entries: &[ChartEntry],
        now: i64,
    ) -> Result<Vec<ChartEntry>>;

    /// Most recent weeks first.
    fn get_item_history(
        &self,
        category: ChartCategory,
        item_id: &str,
        limit: usize,
    ) -> Result<Vec<ChartHistoryEntry>>;
}
