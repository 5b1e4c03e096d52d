use super::IsoWeek;
use crate::catalog::ChartCategory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_REGION: &str = "global";

/// Rank used for items with no previous-week position when sorting by it.
pub const UNRANKED_LAST_WEEK: u32 = 999;

/// Display order of a chart. Never changes the stored positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortMode {
    ThisWeek,
    LastWeek,
    #[default]
    AllTime,
}

impl SortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::ThisWeek => "this-week",
            SortMode::LastWeek => "last-week",
            SortMode::AllTime => "all-time",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "this-week" => Ok(SortMode::ThisWeek),
            "last-week" => Ok(SortMode::LastWeek),
            "all-time" => Ok(SortMode::AllTime),
            other => Err(format!("Unknown sort mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartQuery {
    pub category: ChartCategory,
    pub region: String,
    pub sort: SortMode,
    pub limit: usize,
}

impl ChartQuery {
    pub fn new(category: ChartCategory, limit: usize) -> Self {
        Self {
            category,
            region: DEFAULT_REGION.to_string(),
            sort: SortMode::default(),
            limit,
        }
    }
}

/// Transient output of the trending scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingCandidate {
    pub item_id: String,
    pub trending_score: f64,
    /// All-time views from the ledger.
    pub view_count: u64,
    pub likes: u64,
    pub shares: u64,
    pub downloads: u64,
}

/// One item's row in a weekly snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub item_id: String,
    pub rank: u32,
    pub peak: u32,
    pub weeks_on: u32,
    pub last_week: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotState {
    NotBuilt,
    Built,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSnapshot {
    pub category: ChartCategory,
    pub iso_week: IsoWeek,
    /// Ordered by rank.
    pub entries: Vec<ChartEntry>,
    pub created_at: i64,
    pub updated_at: i64,
    pub build_count: u32,
}

/// What the store already knows about an item from weeks before the one
/// being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorHistory {
    pub best_peak: Option<u32>,
    /// `weeks_on` of the item's latest earlier appearance.
    pub weeks_on: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartHistoryEntry {
    pub week: IsoWeek,
    pub rank: u32,
    pub peak: u32,
    pub weeks_on: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartItemStats {
    pub weekly_views: u64,
    pub total_views: u64,
    pub downloads: u64,
    pub likes: u64,
    pub shares: u64,
    pub comments: u64,
}

/// A chart row as served to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartItem {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub position: u32,
    pub last_week: Option<u32>,
    pub peak: u32,
    pub weeks_on: u32,
    pub region: String,
    pub genre: Option<String>,
    pub release_date: Option<String>,
    pub stats: ChartItemStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_mode_round_trips_through_strings() {
        for mode in [SortMode::ThisWeek, SortMode::LastWeek, SortMode::AllTime] {
            assert_eq!(mode.to_string().parse::<SortMode>(), Ok(mode));
        }
        assert_eq!(SortMode::default(), SortMode::AllTime);
        assert!("weekly".parse::<SortMode>().is_err());
    }

    #[test]
    fn chart_item_serializes_camel_case() {
        let item = ChartItem {
            id: "a".into(),
            title: "Song".into(),
            artist: None,
            image: None,
            video_url: None,
            position: 1,
            last_week: None,
            peak: 1,
            weeks_on: 1,
            region: DEFAULT_REGION.into(),
            genre: None,
            release_date: None,
            stats: ChartItemStats::default(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["weeksOn"], 1);
        assert!(json["lastWeek"].is_null());
        assert_eq!(json["stats"]["weeklyViews"], 0);
        assert!(json.get("artist").is_none());
    }
}
