//! Per-item stats with chart context.

use super::models::{ChartHistoryEntry, ChartItemStats};
use super::scorer::TrendingScorer;
use super::store::ChartStore;
use super::{read_or_default, IsoWeek};
use crate::catalog::{Author, CommentThread, ContentType, Item, MediaStores};
use crate::config::ChartSettings;
use crate::sqlite_persistence::run_blocking;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Upper bound for a requested comments page.
pub const MAX_COMMENTS_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemWithStats {
    #[serde(flatten)]
    pub item: Item,
    pub author: Option<Author>,
    pub stats: ChartItemStats,
    pub latest_comments: Vec<CommentThread>,
    /// 1-based rank in the current trending pool.
    pub trending_position: Option<u32>,
    /// Rank in this week's chart, if built and listed.
    pub chart_position: Option<u32>,
    pub chart_history: Vec<ChartHistoryEntry>,
}

pub struct ItemStatsResolver {
    stores: MediaStores,
    charts: Arc<dyn ChartStore>,
    scorer: Arc<TrendingScorer>,
    settings: ChartSettings,
}

impl ItemStatsResolver {
    pub fn new(
        stores: MediaStores,
        charts: Arc<dyn ChartStore>,
        scorer: Arc<TrendingScorer>,
        settings: ChartSettings,
    ) -> Self {
        Self {
            stores,
            charts,
            scorer,
            settings,
        }
    }

    pub async fn get_item_with_stats(
        &self,
        content_type: ContentType,
        item_id: &str,
        page: usize,
        page_size: Option<usize>,
    ) -> Option<ItemWithStats> {
        self.get_item_with_stats_at(content_type, item_id, page, page_size, Utc::now())
            .await
    }

    /// Returns None when the item does not exist. Every other lookup falls
    /// back to an empty value on failure.
    pub async fn get_item_with_stats_at(
        &self,
        content_type: ContentType,
        item_id: &str,
        page: usize,
        page_size: Option<usize>,
        now: DateTime<Utc>,
    ) -> Option<ItemWithStats> {
        let catalog = self.stores.catalog.clone();
        let id = item_id.to_string();
        let item = match run_blocking(move || catalog.get_item(content_type, &id)).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                debug!("{} {} not found", content_type, item_id);
                return None;
            }
            Err(e) => {
                error!("Failed to load {} {}: {:#}", content_type, item_id, e);
                return None;
            }
        };

        let week = IsoWeek::from_datetime(now);
        let category = content_type.category();
        let page_size = page_size
            .unwrap_or(self.settings.comments_page_size)
            .clamp(1, MAX_COMMENTS_PAGE_SIZE);
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let ids = vec![item.id.clone()];

        let author = {
            let catalog = self.stores.catalog.clone();
            let author_id = item.author_id.clone();
            read_or_default("item author", move || match author_id {
                Some(id) if content_type.descriptor().has_artist => catalog.get_author(&id),
                _ => Ok(None),
            })
        };
        let counts = {
            let engagement = self.stores.engagement.clone();
            let ids = ids.clone();
            read_or_default("engagement counts", move || {
                engagement.get_engagement_counts(&ids)
            })
        };
        let total_views = {
            let engagement = self.stores.engagement.clone();
            let ids = ids.clone();
            read_or_default("total views", move || {
                engagement.get_total_views(content_type, &ids)
            })
        };
        let weekly_views = {
            let engagement = self.stores.engagement.clone();
            let ids = ids.clone();
            read_or_default("weekly views", move || {
                engagement.get_week_views(content_type, &ids, &week)
            })
        };
        let comment_count = {
            let comments = self.stores.comments.clone();
            let ids = ids.clone();
            read_or_default("comment count", move || {
                comments.count_comments(content_type, &ids)
            })
        };
        let latest_comments = {
            let comments = self.stores.comments.clone();
            let id = item.id.clone();
            read_or_default("latest comments", move || {
                comments.list_comment_threads(content_type, &id, page_size, offset)
            })
        };
        let trending_position = {
            let scorer = self.scorer.clone();
            let id = item.id.clone();
            let lookback_days = self.settings.lookback_days;
            read_or_default("trending position", move || {
                scorer.rank_of(content_type, &id, lookback_days, now)
            })
        };
        let chart_position = {
            let charts = self.charts.clone();
            let id = item.id.clone();
            read_or_default("chart position", move || {
                Ok(charts
                    .get_snapshot(category, &week)?
                    .and_then(|s| s.entries.into_iter().find(|e| e.item_id == id))
                    .map(|e| e.rank))
            })
        };
        let chart_history = {
            let charts = self.charts.clone();
            let id = item.id.clone();
            let limit = self.settings.history_weeks;
            read_or_default("chart history", move || {
                charts.get_item_history(category, &id, limit)
            })
        };

        let (
            author,
            counts,
            total_views,
            weekly_views,
            comment_count,
            latest_comments,
            trending_position,
            chart_position,
            chart_history,
        ) = tokio::join!(
            author,
            counts,
            total_views,
            weekly_views,
            comment_count,
            latest_comments,
            trending_position,
            chart_position,
            chart_history,
        );

        let counts = counts.get(&item.id).copied().unwrap_or_default();
        let stats = ChartItemStats {
            weekly_views: weekly_views.get(&item.id).copied().unwrap_or(0),
            total_views: total_views.get(&item.id).copied().unwrap_or(0),
            downloads: counts.downloads,
            likes: counts.likes,
            shares: counts.shares,
            comments: comment_count.get(&item.id).copied().unwrap_or(0),
        };

        Some(ItemWithStats {
            item,
            author,
            stats,
            latest_comments,
            trending_position,
            chart_position,
            chart_history,
        })
    }
}
