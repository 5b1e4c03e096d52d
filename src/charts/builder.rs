//! Builds a category chart: score, merge with the week's snapshot, persist,
//! enrich for display and fan out.

use super::models::{ChartItem, ChartItemStats, ChartQuery, TrendingCandidate, DEFAULT_REGION};
use super::ranking::{plan_entries, sort_for_display};
use super::scorer::TrendingScorer;
use super::store::ChartStore;
use super::{read_or_default, IsoWeek};
use crate::catalog::{ChartCategory, MediaStores};
use crate::config::ChartSettings;
use crate::realtime::messages::charts::{CategoryUpdate, ItemPositionUpdate};
use crate::realtime::{msg_types, BroadcastTarget, Broadcaster, ServerMessage};
use crate::server::metrics;
use crate::sqlite_persistence::run_blocking;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

pub struct ChartBuilder {
    stores: MediaStores,
    charts: Arc<dyn ChartStore>,
    scorer: Arc<TrendingScorer>,
    broadcaster: Arc<dyn Broadcaster>,
    settings: ChartSettings,
}

impl ChartBuilder {
    pub fn new(
        stores: MediaStores,
        charts: Arc<dyn ChartStore>,
        broadcaster: Arc<dyn Broadcaster>,
        settings: ChartSettings,
    ) -> Self {
        let scorer = Arc::new(TrendingScorer::new(
            stores.catalog.clone(),
            stores.engagement.clone(),
            settings.weights,
        ));
        Self {
            stores,
            charts,
            scorer,
            broadcaster,
            settings,
        }
    }

    pub fn scorer(&self) -> Arc<TrendingScorer> {
        self.scorer.clone()
    }

    pub fn settings(&self) -> &ChartSettings {
        &self.settings
    }

    /// Requested chart length, clamped to 1..=pool_size.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.default_limit)
            .clamp(1, self.settings.pool_size)
    }

    pub async fn build_chart(&self, query: &ChartQuery) -> Vec<ChartItem> {
        self.build_chart_at(query, Utc::now()).await
    }

    /// Never fails: a build that cannot score its pool yields an empty chart
    /// and persists nothing.
    pub async fn build_chart_at(&self, query: &ChartQuery, now: DateTime<Utc>) -> Vec<ChartItem> {
        let started = Instant::now();
        let category = query.category;
        match self.build(query, now).await {
            Ok(items) => {
                let elapsed = started.elapsed();
                info!(
                    "Built {} chart: {} items in {}ms",
                    category,
                    items.len(),
                    elapsed.as_millis()
                );
                metrics::record_chart_build(category.as_str(), "ok", elapsed);
                items
            }
            Err(e) => {
                error!("Failed to build {} chart: {:#}", category, e);
                metrics::record_chart_build(category.as_str(), "failed", started.elapsed());
                Vec::new()
            }
        }
    }

    async fn build(&self, query: &ChartQuery, now: DateTime<Utc>) -> Result<Vec<ChartItem>> {
        let category = query.category;
        let content_type = category.content_type();
        let week = IsoWeek::from_datetime(now);
        let last_week = week.previous();

        let scorer = self.scorer.clone();
        let lookback_days = self.settings.lookback_days;
        let pool_size = self.settings.pool_size;
        let charts = self.charts.clone();
        let previous_charts = self.charts.clone();
        let (candidates, current, previous) = tokio::join!(
            run_blocking(move || scorer.compute_trending(
                content_type,
                lookback_days,
                pool_size,
                now
            )),
            read_or_default("current snapshot", move || charts
                .get_snapshot(category, &week)),
            read_or_default("previous snapshot", move || previous_charts
                .get_snapshot(category, &last_week)),
        );
        let candidates = candidates.context("Trending scorer failed")?;
        if candidates.is_empty() {
            debug!("No {} to chart", content_type);
            return Ok(Vec::new());
        }

        let ids: Vec<String> = candidates.iter().map(|c| c.item_id.clone()).collect();
        let (week_views, history, items, comment_counts) = {
            let engagement = self.stores.engagement.clone();
            let charts = self.charts.clone();
            let catalog = self.stores.catalog.clone();
            let comments = self.stores.comments.clone();
            let (ids1, ids2, ids3, ids4) = (ids.clone(), ids.clone(), ids.clone(), ids);
            tokio::join!(
                read_or_default("weekly views", move || engagement
                    .get_week_views(content_type, &ids1, &week)),
                read_or_default("chart history", move || charts
                    .get_prior_history(category, &week, &ids2)),
                run_blocking(move || catalog.get_items(content_type, &ids3)),
                read_or_default("comment counts", move || comments
                    .count_comments(content_type, &ids4)),
            )
        };
        // Without the items there is nothing to show, so the build fails as a whole.
        let items = items.context("Failed to load chart items")?;

        let planned = plan_entries(&candidates, current.as_ref(), previous.as_ref(), &history);
        let charts = self.charts.clone();
        let to_commit = planned.clone();
        let committed = match run_blocking(move || {
            charts.commit_week(category, &week, &to_commit, now.timestamp())
        })
        .await
        {
            Ok(committed) => committed,
            Err(e) => {
                error!(
                    "Failed to persist {} chart for week {}, serving unsaved entries: {:#}",
                    category, week, e
                );
                planned
            }
        };

        let descriptor = content_type.descriptor();
        let authors = if descriptor.has_artist {
            let mut author_ids: Vec<String> =
                items.values().filter_map(|i| i.author_id.clone()).collect();
            author_ids.sort();
            author_ids.dedup();
            let catalog = self.stores.catalog.clone();
            read_or_default("chart authors", move || catalog.get_authors(&author_ids)).await
        } else {
            HashMap::new()
        };

        let by_id: HashMap<&str, &TrendingCandidate> = candidates
            .iter()
            .map(|c| (c.item_id.as_str(), c))
            .collect();
        let mut chart: Vec<ChartItem> = committed
            .iter()
            .filter_map(|entry| {
                // Deleted since it was scored.
                let item = items.get(&entry.item_id)?;
                let candidate = by_id.get(entry.item_id.as_str());
                let artist = if descriptor.has_artist {
                    item.author_id
                        .as_ref()
                        .and_then(|id| authors.get(id))
                        .map(|a| a.name.clone())
                } else {
                    None
                };
                Some(ChartItem {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    artist,
                    image: item.image_url.clone(),
                    video_url: if descriptor.has_video_url {
                        item.video_url.clone()
                    } else {
                        None
                    },
                    position: entry.rank,
                    last_week: entry.last_week,
                    peak: entry.peak,
                    weeks_on: entry.weeks_on,
                    region: DEFAULT_REGION.to_string(),
                    genre: item.genre.clone(),
                    release_date: item.release_date.clone(),
                    stats: ChartItemStats {
                        weekly_views: week_views.get(&item.id).copied().unwrap_or(0),
                        total_views: candidate.map(|c| c.view_count).unwrap_or(0),
                        downloads: candidate.map(|c| c.downloads).unwrap_or(0),
                        likes: candidate.map(|c| c.likes).unwrap_or(0),
                        shares: candidate.map(|c| c.shares).unwrap_or(0),
                        comments: comment_counts.get(&item.id).copied().unwrap_or(0),
                    },
                })
            })
            .collect();

        // Subscribers get the same chart whatever the request asked for.
        chart.sort_by_key(|item| item.position);
        let published = self.settings.default_limit.min(chart.len());
        self.fan_out(category, &chart[..published]).await;

        sort_for_display(&mut chart, query.sort);
        chart.truncate(query.limit);
        for item in &mut chart {
            item.region.clone_from(&query.region);
        }
        Ok(chart)
    }

    async fn fan_out(&self, category: ChartCategory, items: &[ChartItem]) {
        match ServerMessage::try_new(
            msg_types::CHARTS_UPDATE_CATEGORY,
            CategoryUpdate { category, items },
        ) {
            Ok(message) => {
                self.broadcaster.publish(BroadcastTarget::All, message).await;
            }
            Err(e) => error!("Failed to encode {} chart update: {}", category, e),
        }

        for item in items {
            match ServerMessage::try_new(
                msg_types::CHARTS_UPDATE_ITEM,
                ItemPositionUpdate {
                    id: &item.id,
                    new_pos: item.position,
                },
            ) {
                Ok(message) => {
                    self.broadcaster.publish(BroadcastTarget::All, message).await;
                }
                Err(e) => error!("Failed to encode position of {}: {}", item.id, e),
            }
        }
    }
}
