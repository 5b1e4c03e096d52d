use super::TrendingCandidate;
use crate::catalog::{CatalogStore, ContentType, EngagementStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Multipliers applied to engagement sets. Views always weigh 1.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub like: f64,
    pub share: f64,
    pub download: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            like: 2.0,
            share: 3.0,
            download: 1.5,
        }
    }
}

impl ScoreWeights {
    pub fn score(&self, views: u64, likes: u64, shares: u64, downloads: u64) -> f64 {
        views as f64
            + likes as f64 * self.like
            + shares as f64 * self.share
            + downloads as f64 * self.download
    }
}

/// Highest score first; equal scores fall back to ascending item id.
pub fn rank_candidates(candidates: &mut [TrendingCandidate]) {
    candidates.sort_by(|a, b| {
        b.trending_score
            .partial_cmp(&a.trending_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
}

pub struct TrendingScorer {
    catalog: Arc<dyn CatalogStore>,
    engagement: Arc<dyn EngagementStore>,
    weights: ScoreWeights,
}

impl TrendingScorer {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        engagement: Arc<dyn EngagementStore>,
        weights: ScoreWeights,
    ) -> Self {
        Self {
            catalog,
            engagement,
            weights,
        }
    }

    /// Scores every item in the pool, best first, truncated to `limit`.
    ///
    /// The pool is the items created in the last `lookback_days`. When that
    /// window holds nothing, the whole catalog of the type is used instead so a
    /// quiet catalog still gets a chart.
    pub fn compute_trending(
        &self,
        content_type: ContentType,
        lookback_days: u32,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendingCandidate>> {
        let mut candidates = self.score_pool(content_type, lookback_days, now)?;
        candidates.truncate(limit);
        Ok(candidates)
    }

    /// 1-based rank of `item_id` in the untruncated pool.
    pub fn rank_of(
        &self,
        content_type: ContentType,
        item_id: &str,
        lookback_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<u32>> {
        Ok(self
            .score_pool(content_type, lookback_days, now)?
            .iter()
            .position(|c| c.item_id == item_id)
            .map(|index| index as u32 + 1))
    }

    fn score_pool(
        &self,
        content_type: ContentType,
        lookback_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<TrendingCandidate>> {
        let since = (now - Duration::days(lookback_days as i64)).timestamp();
        let mut ids = self
            .catalog
            .list_item_ids(content_type, Some(since))
            .context("Failed to list trending pool")?;
        if ids.is_empty() {
            debug!(
                "No {} created in the last {} days, scoring the whole catalog",
                content_type, lookback_days
            );
            ids = self
                .catalog
                .list_item_ids(content_type, None)
                .context("Failed to list catalog")?;
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let counts = self
            .engagement
            .get_engagement_counts(&ids)
            .context("Failed to load engagement counts")?;
        let views = self
            .engagement
            .get_total_views(content_type, &ids)
            .context("Failed to load view totals")?;

        let mut candidates: Vec<TrendingCandidate> = ids
            .into_iter()
            .map(|item_id| {
                let c = counts.get(&item_id).copied().unwrap_or_default();
                let view_count = views.get(&item_id).copied().unwrap_or(0);
                TrendingCandidate {
                    trending_score: self
                        .weights
                        .score(view_count, c.likes, c.shares, c.downloads),
                    view_count,
                    likes: c.likes,
                    shares: c.shares,
                    downloads: c.downloads,
                    item_id,
                }
            })
            .collect();
        rank_candidates(&mut candidates);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EngagementSet, NewItem, SqliteMediaStore};
    use crate::charts::IsoWeek;
    use tempfile::TempDir;

    struct Fixture {
        store: Arc<SqliteMediaStore>,
        scorer: TrendingScorer,
        now: DateTime<Utc>,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteMediaStore::new(dir.path().join("media.db")).unwrap());
        let scorer = TrendingScorer::new(store.clone(), store.clone(), ScoreWeights::default());
        Fixture {
            store,
            scorer,
            now: DateTime::parse_from_rfc3339("2025-03-05T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            _dir: dir,
        }
    }

    impl Fixture {
        fn song(&self, title: &str, days_ago: i64) -> String {
            let created = (self.now - Duration::days(days_ago)).timestamp();
            self.store
                .publish_item(NewItem::new(ContentType::Song, title), created)
                .unwrap()
        }

        fn views(&self, id: &str, n: u64) {
            let week = IsoWeek::from_datetime(self.now);
            for _ in 0..n {
                self.store
                    .increment_week_views(ContentType::Song, id, &week)
                    .unwrap();
            }
        }

        fn engage(&self, id: &str, set: EngagementSet, users: u64) {
            for u in 0..users {
                self.store.add_to_set(id, set, &format!("user-{}", u)).unwrap();
            }
        }
    }

    #[test]
    fn default_weights_shape() {
        let w = ScoreWeights::default();
        assert_eq!(w.score(1000, 10, 1, 5), 1030.5);
        assert_eq!(w.score(900, 50, 10, 0), 1030.0);
    }

    #[test]
    fn likes_can_outrank_raw_views() {
        let f = fixture();
        let a = f.song("A", 1);
        let b = f.song("B", 1);
        f.views(&a, 100);
        f.views(&b, 50);
        f.engage(&b, EngagementSet::Likes, 30);

        let ranked = f
            .scorer
            .compute_trending(ContentType::Song, 365, 200, f.now)
            .unwrap();
        assert_eq!(ranked[0].item_id, b);
        assert_eq!(ranked[0].trending_score, 110.0);
        assert_eq!(ranked[1].item_id, a);
        assert_eq!(ranked[1].trending_score, 100.0);
        assert_eq!(ranked[0].view_count, 50);
    }

    #[test]
    fn falls_back_to_whole_catalog_when_window_is_empty() {
        let f = fixture();
        let old = f.song("Old", 400);
        f.views(&old, 3);

        let ranked = f
            .scorer
            .compute_trending(ContentType::Song, 365, 200, f.now)
            .unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].item_id, old);

        let recent = f.song("Recent", 2);
        let ranked = f
            .scorer
            .compute_trending(ContentType::Song, 365, 200, f.now)
            .unwrap();
        let ids: Vec<&str> = ranked.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(ids, vec![recent.as_str()]);
    }

    #[test]
    fn empty_catalog_yields_empty_pool() {
        let f = fixture();
        assert!(f
            .scorer
            .compute_trending(ContentType::Album, 365, 10, f.now)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn ties_break_by_item_id_and_limit_truncates() {
        let mut candidates: Vec<TrendingCandidate> = ["c", "a", "b"]
            .iter()
            .map(|id| TrendingCandidate {
                item_id: id.to_string(),
                trending_score: 5.0,
                view_count: 5,
                likes: 0,
                shares: 0,
                downloads: 0,
            })
            .collect();
        rank_candidates(&mut candidates);
        let ids: Vec<&str> = candidates.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let f = fixture();
        for i in 0..5 {
            f.song(&format!("S{}", i), 1);
        }
        let pool = f
            .scorer
            .compute_trending(ContentType::Song, 365, 3, f.now)
            .unwrap();
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn rank_of_locates_item_in_pool() {
        let f = fixture();
        let a = f.song("A", 1);
        let b = f.song("B", 1);
        f.views(&b, 2);

        assert_eq!(
            f.scorer.rank_of(ContentType::Song, &b, 365, f.now).unwrap(),
            Some(1)
        );
        assert_eq!(
            f.scorer.rank_of(ContentType::Song, &a, 365, f.now).unwrap(),
            Some(2)
        );
        assert_eq!(
            f.scorer
                .rank_of(ContentType::Song, "missing", 365, f.now)
                .unwrap(),
            None
        );
    }
}
