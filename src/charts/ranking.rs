//! Position, peak and weeks-on bookkeeping for a weekly chart.
//!
//! Everything here is pure: the builder loads snapshots and history, this
//! module decides the numbers, and the store commits them.

use super::models::{
    ChartEntry, ChartItem, ChartSnapshot, PriorHistory, SortMode, TrendingCandidate,
    UNRANKED_LAST_WEEK,
};
use std::collections::{HashMap, HashSet};

/// Computes the chart entries for `candidates`, which must be in score order.
///
/// An item already charted this week keeps its rank and its weeks-on count.
/// Other items take their pool position, or the next free rank when that one
/// is held by a sticky item.
pub fn plan_entries(
    candidates: &[TrendingCandidate],
    current: Option<&ChartSnapshot>,
    previous: Option<&ChartSnapshot>,
    history: &HashMap<String, PriorHistory>,
) -> Vec<ChartEntry> {
    let by_item = |snapshot: Option<&ChartSnapshot>| -> HashMap<String, ChartEntry> {
        snapshot
            .map(|s| {
                s.entries
                    .iter()
                    .map(|e| (e.item_id.clone(), e.clone()))
                    .collect()
            })
            .unwrap_or_default()
    };
    let current = by_item(current);
    let previous = by_item(previous);

    let mut taken: HashSet<u32> = candidates
        .iter()
        .filter_map(|c| current.get(&c.item_id).map(|e| e.rank))
        .collect();

    candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            let id = &candidate.item_id;
            let in_current = current.get(id);
            let in_previous = previous.get(id);
            let prior = history.get(id).copied().unwrap_or_default();

            let rank = match in_current {
                Some(entry) => entry.rank,
                None => {
                    let mut rank = index as u32 + 1;
                    while taken.contains(&rank) {
                        rank += 1;
                    }
                    taken.insert(rank);
                    rank
                }
            };

            let peak = [
                Some(rank),
                in_current.map(|e| e.peak),
                in_previous.map(|e| e.peak),
                prior.best_peak,
            ]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(rank);

            let weeks_on = match in_current {
                Some(entry) => entry.weeks_on,
                None => {
                    let latest = prior.weeks_on.max(in_previous.map(|e| e.weeks_on));
                    latest.unwrap_or(0) + 1
                }
            };

            ChartEntry {
                item_id: id.clone(),
                rank,
                peak,
                weeks_on,
                last_week: in_previous.map(|e| e.rank),
            }
        })
        .collect()
}

/// Reorders chart rows for display. Positions are left untouched.
pub fn sort_for_display(items: &mut [ChartItem], sort: SortMode) {
    match sort {
        SortMode::ThisWeek => items.sort_by(|a, b| {
            b.stats
                .weekly_views
                .cmp(&a.stats.weekly_views)
                .then(a.position.cmp(&b.position))
        }),
        SortMode::LastWeek => items.sort_by(|a, b| {
            a.last_week
                .unwrap_or(UNRANKED_LAST_WEEK)
                .cmp(&b.last_week.unwrap_or(UNRANKED_LAST_WEEK))
                .then(a.position.cmp(&b.position))
        }),
        SortMode::AllTime => items.sort_by(|a, b| {
            b.stats
                .total_views
                .cmp(&a.stats.total_views)
                .then(a.position.cmp(&b.position))
        }),
    }
}
