use super::models::{ChartEntry, ChartHistoryEntry, ChartSnapshot, PriorHistory, SnapshotState};
use super::schema::CHART_VERSIONED_SCHEMAS;
use super::store::ChartStore;
use super::IsoWeek;
use crate::catalog::ChartCategory;
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{anyhow, Context, Result};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, ToSql, TransactionBehavior,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const BATCH_SIZE: usize = 500;

#[derive(Clone)]
pub struct SqliteChartStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChartStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, CHART_VERSIONED_SCHEMAS, "charts")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Charts database lock poisoned"))
    }

    fn load_entries(
        conn: &Connection,
        category: ChartCategory,
        week: &IsoWeek,
    ) -> Result<Vec<ChartEntry>> {
        let mut stmt = conn.prepare_cached(
            "SELECT item_id, rank, peak, weeks_on, last_week FROM chart_entries \
             WHERE category = ?1 AND iso_week = ?2 ORDER BY rank",
        )?;
        let entries = stmt
            .query_map(params![category, week.to_string()], |row| {
                Ok(ChartEntry {
                    item_id: row.get(0)?,
                    rank: row.get(1)?,
                    peak: row.get(2)?,
                    weeks_on: row.get(3)?,
                    last_week: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn load_prior_history(
        conn: &Connection,
        category: ChartCategory,
        before: &IsoWeek,
        item_ids: &[String],
    ) -> Result<HashMap<String, PriorHistory>> {
        let before = before.to_string();
        let mut history = HashMap::new();
        for chunk in item_ids.chunks(BATCH_SIZE) {
            let sql = format!(
                "SELECT item_id, MIN(peak), MAX(weeks_on) FROM chart_entries \
                 WHERE category = ? AND iso_week < ? AND item_id IN ({}) GROUP BY item_id",
                vec!["?"; chunk.len()].join(", ")
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let params = [&category as &dyn ToSql, &before]
                .into_iter()
                .chain(chunk.iter().map(|id| id as &dyn ToSql));
            let rows = stmt.query_map(params_from_iter(params), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    PriorHistory {
                        best_peak: row.get(1)?,
                        weeks_on: row.get(2)?,
                    },
                ))
            })?;
            for row in rows {
                let (id, prior) = row?;
                history.insert(id, prior);
            }
        }
        Ok(history)
    }
}

impl ChartStore for SqliteChartStore {
    fn get_snapshot(&self, category: ChartCategory, week: &IsoWeek) -> Result<Option<ChartSnapshot>> {
        let conn = self.conn()?;
        let header = conn
            .query_row(
                "SELECT created_at, updated_at, build_count FROM chart_snapshots \
                 WHERE category = ?1 AND iso_week = ?2",
                params![category, week.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        let Some((created_at, updated_at, build_count)) = header else {
            return Ok(None);
        };
        Ok(Some(ChartSnapshot {
            category,
            iso_week: *week,
            entries: Self::load_entries(&conn, category, week)?,
            created_at,
            updated_at,
            build_count,
        }))
    }

    fn get_snapshot_state(&self, category: ChartCategory, week: &IsoWeek) -> Result<SnapshotState> {
        let build_count: Option<u32> = self
            .conn()?
            .query_row(
                "SELECT build_count FROM chart_snapshots WHERE category = ?1 AND iso_week = ?2",
                params![category, week.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match build_count {
            Some(n) if n > 0 => SnapshotState::Built,
            _ => SnapshotState::NotBuilt,
        })
    }

    fn get_prior_history(
        &self,
        category: ChartCategory,
        before: &IsoWeek,
        item_ids: &[String],
    ) -> Result<HashMap<String, PriorHistory>> {
        let conn = self.conn()?;
        Self::load_prior_history(&conn, category, before, item_ids)
    }

    fn commit_week(
        &self,
        category: ChartCategory,
        week: &IsoWeek,
        entries: &[ChartEntry],
        now: i64,
    ) -> Result<Vec<ChartEntry>> {
        let mut conn = self.conn()?;
        let week_str = week.to_string();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to start chart commit")?;

        let build_count: u32 = tx.query_row(
            "INSERT INTO chart_snapshots (category, iso_week, created_at, updated_at, build_count) \
             VALUES (?1, ?2, ?3, ?3, 1) \
             ON CONFLICT(category, iso_week) \
             DO UPDATE SET updated_at = excluded.updated_at, build_count = build_count + 1 \
             RETURNING build_count",
            params![category, week_str, now],
            |row| row.get(0),
        )?;
        if build_count == 1 {
            info!("Opened {} chart for week {}", category, week);
        }

        let existing: HashMap<String, ChartEntry> = Self::load_entries(&tx, category, week)?
            .into_iter()
            .map(|e| (e.item_id.clone(), e))
            .collect();
        let newcomers: Vec<String> = entries
            .iter()
            .filter(|e| !existing.contains_key(&e.item_id))
            .map(|e| e.item_id.clone())
            .collect();
        let prior = Self::load_prior_history(&tx, category, week, &newcomers)?;

        let mut committed: Vec<ChartEntry> = entries
            .iter()
            .map(|planned| {
                let mut entry = planned.clone();
                match existing.get(&planned.item_id) {
                    Some(old) => {
                        entry.weeks_on = old.weeks_on;
                        entry.peak = entry.peak.min(old.peak);
                    }
                    None => {
                        let p = prior.get(&planned.item_id).copied().unwrap_or_default();
                        entry.weeks_on = p.weeks_on.unwrap_or(0) + 1;
                        if let Some(best) = p.best_peak {
                            entry.peak = entry.peak.min(best);
                        }
                    }
                }
                entry.peak = entry.peak.min(entry.rank);
                entry
            })
            .collect();
        committed.sort_by_key(|e| e.rank);

        tx.execute(
            "DELETE FROM chart_entries WHERE category = ?1 AND iso_week = ?2",
            params![category, week_str],
        )?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT INTO chart_entries \
                 (category, iso_week, item_id, rank, peak, weeks_on, last_week) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for e in &committed {
                insert
                    .execute(params![
                        category,
                        week_str,
                        e.item_id,
                        e.rank,
                        e.peak,
                        e.weeks_on,
                        e.last_week
                    ])
                    .with_context(|| format!("Failed to store chart entry {}", e.item_id))?;
            }
        }
        tx.commit()?;

        debug!(
            "Committed {} entries to {} chart {} (build {})",
            committed.len(),
            category,
            week,
            build_count
        );
        Ok(committed)
    }

    fn get_item_history(
        &self,
        category: ChartCategory,
        item_id: &str,
        limit: usize,
    ) -> Result<Vec<ChartHistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT iso_week, rank, peak, weeks_on FROM chart_entries \
             WHERE category = ?1 AND item_id = ?2 ORDER BY iso_week DESC LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![category, item_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, u32>(3)?,
            ))
        })?;
        let mut history = Vec::new();
        for row in rows {
            let (week, rank, peak, weeks_on) = row?;
            history.push(ChartHistoryEntry {
                week: week.parse().map_err(|e: String| anyhow!(e))?,
                rank,
                peak,
                weeks_on,
            });
        }
        Ok(history)
    }
}
