use super::models::{
    Author, Comment, CommentThread, EngagementCounts, EngagementSet, Item, NewAuthor, NewComment,
    NewItem,
};
use super::schema::MEDIA_VERSIONED_SCHEMAS;
use super::store::{CatalogStore, CommentStore, EngagementStore};
use super::ContentType;
use crate::charts::IsoWeek;
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Keeps `IN (...)` lists well under SQLite's bound parameter limit.
const BATCH_SIZE: usize = 500;

const COMMENT_COLUMNS: &str = "c.id, c.item_id, c.content_type, c.parent_id, c.user_id, c.body, \
     c.created_at, (SELECT COUNT(*) FROM comment_reactions r WHERE r.comment_id = c.id)";

#[derive(Clone)]
pub struct SqliteMediaStore {
    conn: Arc<Mutex<Connection>>,
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl SqliteMediaStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path, MEDIA_VERSIONED_SCHEMAS, "media")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Media database lock poisoned"))
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            content_type: row.get(1)?,
            title: row.get(2)?,
            author_id: row.get(3)?,
            genre: row.get(4)?,
            release_date: row.get(5)?,
            image_url: row.get(6)?,
            video_url: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn row_to_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: row.get(0)?,
            item_id: row.get(1)?,
            content_type: row.get(2)?,
            parent_id: row.get(3)?,
            user_id: row.get(4)?,
            body: row.get(5)?,
            created_at: row.get(6)?,
            reactions: row.get::<_, i64>(7)? as u64,
        })
    }

    /// Runs `sql` once per id chunk. The query receives `prefix` params first,
    /// then the chunk, and must yield (id, count) rows.
    fn count_by_id(
        conn: &Connection,
        sql_for_placeholders: impl Fn(&str) -> String,
        prefix: &[&dyn ToSql],
        ids: &[String],
    ) -> Result<HashMap<String, u64>> {
        let mut counts = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(BATCH_SIZE) {
            let sql = sql_for_placeholders(&placeholders(chunk.len()));
            let mut stmt = conn.prepare_cached(&sql)?;
            let params = prefix
                .iter()
                .copied()
                .chain(chunk.iter().map(|id| id as &dyn ToSql));
            let rows = stmt.query_map(params_from_iter(params), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            for row in rows {
                let (id, count) = row?;
                counts.insert(id, count);
            }
        }
        Ok(counts)
    }
}

impl CatalogStore for SqliteMediaStore {
    fn create_author(&self, author: NewAuthor) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn()?
            .execute(
                "INSERT INTO authors (id, name, avatar_url, bio) VALUES (?1, ?2, ?3, ?4)",
                params![id, author.name, author.avatar_url, author.bio],
            )
            .context("Failed to insert author")?;
        Ok(id)
    }

    fn get_author(&self, id: &str) -> Result<Option<Author>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT id, name, avatar_url, bio FROM authors WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Author {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        avatar_url: row.get(2)?,
                        bio: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn publish_item(&self, item: NewItem, created_at: i64) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn()?
            .execute(
                "INSERT INTO items (id, content_type, title, author_id, genre, release_date, \
                 image_url, video_url, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    item.content_type,
                    item.title,
                    item.author_id,
                    item.genre,
                    item.release_date,
                    item.image_url,
                    item.video_url,
                    created_at
                ],
            )
            .context("Failed to insert item")?;
        Ok(id)
    }

    fn get_item(&self, content_type: ContentType, id: &str) -> Result<Option<Item>> {
        Ok(self
            .conn()?
            .query_row(
                "SELECT id, content_type, title, author_id, genre, release_date, image_url, \
                 video_url, created_at FROM items WHERE id = ?1 AND content_type = ?2",
                params![id, content_type],
                Self::row_to_item,
            )
            .optional()?)
    }

    fn get_items(&self, content_type: ContentType, ids: &[String]) -> Result<HashMap<String, Item>> {
        let conn = self.conn()?;
        let mut items = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(BATCH_SIZE) {
            let sql = format!(
                "SELECT id, content_type, title, author_id, genre, release_date, image_url, \
                 video_url, created_at FROM items WHERE content_type = ? AND id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let params = std::iter::once(&content_type as &dyn ToSql)
                .chain(chunk.iter().map(|id| id as &dyn ToSql));
            for item in stmt.query_map(params_from_iter(params), Self::row_to_item)? {
                let item = item?;
                items.insert(item.id.clone(), item);
            }
        }
        Ok(items)
    }

    fn get_authors(&self, ids: &[String]) -> Result<HashMap<String, Author>> {
        let conn = self.conn()?;
        let mut authors = HashMap::new();
        for chunk in ids.chunks(BATCH_SIZE) {
            let sql = format!(
                "SELECT id, name, avatar_url, bio FROM authors WHERE id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok(Author {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    avatar_url: row.get(2)?,
                    bio: row.get(3)?,
                })
            })?;
            for author in rows {
                let author = author?;
                authors.insert(author.id.clone(), author);
            }
        }
        Ok(authors)
    }

    fn delete_item(&self, content_type: ContentType, id: &str) -> Result<bool> {
        let deleted = self.conn()?.execute(
            "DELETE FROM items WHERE id = ?1 AND content_type = ?2",
            params![id, content_type],
        )?;
        Ok(deleted > 0)
    }

    fn list_item_ids(
        &self,
        content_type: ContentType,
        created_since: Option<i64>,
    ) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(
            "SELECT id FROM items WHERE content_type = ?1 AND created_at >= ?2 ORDER BY id",
        )?;
        let ids = stmt
            .query_map(
                params![content_type, created_since.unwrap_or(i64::MIN)],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}

impl EngagementStore for SqliteMediaStore {
    fn add_to_set(&self, item_id: &str, set: EngagementSet, user_id: &str) -> Result<bool> {
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO engagement (item_id, kind, user_id) VALUES (?1, ?2, ?3)",
            params![item_id, set.as_str(), user_id],
        )?;
        Ok(inserted > 0)
    }

    fn remove_from_set(&self, item_id: &str, set: EngagementSet, user_id: &str) -> Result<bool> {
        let deleted = self.conn()?.execute(
            "DELETE FROM engagement WHERE item_id = ?1 AND kind = ?2 AND user_id = ?3",
            params![item_id, set.as_str(), user_id],
        )?;
        Ok(deleted > 0)
    }

    fn get_engagement_counts(&self, item_ids: &[String]) -> Result<HashMap<String, EngagementCounts>> {
        let conn = self.conn()?;
        let mut counts: HashMap<String, EngagementCounts> = item_ids
            .iter()
            .map(|id| (id.clone(), EngagementCounts::default()))
            .collect();
        for chunk in item_ids.chunks(BATCH_SIZE) {
            let sql = format!(
                "SELECT item_id, kind, COUNT(*) FROM engagement WHERE item_id IN ({}) \
                 GROUP BY item_id, kind",
                placeholders(chunk.len())
            );
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)? as u64,
                ))
            })?;
            for row in rows {
                let (item_id, kind, count) = row?;
                let entry = counts.entry(item_id).or_default();
                match kind.as_str() {
                    "view" => entry.viewers = count,
                    "like" => entry.likes = count,
                    "download" => entry.downloads = count,
                    "share" => entry.shares = count,
                    _ => {}
                }
            }
        }
        Ok(counts)
    }

    fn increment_week_views(
        &self,
        content_type: ContentType,
        item_id: &str,
        week: &IsoWeek,
    ) -> Result<u64> {
        let views: i64 = self.conn()?.query_row(
            "INSERT INTO view_ledger (item_id, content_type, iso_week, views) \
             VALUES (?1, ?2, ?3, 1) \
             ON CONFLICT(item_id, content_type, iso_week) DO UPDATE SET views = views + 1 \
             RETURNING views",
            params![item_id, content_type, week.to_string()],
            |row| row.get(0),
        )?;
        Ok(views as u64)
    }

    fn get_total_views(
        &self,
        content_type: ContentType,
        item_ids: &[String],
    ) -> Result<HashMap<String, u64>> {
        let conn = self.conn()?;
        Self::count_by_id(
            &conn,
            |p| {
                format!(
                    "SELECT item_id, SUM(views) FROM view_ledger \
                     WHERE content_type = ? AND item_id IN ({}) GROUP BY item_id",
                    p
                )
            },
            &[&content_type as &dyn ToSql],
            item_ids,
        )
    }

    fn get_week_views(
        &self,
        content_type: ContentType,
        item_ids: &[String],
        week: &IsoWeek,
    ) -> Result<HashMap<String, u64>> {
        let conn = self.conn()?;
        let week = week.to_string();
        Self::count_by_id(
            &conn,
            |p| {
                format!(
                    "SELECT item_id, views FROM view_ledger \
                     WHERE content_type = ? AND iso_week = ? AND item_id IN ({})",
                    p
                )
            },
            &[&content_type as &dyn ToSql, &week],
            item_ids,
        )
    }
}

impl CommentStore for SqliteMediaStore {
    fn add_comment(&self, comment: NewComment, created_at: i64) -> Result<Comment> {
        let id = uuid::Uuid::new_v4().to_string();
        self.conn()?
            .execute(
                "INSERT INTO comments (id, item_id, content_type, parent_id, user_id, body, \
                 created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id,
                    comment.item_id,
                    comment.content_type,
                    comment.parent_id,
                    comment.user_id,
                    comment.body,
                    created_at
                ],
            )
            .context("Failed to insert comment")?;
        Ok(Comment {
            id,
            item_id: comment.item_id,
            content_type: comment.content_type,
            parent_id: comment.parent_id,
            user_id: comment.user_id,
            body: comment.body,
            created_at,
            reactions: 0,
        })
    }

    fn get_comment(&self, id: &str) -> Result<Option<Comment>> {
        Ok(self
            .conn()?
            .query_row(
                &format!("SELECT {} FROM comments c WHERE c.id = ?1", COMMENT_COLUMNS),
                params![id],
                Self::row_to_comment,
            )
            .optional()?)
    }

    fn list_comment_threads(
        &self,
        content_type: ContentType,
        item_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommentThread>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM comments c \
             WHERE c.item_id = ?1 AND c.content_type = ?2 AND c.parent_id IS NULL \
             ORDER BY c.created_at DESC, c.rowid DESC LIMIT ?3 OFFSET ?4",
            COMMENT_COLUMNS
        ))?;
        let top_level = stmt
            .query_map(
                params![
                    item_id,
                    content_type,
                    i64::try_from(limit).unwrap_or(i64::MAX),
                    i64::try_from(offset).unwrap_or(i64::MAX)
                ],
                Self::row_to_comment,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if top_level.is_empty() {
            return Ok(Vec::new());
        }

        let parent_ids: Vec<&String> = top_level.iter().map(|c| &c.id).collect();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM comments c WHERE c.parent_id IN ({}) \
             ORDER BY c.created_at ASC, c.rowid ASC",
            COMMENT_COLUMNS,
            placeholders(parent_ids.len())
        ))?;
        let mut replies: HashMap<String, Vec<Comment>> = HashMap::new();
        for reply in stmt.query_map(params_from_iter(parent_ids.iter()), Self::row_to_comment)? {
            let reply = reply?;
            if let Some(parent_id) = reply.parent_id.clone() {
                replies.entry(parent_id).or_default().push(reply);
            }
        }

        Ok(top_level
            .into_iter()
            .map(|comment| CommentThread {
                replies: replies.remove(&comment.id).unwrap_or_default(),
                comment,
            })
            .collect())
    }

    fn count_comments(
        &self,
        content_type: ContentType,
        item_ids: &[String],
    ) -> Result<HashMap<String, u64>> {
        let conn = self.conn()?;
        Self::count_by_id(
            &conn,
            |p| {
                format!(
                    "SELECT item_id, COUNT(*) FROM comments \
                     WHERE content_type = ? AND item_id IN ({}) GROUP BY item_id",
                    p
                )
            },
            &[&content_type as &dyn ToSql],
            item_ids,
        )
    }

    fn set_reaction(&self, comment_id: &str, user_id: &str, active: bool) -> Result<u64> {
        let conn = self.conn()?;
        if active {
            conn.execute(
                "INSERT OR IGNORE INTO comment_reactions (comment_id, user_id) VALUES (?1, ?2)",
                params![comment_id, user_id],
            )?;
        } else {
            conn.execute(
                "DELETE FROM comment_reactions WHERE comment_id = ?1 AND user_id = ?2",
                params![comment_id, user_id],
            )?;
        }
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM comment_reactions WHERE comment_id = ?1",
            params![comment_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
