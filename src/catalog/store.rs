use super::models::{
    Author, Comment, CommentThread, EngagementCounts, EngagementSet, Item, NewAuthor, NewComment,
    NewItem,
};
use super::ContentType;
use crate::charts::IsoWeek;
use anyhow::Result;
use std::collections::HashMap;

pub trait CatalogStore: Send + Sync {
    /// Creates an author profile and returns its id.
    fn create_author(&self, author: NewAuthor) -> Result<String>;

    /// Returns Ok(None) if the author does not exist.
    fn get_author(&self, id: &str) -> Result<Option<Author>>;

    /// Publishes an item and returns its id.
    /// Fails if `author_id` is set and does not exist.
    fn publish_item(&self, item: NewItem, created_at: i64) -> Result<String>;

    /// Returns Ok(None) if no item of this type has the given id.
    fn get_item(&self, content_type: ContentType, id: &str) -> Result<Option<Item>>;

    /// Batch lookup. Ids without a matching item are absent from the result.
    fn get_items(&self, content_type: ContentType, ids: &[String]) -> Result<HashMap<String, Item>>;

    /// Batch author lookup, keyed by author id.
    fn get_authors(&self, ids: &[String]) -> Result<HashMap<String, Author>>;

    /// Deletes an item together with its engagement sets and comments.
    /// Returns false if the item did not exist.
    fn delete_item(&self, content_type: ContentType, id: &str) -> Result<bool>;

    /// Ids of all items of a type, optionally only those created at or after
    /// `created_since` (unix seconds).
    fn list_item_ids(&self, content_type: ContentType, created_since: Option<i64>)
        -> Result<Vec<String>>;
}

pub trait EngagementStore: Send + Sync {
    /// Adds the user to one of the item's engagement sets.
    /// Returns true if the user was not already a member.
    fn add_to_set(&self, item_id: &str, set: EngagementSet, user_id: &str) -> Result<bool>;

    /// Removes the user from one of the item's engagement sets.
    /// Returns false if the user was not a member.
    fn remove_from_set(&self, item_id: &str, set: EngagementSet, user_id: &str) -> Result<bool>;

    /// Set sizes per item. Items with no engagement map to zero counts.
    fn get_engagement_counts(&self, item_ids: &[String]) -> Result<HashMap<String, EngagementCounts>>;

    /// Increments the view ledger entry for (item, content type, week),
    /// creating it on first view. Returns the week's new count.
    fn increment_week_views(
        &self,
        content_type: ContentType,
        item_id: &str,
        week: &IsoWeek,
    ) -> Result<u64>;

    /// Sum of every ledger week per item.
    fn get_total_views(&self, content_type: ContentType, item_ids: &[String])
        -> Result<HashMap<String, u64>>;

    /// Ledger count of a single week per item.
    fn get_week_views(
        &self,
        content_type: ContentType,
        item_ids: &[String],
        week: &IsoWeek,
    ) -> Result<HashMap<String, u64>>;
}

pub trait CommentStore: Send + Sync {
    fn add_comment(&self, comment: NewComment, created_at: i64) -> Result<Comment>;

    /// Returns Ok(None) if the comment does not exist.
    fn get_comment(&self, id: &str) -> Result<Option<Comment>>;

    /// Top-level comments newest first, each with its replies oldest first.
    fn list_comment_threads(
        &self,
        content_type: ContentType,
        item_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CommentThread>>;

    /// Number of comments per item, replies included.
    fn count_comments(&self, content_type: ContentType, item_ids: &[String])
        -> Result<HashMap<String, u64>>;

    /// Adds or removes the user's reaction. Returns the comment's reaction count.
    fn set_reaction(&self, comment_id: &str, user_id: &str, active: bool) -> Result<u64>;
}

/// Combined store for the media database.
pub trait FullMediaStore: CatalogStore + EngagementStore + CommentStore {}

impl<T: CatalogStore + EngagementStore + CommentStore> FullMediaStore for T {}
