use super::ContentType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAuthor {
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

/// A published song, album or video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub content_type: ContentType,
    pub title: String,
    pub author_id: Option<String>,
    pub genre: Option<String>,
    pub release_date: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    /// Unix seconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub content_type: ContentType,
    pub title: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl NewItem {
    pub fn new(content_type: ContentType, title: impl Into<String>) -> Self {
        Self {
            content_type,
            title: title.into(),
            author_id: None,
            genre: None,
            release_date: None,
            image_url: None,
            video_url: None,
        }
    }
}

/// A per-item set of acting users. Membership is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngagementSet {
    Viewers,
    Likes,
    Downloads,
    Shares,
}

impl EngagementSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementSet::Viewers => "view",
            EngagementSet::Likes => "like",
            EngagementSet::Downloads => "download",
            EngagementSet::Shares => "share",
        }
    }
}

/// Sizes of an item's membership sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementCounts {
    pub likes: u64,
    pub shares: u64,
    pub downloads: u64,
    /// Distinct users who viewed the item, not the view count.
    pub viewers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub item_id: String,
    pub content_type: ContentType,
    pub parent_id: Option<String>,
    pub user_id: String,
    pub body: String,
    pub created_at: i64,
    pub reactions: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content_type: ContentType,
    pub item_id: String,
    pub user_id: String,
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// A top-level comment and its direct replies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<Comment>,
}
