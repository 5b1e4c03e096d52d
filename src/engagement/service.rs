use super::{InteractionError, InteractionKind};
use crate::catalog::{Comment, ContentType, Item, MediaStores, NewComment};
use crate::charts::{ChartRebuildTrigger, IsoWeek};
use crate::realtime::messages::comments::{CommentAdded, CommentReaction};
use crate::realtime::{item_room, msg_types, BroadcastTarget, Broadcaster, ServerMessage};
use crate::server::metrics;
use crate::sqlite_persistence::run_blocking;
use chrono::Utc;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

pub const MAX_COMMENT_LENGTH: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionOutcome {
    pub success: bool,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentReactionOutcome {
    pub comment_id: String,
    pub reactions: u64,
}

pub struct EngagementService {
    stores: MediaStores,
    trigger: ChartRebuildTrigger,
    broadcaster: Arc<dyn Broadcaster>,
}

impl EngagementService {
    pub fn new(
        stores: MediaStores,
        trigger: ChartRebuildTrigger,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            stores,
            trigger,
            broadcaster,
        }
    }

    /// Records one interaction and asks for a chart rebuild.
    ///
    /// Views bump the current week's ledger every time. Likes, downloads and
    /// shares are set memberships, so repeating one is a successful no-op.
    pub async fn record_interaction(
        &self,
        item_id: &str,
        content_type: &str,
        kind: &str,
        user_id: Option<&str>,
    ) -> Result<InteractionOutcome, InteractionError> {
        let item_id = parse_item_id(item_id)?;
        let content_type = parse_content_type(content_type)?;
        let kind = InteractionKind::from_str(kind).map_err(|_| InteractionError::UnsupportedKind {
            kind: kind.to_string(),
            content_type: content_type.to_string(),
        })?;
        if !content_type.supports(kind) {
            return Err(InteractionError::UnsupportedKind {
                kind: kind.to_string(),
                content_type: content_type.to_string(),
            });
        }
        let user_id = user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        if kind.requires_user() && user_id.is_none() {
            return Err(InteractionError::MissingUser(kind.as_str()));
        }

        self.require_item(content_type, &item_id).await?;

        let engagement = self.stores.engagement.clone();
        let set = kind.engagement_set();
        let id = item_id.clone();
        run_blocking(move || {
            match (kind, user_id.as_deref()) {
                (InteractionKind::View, user) => {
                    engagement.increment_week_views(content_type, &id, &IsoWeek::current())?;
                    if let Some(user) = user {
                        engagement.add_to_set(&id, set, user)?;
                    }
                }
                (InteractionKind::Unlike, Some(user)) => {
                    engagement.remove_from_set(&id, set, user)?;
                }
                (_, Some(user)) => {
                    engagement.add_to_set(&id, set, user)?;
                }
                (_, None) => {}
            }
            Ok(())
        })
        .await?;

        debug!("Recorded {} on {} {}", kind, content_type, item_id);
        metrics::record_interaction(content_type.as_str(), kind.as_str());
        self.trigger
            .request(content_type.category(), kind.rebuild_reason());

        Ok(InteractionOutcome {
            success: true,
            action: kind.action().to_string(),
        })
    }

    /// Adds a comment or a reply to a top-level comment of the same item.
    pub async fn add_comment(
        &self,
        content_type: &str,
        item_id: &str,
        user_id: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<Comment, InteractionError> {
        let content_type = parse_content_type(content_type)?;
        let item_id = parse_item_id(item_id)?;
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(InteractionError::MissingUser("comment"));
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(InteractionError::InvalidComment("body is empty".into()));
        }
        if body.chars().count() > MAX_COMMENT_LENGTH {
            return Err(InteractionError::InvalidComment(format!(
                "body exceeds {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        self.require_item(content_type, &item_id).await?;

        if let Some(parent_id) = parent_id {
            let parent = self.require_comment(parent_id).await?;
            if parent.item_id != item_id || parent.content_type != content_type {
                return Err(InteractionError::InvalidComment(
                    "parent belongs to another item".into(),
                ));
            }
            if parent.parent_id.is_some() {
                return Err(InteractionError::InvalidComment(
                    "replies cannot be nested".into(),
                ));
            }
        }

        let comments = self.stores.comments.clone();
        let new_comment = NewComment {
            content_type,
            item_id: item_id.clone(),
            user_id: user_id.to_string(),
            body: body.to_string(),
            parent_id: parent_id.map(str::to_string),
        };
        let comment = run_blocking(move || {
            comments.add_comment(new_comment, Utc::now().timestamp())
        })
        .await?;
        debug!("Added comment {} on {} {}", comment.id, content_type, item_id);

        self.publish_to_item(
            content_type,
            &item_id,
            msg_types::COMMENT_NEW,
            CommentAdded { comment: &comment },
        )
        .await;
        Ok(comment)
    }

    pub async fn react_to_comment(
        &self,
        comment_id: &str,
        user_id: &str,
        active: bool,
    ) -> Result<CommentReactionOutcome, InteractionError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(InteractionError::MissingUser("react"));
        }
        let comment = self.require_comment(comment_id).await?;

        let comments = self.stores.comments.clone();
        let (id, user) = (comment.id.clone(), user_id.to_string());
        let reactions = run_blocking(move || comments.set_reaction(&id, &user, active)).await?;

        self.publish_to_item(
            comment.content_type,
            &comment.item_id,
            msg_types::COMMENT_REACTION,
            CommentReaction {
                comment_id: &comment.id,
                user_id,
                active,
                reactions,
            },
        )
        .await;
        Ok(CommentReactionOutcome {
            comment_id: comment.id,
            reactions,
        })
    }

    async fn require_item(
        &self,
        content_type: ContentType,
        item_id: &str,
    ) -> Result<Item, InteractionError> {
        let catalog = self.stores.catalog.clone();
        let id = item_id.to_string();
        run_blocking(move || catalog.get_item(content_type, &id))
            .await?
            .ok_or_else(|| InteractionError::ItemNotFound {
                content_type: content_type.to_string(),
                item_id: item_id.to_string(),
            })
    }

    async fn require_comment(&self, comment_id: &str) -> Result<Comment, InteractionError> {
        let comments = self.stores.comments.clone();
        let id = comment_id.to_string();
        run_blocking(move || comments.get_comment(&id))
            .await?
            .ok_or_else(|| InteractionError::CommentNotFound(comment_id.to_string()))
    }

    async fn publish_to_item(
        &self,
        content_type: ContentType,
        item_id: &str,
        msg_type: &str,
        payload: impl Serialize,
    ) {
        match ServerMessage::try_new(msg_type, payload) {
            Ok(message) => {
                let room = item_room(content_type, item_id);
                self.broadcaster
                    .publish(BroadcastTarget::Room(room), message)
                    .await;
            }
            Err(e) => error!("Failed to encode {} for {}: {}", msg_type, item_id, e),
        }
    }
}

fn parse_item_id(item_id: &str) -> Result<String, InteractionError> {
    uuid::Uuid::parse_str(item_id.trim())
        .map(|id| id.to_string())
        .map_err(|_| InteractionError::InvalidItemId(item_id.to_string()))
}

fn parse_content_type(content_type: &str) -> Result<ContentType, InteractionError> {
    ContentType::from_str(content_type)
        .map_err(|_| InteractionError::UnknownContentType(content_type.to_string()))
}
