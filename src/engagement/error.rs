use thiserror::Error;

/// Why an interaction, comment or reaction was rejected.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("Invalid item id: {0}")]
    InvalidItemId(String),

    #[error("Interaction {kind} is not supported for {content_type}")]
    UnsupportedKind { kind: String, content_type: String },

    #[error("Unknown content type: {0}")]
    UnknownContentType(String),

    #[error("A user id is required to {0}")]
    MissingUser(&'static str),

    #[error("{content_type} {item_id} not found")]
    ItemNotFound {
        content_type: String,
        item_id: String,
    },

    #[error("Invalid comment: {0}")]
    InvalidComment(String),

    #[error("Comment {0} not found")]
    CommentNotFound(String),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl InteractionError {
    /// Rejections caused by the request itself rather than the server.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            InteractionError::Store(_)
                | InteractionError::ItemNotFound { .. }
                | InteractionError::CommentNotFound(_)
        )
    }
}
