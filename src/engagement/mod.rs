//! Recording user interactions, comments and reactions.

mod error;
mod kind;
mod service;

pub use error::InteractionError;
pub use kind::InteractionKind;
pub use service::{
    CommentReactionOutcome, EngagementService, InteractionOutcome, MAX_COMMENT_LENGTH,
};
