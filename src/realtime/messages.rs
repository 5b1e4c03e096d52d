//! Realtime channel message types.
//!
//! Every frame is an envelope with a `type` string and a JSON payload, in both
//! directions.

use serde::{Deserialize, Serialize};

/// Server -> Client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: serde_json::Value,
}

impl ServerMessage {
    /// Falls back to a null payload if `payload` cannot be serialized.
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn try_new(msg_type: impl Into<String>, payload: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn empty(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Client -> Server message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

pub mod msg_types {
    pub const CONNECTED: &str = "connected";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
    pub const JOIN: &str = "join";
    pub const LEAVE: &str = "leave";
    pub const ROOM_JOINED: &str = "room:joined";
    pub const ROOM_LEFT: &str = "room:left";
    /// Full chart of a category, sent to every connection.
    pub const CHARTS_UPDATE_CATEGORY: &str = "charts:update:category";
    /// New position of one charted item, sent to every connection.
    pub const CHARTS_UPDATE_ITEM: &str = "charts:update:item";
    /// Sent to the item room.
    pub const COMMENT_NEW: &str = "comment:new";
    /// Sent to the item room.
    pub const COMMENT_REACTION: &str = "comment:reaction";
}

/// Payloads of infrastructure messages.
pub mod system {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Connected {
        pub connection_id: usize,
        pub server_version: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Room {
        pub room: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Error {
        pub code: String,
        pub message: String,
    }

    impl Error {
        pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
            Self {
                code: code.into(),
                message: message.into(),
            }
        }
    }
}

/// Payloads of chart fan-out events.
pub mod charts {
    use crate::catalog::ChartCategory;
    use crate::charts::ChartItem;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize, PartialEq)]
    pub struct CategoryUpdate<'a> {
        pub category: ChartCategory,
        pub items: &'a [ChartItem],
    }

    #[derive(Debug, Clone, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct ItemPositionUpdate<'a> {
        pub id: &'a str,
        pub new_pos: u32,
    }
}

/// Payloads of comment events.
pub mod comments {
    use crate::catalog::Comment;
    use serde::Serialize;

    #[derive(Debug, Clone, Serialize, PartialEq)]
    pub struct CommentAdded<'a> {
        pub comment: &'a Comment,
    }

    #[derive(Debug, Clone, Serialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct CommentReaction<'a> {
        pub comment_id: &'a str,
        pub user_id: &'a str,
        pub active: bool,
        pub reactions: u64,
    }
}
