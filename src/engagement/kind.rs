use crate::catalog::EngagementSet;
use crate::charts::RebuildReason;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    View,
    Like,
    Unlike,
    Download,
    Share,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::View => "view",
            InteractionKind::Like => "like",
            InteractionKind::Unlike => "unlike",
            InteractionKind::Download => "download",
            InteractionKind::Share => "share",
        }
    }

    /// Reported back to the caller once the interaction is recorded.
    pub fn action(&self) -> &'static str {
        match self {
            InteractionKind::View => "viewed",
            InteractionKind::Like => "liked",
            InteractionKind::Unlike => "unliked",
            InteractionKind::Download => "downloaded",
            InteractionKind::Share => "shared",
        }
    }

    /// Unlike removes from the set that like adds to.
    pub fn engagement_set(&self) -> EngagementSet {
        match self {
            InteractionKind::View => EngagementSet::Viewers,
            InteractionKind::Like | InteractionKind::Unlike => EngagementSet::Likes,
            InteractionKind::Download => EngagementSet::Downloads,
            InteractionKind::Share => EngagementSet::Shares,
        }
    }

    /// Anonymous views are counted; every other kind needs a user.
    pub fn requires_user(&self) -> bool {
        *self != InteractionKind::View
    }

    pub fn rebuild_reason(&self) -> RebuildReason {
        match self {
            InteractionKind::View => RebuildReason::View,
            _ => RebuildReason::Engagement,
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Ok(InteractionKind::View),
            "like" => Ok(InteractionKind::Like),
            "unlike" => Ok(InteractionKind::Unlike),
            "download" => Ok(InteractionKind::Download),
            "share" => Ok(InteractionKind::Share),
            other => Err(format!("Unsupported interaction kind: {}", other)),
        }
    }
}
