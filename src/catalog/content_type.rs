//! Content types and the chart categories they feed.
//!
//! Everything that differs between songs, albums and videos is described once
//! in [`CONTENT_TYPES`]. Code that needs per-type behavior looks up the
//! descriptor instead of matching on the type.

use crate::engagement::InteractionKind;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Song,
    Album,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartCategory {
    Songs,
    Albums,
    Videos,
}

/// Static description of a content type.
#[derive(Debug)]
pub struct ContentTypeDescriptor {
    pub content_type: ContentType,
    pub tag: &'static str,
    pub category: ChartCategory,
    pub category_tag: &'static str,
    pub label: &'static str,
    /// Whether chart payloads carry the author's name as `artist`.
    pub has_artist: bool,
    pub has_video_url: bool,
    pub interactions: &'static [InteractionKind],
}

const ALL_INTERACTIONS: &[InteractionKind] = &[
    InteractionKind::View,
    InteractionKind::Like,
    InteractionKind::Unlike,
    InteractionKind::Download,
    InteractionKind::Share,
];

pub const CONTENT_TYPES: &[ContentTypeDescriptor] = &[
    ContentTypeDescriptor {
        content_type: ContentType::Song,
        tag: "song",
        category: ChartCategory::Songs,
        category_tag: "songs",
        label: "Song",
        has_artist: true,
        has_video_url: false,
        interactions: ALL_INTERACTIONS,
    },
    ContentTypeDescriptor {
        content_type: ContentType::Album,
        tag: "album",
        category: ChartCategory::Albums,
        category_tag: "albums",
        label: "Album",
        has_artist: true,
        has_video_url: false,
        interactions: ALL_INTERACTIONS,
    },
    ContentTypeDescriptor {
        content_type: ContentType::Video,
        tag: "video",
        category: ChartCategory::Videos,
        category_tag: "videos",
        label: "Video",
        has_artist: false,
        has_video_url: true,
        interactions: ALL_INTERACTIONS,
    },
];

impl ContentType {
    pub fn all() -> impl Iterator<Item = ContentType> {
        CONTENT_TYPES.iter().map(|d| d.content_type)
    }

    pub fn descriptor(&self) -> &'static ContentTypeDescriptor {
        // The registry has exactly one entry per variant, in declaration order.
        &CONTENT_TYPES[*self as usize]
    }

    pub fn as_str(&self) -> &'static str {
        self.descriptor().tag
    }

    pub fn category(&self) -> ChartCategory {
        self.descriptor().category
    }

    pub fn supports(&self, kind: InteractionKind) -> bool {
        self.descriptor().interactions.contains(&kind)
    }
}

impl ChartCategory {
    pub fn all() -> impl Iterator<Item = ChartCategory> {
        CONTENT_TYPES.iter().map(|d| d.category)
    }

    pub fn content_type(&self) -> ContentType {
        CONTENT_TYPES[*self as usize].content_type
    }

    pub fn as_str(&self) -> &'static str {
        self.content_type().descriptor().category_tag
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ChartCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CONTENT_TYPES
            .iter()
            .find(|d| d.tag.eq_ignore_ascii_case(s))
            .map(|d| d.content_type)
            .ok_or_else(|| format!("Unknown content type: {}", s))
    }
}

impl FromStr for ChartCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        CONTENT_TYPES
            .iter()
            .find(|d| d.category_tag.eq_ignore_ascii_case(s))
            .map(|d| d.category)
            .ok_or_else(|| format!("Unknown chart category: {}", s))
    }
}

impl ToSql for ContentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ContentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for ChartCategory {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ChartCategory {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_indexed_by_variant() {
        for (index, descriptor) in CONTENT_TYPES.iter().enumerate() {
            assert_eq!(descriptor.content_type as usize, index);
            assert_eq!(descriptor.category as usize, index);
            assert_eq!(descriptor.content_type.descriptor().tag, descriptor.tag);
        }
    }

    #[test]
    fn category_and_content_type_map_both_ways() {
        for content_type in ContentType::all() {
            assert_eq!(content_type.category().content_type(), content_type);
        }
        assert_eq!(ChartCategory::Songs.content_type(), ContentType::Song);
        assert_eq!(ContentType::Video.category(), ChartCategory::Videos);
    }

    #[test]
    fn parses_tags_case_insensitively() {
        assert_eq!("Song".parse::<ContentType>(), Ok(ContentType::Song));
        assert_eq!(" albums ".parse::<ChartCategory>(), Ok(ChartCategory::Albums));
        assert!("beat".parse::<ContentType>().is_err());
        assert!("song".parse::<ChartCategory>().is_err());
    }

    #[test]
    fn serializes_as_tags() {
        assert_eq!(serde_json::to_string(&ContentType::Album).unwrap(), "\"album\"");
        assert_eq!(
            serde_json::to_string(&ChartCategory::Videos).unwrap(),
            "\"videos\""
        );
    }
}
