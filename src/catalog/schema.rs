//! Schema of the media database: authors, items, engagement sets, the weekly
//! view ledger and comments.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, OnDelete, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const AUTHORS_TABLE_V1: Table = Table {
    name: "authors",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("avatar_url", &SqlType::Text),
        sqlite_column!("bio", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

const AUTHOR_FK: ForeignKey = ForeignKey {
    foreign_table: "authors",
    foreign_column: "id",
    on_delete: OnDelete::SetNull,
};

const ITEMS_TABLE_V1: Table = Table {
    name: "items",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("content_type", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("author_id", &SqlType::Text, foreign_key = Some(&AUTHOR_FK)),
        sqlite_column!("genre", &SqlType::Text),
        sqlite_column!("release_date", &SqlType::Text),
        sqlite_column!("image_url", &SqlType::Text),
        sqlite_column!("video_url", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_items_type_created", "content_type, created_at")],
    unique_constraints: &[],
};

const ITEM_FK: ForeignKey = ForeignKey {
    foreign_table: "items",
    foreign_column: "id",
    on_delete: OnDelete::Cascade,
};

/// One row per (item, set, user); the unique constraint is what makes
/// membership idempotent.
const ENGAGEMENT_TABLE_V1: Table = Table {
    name: "engagement",
    columns: &[
        sqlite_column!(
            "item_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ITEM_FK)
        ),
        sqlite_column!("kind", &SqlType::Text, non_null = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_engagement_item", "item_id, kind")],
    unique_constraints: &[&["item_id", "kind", "user_id"]],
};

/// Weekly view counters. No foreign key: rows outlive deleted items.
const VIEW_LEDGER_TABLE_V1: Table = Table {
    name: "view_ledger",
    columns: &[
        sqlite_column!("item_id", &SqlType::Text, non_null = true),
        sqlite_column!("content_type", &SqlType::Text, non_null = true),
        sqlite_column!("iso_week", &SqlType::Text, non_null = true),
        sqlite_column!(
            "views",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_view_ledger_week", "content_type, iso_week")],
    unique_constraints: &[&["item_id", "content_type", "iso_week"]],
};

const PARENT_COMMENT_FK: ForeignKey = ForeignKey {
    foreign_table: "comments",
    foreign_column: "id",
    on_delete: OnDelete::Cascade,
};

const COMMENTS_TABLE_V1: Table = Table {
    name: "comments",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "item_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ITEM_FK)
        ),
        sqlite_column!("content_type", &SqlType::Text, non_null = true),
        sqlite_column!(
            "parent_id",
            &SqlType::Text,
            foreign_key = Some(&PARENT_COMMENT_FK)
        ),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("body", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_comments_item", "item_id, created_at"),
        ("idx_comments_parent", "parent_id"),
    ],
    unique_constraints: &[],
};

const COMMENT_FK: ForeignKey = ForeignKey {
    foreign_table: "comments",
    foreign_column: "id",
    on_delete: OnDelete::Cascade,
};

const COMMENT_REACTIONS_TABLE_V1: Table = Table {
    name: "comment_reactions",
    columns: &[
        sqlite_column!(
            "comment_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&COMMENT_FK)
        ),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[&["comment_id", "user_id"]],
};

pub const MEDIA_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        AUTHORS_TABLE_V1,
        ITEMS_TABLE_V1,
        ENGAGEMENT_TABLE_V1,
        VIEW_LEDGER_TABLE_V1,
        COMMENTS_TABLE_V1,
        COMMENT_REACTIONS_TABLE_V1,
    ],
    migration: None,
}];
