use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const CHART_SNAPSHOTS_TABLE_V1: Table = Table {
    name: "chart_snapshots",
    columns: &[
        sqlite_column!("category", &SqlType::Text, non_null = true),
        sqlite_column!("iso_week", &SqlType::Text, non_null = true),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "build_count",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[],
    unique_constraints: &[&["category", "iso_week"]],
};

/// Entries reference items by id only; a deleted item leaves its history behind.
const CHART_ENTRIES_TABLE_V1: Table = Table {
    name: "chart_entries",
    columns: &[
        sqlite_column!("category", &SqlType::Text, non_null = true),
        sqlite_column!("iso_week", &SqlType::Text, non_null = true),
        sqlite_column!("item_id", &SqlType::Text, non_null = true),
        sqlite_column!("rank", &SqlType::Integer, non_null = true),
        sqlite_column!("peak", &SqlType::Integer, non_null = true),
        sqlite_column!("weeks_on", &SqlType::Integer, non_null = true),
        sqlite_column!("last_week", &SqlType::Integer),
    ],
    indices: &[("idx_chart_entries_item", "category, item_id, iso_week")],
    unique_constraints: &[
        &["category", "iso_week", "item_id"],
        &["category", "iso_week", "rank"],
    ],
};

pub const CHART_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[CHART_SNAPSHOTS_TABLE_V1, CHART_ENTRIES_TABLE_V1],
    migration: None,
}];
