//! SQLite schema definitions for the scheduler database.
//!
//! Two tables: contents (publishable material) and schedules (publish
//! intents), with a cascading foreign key from schedules to contents.

use crate::sql_column;
use crate::sqlite_persistence::{Column, ForeignKey, OnDelete, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1 - contents and one-shot schedules
// =============================================================================

const CONTENTS_TABLE_V1: Table = Table {
    name: "contents",
    columns: &[
        sql_column!("id", SqlType::Text, primary_key = true), // UUID
        sql_column!("file_path", SqlType::Text, non_null = true), // comma-joined list
        sql_column!("caption", SqlType::Text, non_null = true),
        sql_column!("post_type", SqlType::Text, non_null = true),
        sql_column!("platform", SqlType::Text, non_null = true),
        sql_column!("status", SqlType::Text, non_null = true),
        sql_column!("created_at", SqlType::Text, non_null = true), // RFC3339
        sql_column!("updated_at", SqlType::Text, non_null = true),
    ],
    indices: &[("idx_contents_status", "status")],
};

const CONTENT_FK: ForeignKey = ForeignKey {
    table: "contents",
    column: "id",
    on_delete: OnDelete::Cascade,
};

const SCHEDULES_TABLE_V1: Table = Table {
    name: "schedules",
    columns: &[
        sql_column!("id", SqlType::Text, primary_key = true), // UUID
        sql_column!("content_id", SqlType::Text, non_null = true, references = Some(&CONTENT_FK)),
        sql_column!("platform", SqlType::Text, non_null = true),
        sql_column!("status", SqlType::Text, non_null = true),
        sql_column!("scheduled_time", SqlType::Text), // RFC3339, pending only
        sql_column!("error_message", SqlType::Text),
        sql_column!("retry_count", SqlType::Integer, non_null = true, default_value = Some("0")),
        sql_column!("created_at", SqlType::Text, non_null = true),
        sql_column!("updated_at", SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_schedules_status", "status"),
        ("idx_schedules_content_id", "content_id"),
    ],
};

// =============================================================================
// Version 2 - daily recurrence fields
// =============================================================================

/// Schedules table with the recurrence columns. The new columns sit at the
/// end so that a migrated v1 table and a freshly created v2 table have the
/// same column order.
const SCHEDULES_TABLE_V2: Table = Table {
    name: "schedules",
    columns: &[
        sql_column!("id", SqlType::Text, primary_key = true),
        sql_column!("content_id", SqlType::Text, non_null = true, references = Some(&CONTENT_FK)),
        sql_column!("platform", SqlType::Text, non_null = true),
        sql_column!("status", SqlType::Text, non_null = true),
        sql_column!("scheduled_time", SqlType::Text),
        sql_column!("error_message", SqlType::Text),
        sql_column!("retry_count", SqlType::Integer, non_null = true, default_value = Some("0")),
        sql_column!("created_at", SqlType::Text, non_null = true),
        sql_column!("updated_at", SqlType::Text, non_null = true),
        sql_column!("hour", SqlType::Integer),   // 0-23, recurring only
        sql_column!("minute", SqlType::Integer), // 0-59, recurring only
        sql_column!("use_day_counter", SqlType::Integer, non_null = true, default_value = Some("0")),
        sql_column!("day_counter", SqlType::Integer, non_null = true, default_value = Some("1")),
        sql_column!("last_run_at", SqlType::Text), // RFC3339, recurring only
    ],
    indices: &[
        ("idx_schedules_status", "status"),
        ("idx_schedules_content_id", "content_id"),
    ],
};

/// Migration from version 1 to version 2: add the recurrence columns.
fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute("ALTER TABLE schedules ADD COLUMN hour INTEGER", [])?;
    conn.execute("ALTER TABLE schedules ADD COLUMN minute INTEGER", [])?;
    conn.execute(
        "ALTER TABLE schedules ADD COLUMN use_day_counter INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    conn.execute(
        "ALTER TABLE schedules ADD COLUMN day_counter INTEGER NOT NULL DEFAULT 1",
        [],
    )?;
    conn.execute("ALTER TABLE schedules ADD COLUMN last_run_at TEXT", [])?;
    Ok(())
}

// =============================================================================
// Versioned Schema Definition
// =============================================================================

/// All versioned schemas for the scheduler database.
///
/// Version 1: contents and one-shot schedules
/// Version 2: daily recurrence fields on schedules
pub const SCHEDULER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[CONTENTS_TABLE_V1, SCHEDULES_TABLE_V1],
        migration: None, // Initial version has no migration
    },
    VersionedSchema {
        version: 2,
        tables: &[CONTENTS_TABLE_V1, SCHEDULES_TABLE_V2],
        migration: Some(migrate_v1_to_v2),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_v1_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = &SCHEDULER_VERSIONED_SCHEMAS[0];
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_latest_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = SCHEDULER_VERSIONED_SCHEMAS.last().unwrap();
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn test_migration_v1_to_v2_matches_fresh_v2() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEDULER_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        let migrate = SCHEDULER_VERSIONED_SCHEMAS[1].migration.unwrap();
        migrate(&conn).unwrap();

        // The migrated table must satisfy the v2 definition
        SCHEDULER_VERSIONED_SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn test_deleting_content_cascades_to_schedules() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEDULER_VERSIONED_SCHEMAS.last().unwrap().create(&conn).unwrap();

        conn.execute(
            "INSERT INTO contents (id, file_path, caption, post_type, platform, status, created_at, updated_at)
             VALUES ('c1', '/a.jpg', '', 'photo', 'instagram', 'uploaded', '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO schedules (id, content_id, platform, status, created_at, updated_at)
             VALUES ('s1', 'c1', 'instagram', 'pending', '2024-01-01T00:00:00+00:00', '2024-01-01T00:00:00+00:00')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM contents WHERE id = 'c1'", []).unwrap();

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM schedules", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_v1_does_not_validate_against_v2() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEDULER_VERSIONED_SCHEMAS[0].create(&conn).unwrap();

        let result = SCHEDULER_VERSIONED_SCHEMAS[1].validate(&conn);
        assert!(result.is_err());
    }
}
