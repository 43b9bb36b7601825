use anyhow::{bail, Result};
use rusqlite::Connection;

/// Offset added to the schema version before it is written to
/// `PRAGMA user_version`, so that a database created by unrelated software
/// (user_version 0, 1, 2, ...) is never mistaken for one of ours.
pub const BASE_DB_VERSION: usize = 74000;

#[macro_export]
macro_rules! sql_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // unused_mut fires when no optional field assignments are given
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                primary_key: false,
                non_null: false,
                default_value: None,
                references: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    fn parse(s: &str) -> Option<SqlType> {
        match s {
            "TEXT" => Some(SqlType::Text),
            "INTEGER" => Some(SqlType::Integer),
            "REAL" => Some(SqlType::Real),
            "BLOB" => Some(SqlType::Blob),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
    Restrict,
}

impl OnDelete {
    fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Restrict => "RESTRICT",
        }
    }
}

pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<&'static str>,
    pub references: Option<&'static ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// (index name, indexed column expression) pairs.
    pub indices: &'static [(&'static str, &'static str)],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut sql = format!("CREATE TABLE {} (", self.name);
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column.name);
            sql.push(' ');
            sql.push_str(column.sql_type.as_sql());
            if column.primary_key {
                sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                sql.push_str(" NOT NULL");
            }
            if let Some(default_value) = column.default_value {
                sql.push_str(&format!(" DEFAULT {}", default_value));
            }
            if let Some(fk) = column.references {
                sql.push_str(&format!(
                    " REFERENCES {}({}) ON DELETE {}",
                    fk.table,
                    fk.column,
                    fk.on_delete.as_sql()
                ));
            }
        }
        sql.push_str(");");
        conn.execute(&sql, [])?;

        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                [],
            )?;
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

struct ActualColumn {
    name: String,
    sql_type: Option<SqlType>,
    non_null: bool,
    default_value: Option<String>,
    primary_key: bool,
}

struct ActualForeignKey {
    from_column: String,
    to_table: String,
    to_column: String,
    on_delete: String,
}

// SQLite may echo default values back wrapped in parentheses.
fn strip_parens(s: &str) -> &str {
    if s.starts_with('(') && s.ends_with(')') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    /// Check that every table in this schema exists in the database with the
    /// expected columns, indices and foreign keys.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            self.validate_columns(conn, table)?;
            self.validate_indices(conn, table)?;
            self.validate_foreign_keys(conn, table)?;
        }
        Ok(())
    }

    fn validate_columns(&self, conn: &Connection, table: &Table) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", table.name))?;
        let actual: Vec<ActualColumn> = stmt
            .query_map([], |row| {
                Ok(ActualColumn {
                    name: row.get(1)?,
                    sql_type: SqlType::parse(&row.get::<_, String>(2)?),
                    non_null: row.get::<_, i32>(3)? == 1,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i32>(5)? == 1,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if actual.len() != table.columns.len() {
            bail!(
                "Table {} has {} columns, expected {} ({})",
                table.name,
                actual.len(),
                table.columns.len(),
                table
                    .columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for (actual, expected) in actual.iter().zip(table.columns.iter()) {
            if actual.name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    table.name,
                    expected.name,
                    actual.name
                );
            }
            if actual.sql_type != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {:?}",
                    table.name,
                    expected.name,
                    expected.sql_type,
                    actual.sql_type
                );
            }
            if actual.non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch: expected {}, got {}",
                    table.name,
                    expected.name,
                    expected.non_null,
                    actual.non_null
                );
            }
            if actual.primary_key != expected.primary_key {
                bail!(
                    "Table {} column {} primary key mismatch: expected {}, got {}",
                    table.name,
                    expected.name,
                    expected.primary_key,
                    actual.primary_key
                );
            }
            if actual.default_value.as_deref().map(strip_parens)
                != expected.default_value.map(strip_parens)
            {
                bail!(
                    "Table {} column {} default mismatch: expected {:?}, got {:?}",
                    table.name,
                    expected.name,
                    expected.default_value,
                    actual.default_value
                );
            }
        }
        Ok(())
    }

    fn validate_indices(&self, conn: &Connection, table: &Table) -> Result<()> {
        for (index_name, _) in table.indices {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    rusqlite::params![index_name, table.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", table.name, index_name);
            }
        }
        Ok(())
    }

    fn validate_foreign_keys(&self, conn: &Connection, table: &Table) -> Result<()> {
        // PRAGMA foreign_key_list columns: id, seq, table, from, to, on_update, on_delete, match
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({});", table.name))?;
        let actual: Vec<ActualForeignKey> = stmt
            .query_map([], |row| {
                Ok(ActualForeignKey {
                    from_column: row.get(3)?,
                    to_table: row.get(2)?,
                    to_column: row.get(4)?,
                    on_delete: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for column in table.columns {
            let Some(expected) = column.references else {
                continue;
            };
            let matched = actual.iter().any(|fk| {
                fk.from_column == column.name
                    && fk.to_table == expected.table
                    && fk.to_column == expected.column
                    && fk.on_delete == expected.on_delete.as_sql()
            });
            if matched {
                continue;
            }
            match actual.iter().find(|fk| fk.from_column == column.name) {
                Some(fk) => bail!(
                    "Table {} column {} foreign key mismatch: expected REFERENCES {}({}) ON DELETE {}, got REFERENCES {}({}) ON DELETE {}",
                    table.name,
                    column.name,
                    expected.table,
                    expected.column,
                    expected.on_delete.as_sql(),
                    fk.to_table,
                    fk.to_column,
                    fk.on_delete
                ),
                None => bail!(
                    "Table {} column {} is missing foreign key REFERENCES {}({}) ON DELETE {}",
                    table.name,
                    column.name,
                    expected.table,
                    expected.column,
                    expected.on_delete.as_sql()
                ),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql_column;

    const ITEMS_TABLE: Table = Table {
        name: "items",
        columns: &[
            sql_column!("id", SqlType::Text, primary_key = true),
            sql_column!("label", SqlType::Text, non_null = true),
            sql_column!("rank", SqlType::Integer, default_value = Some("0")),
        ],
        indices: &[("idx_items_label", "label")],
    };

    const OWNER_FK: ForeignKey = ForeignKey {
        table: "items",
        column: "id",
        on_delete: OnDelete::Cascade,
    };

    const TAGS_TABLE: Table = Table {
        name: "tags",
        columns: &[
            sql_column!("id", SqlType::Integer, primary_key = true),
            sql_column!("item_id", SqlType::Text, non_null = true, references = Some(&OWNER_FK)),
            sql_column!("tag", SqlType::Text, non_null = true),
        ],
        indices: &[],
    };

    const SCHEMA: VersionedSchema = VersionedSchema {
        version: 1,
        tables: &[ITEMS_TABLE, TAGS_TABLE],
        migration: None,
    };

    #[test]
    fn create_then_validate_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEMA.create(&conn).unwrap();
        SCHEMA.validate(&conn).unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, (BASE_DB_VERSION + 1) as i64);
    }

    #[test]
    fn validate_detects_missing_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE items (id TEXT PRIMARY KEY, label TEXT NOT NULL)", [])
            .unwrap();
        conn.execute("CREATE INDEX idx_items_label ON items(label)", [])
            .unwrap();

        let schema = VersionedSchema {
            version: 1,
            tables: &[ITEMS_TABLE],
            migration: None,
        };
        let err = schema.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("has 2 columns, expected 3"));
    }

    #[test]
    fn validate_detects_type_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE items (id TEXT PRIMARY KEY, label INTEGER NOT NULL, rank INTEGER DEFAULT 0)",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_items_label ON items(label)", [])
            .unwrap();

        let schema = VersionedSchema {
            version: 1,
            tables: &[ITEMS_TABLE],
            migration: None,
        };
        let err = schema.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("type mismatch"));
    }

    #[test]
    fn validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE items (id TEXT PRIMARY KEY, label TEXT NOT NULL, rank INTEGER DEFAULT 0)",
            [],
        )
        .unwrap();

        let schema = VersionedSchema {
            version: 1,
            tables: &[ITEMS_TABLE],
            migration: None,
        };
        let err = schema.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing index"));
        assert!(err.contains("idx_items_label"));
    }

    #[test]
    fn validate_detects_missing_foreign_key() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE items (id TEXT PRIMARY KEY, label TEXT NOT NULL, rank INTEGER DEFAULT 0)",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_items_label ON items(label)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE tags (id INTEGER PRIMARY KEY, item_id TEXT NOT NULL, tag TEXT NOT NULL)",
            [],
        )
        .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing foreign key"));
        assert!(err.contains("item_id"));
    }

    #[test]
    fn validate_detects_wrong_on_delete() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE items (id TEXT PRIMARY KEY, label TEXT NOT NULL, rank INTEGER DEFAULT 0)",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_items_label ON items(label)", [])
            .unwrap();
        conn.execute(
            "CREATE TABLE tags (
                id INTEGER PRIMARY KEY,
                item_id TEXT NOT NULL REFERENCES items(id) ON DELETE SET NULL,
                tag TEXT NOT NULL
            )",
            [],
        )
        .unwrap();

        let err = SCHEMA.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("foreign key mismatch"));
        assert!(err.contains("CASCADE"));
        assert!(err.contains("SET NULL"));
    }
}
