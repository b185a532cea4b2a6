//! Read raw sales goal rows from the SQLite store

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use tracing::debug;

/// Rows with a realized value, as stored
const GOALS_QUERY: &str = r#"
    SELECT vendedor_id, mes, valor_meta, valor_realizado
    FROM metas
    WHERE valor_realizado IS NOT NULL
"#;

/// One `metas` row with untyped columns. Values are coerced during cleaning.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGoalRow {
    pub vendedor_id: Value,
    pub mes: Value,
    pub valor_meta: Value,
    pub valor_realizado: Value,
}

/// Fetch every eligible row. The database is opened read-only and must exist.
pub fn extract_rows(database: &Path) -> Result<Vec<RawGoalRow>> {
    let conn = Connection::open_with_flags(
        database,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open database {}", database.display()))?;

    read_rows(&conn)
}

/// Run the goals query on an open connection
pub fn read_rows(conn: &Connection) -> Result<Vec<RawGoalRow>> {
    let mut stmt = conn
        .prepare(GOALS_QUERY)
        .context("Failed to prepare goals query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(RawGoalRow {
                vendedor_id: row.get(0)?,
                mes: row.get(1)?,
                valor_meta: row.get(2)?,
                valor_realizado: row.get(3)?,
            })
        })
        .context("Failed to query goals")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to read goal row")?;

    debug!("Extracted {} goal rows", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE metas (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vendedor_id INTEGER,
                mes TEXT,
                valor_meta REAL,
                valor_realizado REAL
            );
            INSERT INTO metas (vendedor_id, mes, valor_meta, valor_realizado) VALUES
                (1, '1', 120.0, 100.0),
                (1, '2', 120.0, NULL),
                (2, '1', 80.0, 90.5);
            "#,
        )
        .unwrap();
    }

    #[test]
    fn test_extract_skips_null_realized() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("database.sqlite");
        seeded_db(&db);

        let rows = extract_rows(&db).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vendedor_id, Value::Integer(1));
        assert_eq!(rows[0].mes, Value::Text("1".to_string()));
        assert_eq!(rows[1].valor_realizado, Value::Real(90.5));
    }

    #[test]
    fn test_extract_missing_database_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_rows(&dir.path().join("absent.sqlite")).is_err());
        // Read-only open must not create the file
        assert!(!dir.path().join("absent.sqlite").exists());
    }

    #[test]
    fn test_extract_missing_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("empty.sqlite");
        Connection::open(&db)
            .unwrap()
            .execute_batch("CREATE TABLE outra (id INTEGER);")
            .unwrap();
        assert!(extract_rows(&db).is_err());
    }
}
