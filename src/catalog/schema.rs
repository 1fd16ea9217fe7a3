use std::collections::HashSet;

use rusqlite::Connection;

use super::CatalogError;
use super::util::map_sql_error;

pub(super) fn apply_schema(connection: &Connection) -> Result<(), CatalogError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                checksum TEXT,
                size INTEGER,
                mtime INTEGER,
                found INTEGER,
                integrity_ok INTEGER
            );
             CREATE TABLE IF NOT EXISTS options (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(map_sql_error)?;
    ensure_files_optional_columns(connection)?;
    connection
        .execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_files_checksum ON files(checksum);
             CREATE INDEX IF NOT EXISTS idx_files_found ON files(found);
             CREATE INDEX IF NOT EXISTS idx_files_integrity_ok
                 ON files(id) WHERE integrity_ok = 0;",
        )
        .map_err(map_sql_error)?;
    Ok(())
}

/// Catalogs written before verification existed lack `integrity_ok`.
fn ensure_files_optional_columns(connection: &Connection) -> Result<(), CatalogError> {
    let mut stmt = connection
        .prepare("PRAGMA table_info(files)")
        .map_err(map_sql_error)?;
    let columns: HashSet<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(map_sql_error)?
        .filter_map(Result::ok)
        .collect();
    drop(stmt);
    if !columns.contains("integrity_ok") {
        connection
            .execute("ALTER TABLE files ADD COLUMN integrity_ok INTEGER", [])
            .map_err(map_sql_error)?;
    }
    Ok(())
}
