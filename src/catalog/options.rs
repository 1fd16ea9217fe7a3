use std::path::{Path, PathBuf};

use rusqlite::{OptionalExtension, params};

use super::util::map_sql_error;
use super::{Catalog, CatalogError, OPTION_BASE_PATH};

impl Catalog {
    /// Read a stored option, `None` when the key was never set.
    pub fn get_option(&self, key: &str) -> Result<Option<String>, CatalogError> {
        self.connection
            .prepare_cached("SELECT value FROM options WHERE key = ?1")
            .map_err(map_sql_error)?
            .query_row(params![key], |row| row.get::<_, String>(0))
            .optional()
            .map_err(map_sql_error)
    }

    /// Insert an option, updating the value in place if the key exists.
    pub fn set_option(&self, key: &str, value: &str) -> Result<(), CatalogError> {
        self.connection
            .prepare_cached(
                "INSERT INTO options (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .map_err(map_sql_error)?
            .execute(params![key, value])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// The directory every record path is relative to, if configured.
    pub fn base_path(&self) -> Result<Option<PathBuf>, CatalogError> {
        Ok(self.get_option(OPTION_BASE_PATH)?.map(PathBuf::from))
    }

    /// Persist the base path. Callers validate that it is a directory.
    pub fn set_base_path(&self, path: &Path) -> Result<(), CatalogError> {
        let value = path
            .to_str()
            .ok_or_else(|| CatalogError::NonUtf8Path(path.to_path_buf()))?;
        self.set_option(OPTION_BASE_PATH, value)
    }
}
