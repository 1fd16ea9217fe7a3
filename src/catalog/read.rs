use rusqlite::{OptionalExtension, Row, params};

use super::util::map_sql_error;
use super::{Catalog, CatalogError, FileRecord, TriState};

pub(super) const RECORD_COLUMNS: &str = "id, path, size, mtime, checksum, found, integrity_ok";

/// Subsets of the `files` table that passes and reports work over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    Found,
    /// Cataloged earlier but absent at the last look.
    Missing,
    /// Present on disk and still lacking a checksum.
    PendingChecksum,
    /// Present on disk and not yet verified in the current cycle.
    PendingVerify,
    /// Verified with a checksum mismatch.
    Changed,
    /// Verified with matching content.
    Verified,
}

impl RecordFilter {
    pub(super) fn where_clause(self) -> &'static str {
        match self {
            RecordFilter::All => "1 = 1",
            RecordFilter::Found => "found = 1",
            RecordFilter::Missing => "found = 0",
            RecordFilter::PendingChecksum => "checksum IS NULL AND found = 1",
            RecordFilter::PendingVerify => "integrity_ok IS NULL AND found = 1",
            RecordFilter::Changed => "integrity_ok = 0",
            RecordFilter::Verified => "integrity_ok = 1",
        }
    }
}

/// Numeric columns that can be summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumColumn {
    Size,
}

impl SumColumn {
    fn column(self) -> &'static str {
        match self {
            SumColumn::Size => "size",
        }
    }
}

/// Which slice of a filtered record set to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPage {
    /// Ascending ids strictly greater than `after_id`.
    After { after_id: i64, limit: usize },
    /// The highest ids first.
    Tail { limit: usize },
}

impl Catalog {
    /// Count records matching the filter.
    pub fn count(&self, filter: RecordFilter) -> Result<u64, CatalogError> {
        let sql = format!("SELECT COUNT(*) FROM files WHERE {}", filter.where_clause());
        let count: i64 = self
            .connection
            .prepare_cached(&sql)
            .map_err(map_sql_error)?
            .query_row([], |row| row.get(0))
            .map_err(map_sql_error)?;
        Ok(count.max(0) as u64)
    }

    /// Sum a column over records matching the filter; `NULL`s count as zero.
    pub fn sum(&self, column: SumColumn, filter: RecordFilter) -> Result<u64, CatalogError> {
        let sql = format!(
            "SELECT COALESCE(SUM({}), 0) FROM files WHERE {}",
            column.column(),
            filter.where_clause()
        );
        let total: i64 = self
            .connection
            .prepare_cached(&sql)
            .map_err(map_sql_error)?
            .query_row([], |row| row.get(0))
            .map_err(map_sql_error)?;
        Ok(total.max(0) as u64)
    }

    /// Fetch one page of records matching the filter.
    pub fn page(
        &self,
        filter: RecordFilter,
        page: RecordPage,
    ) -> Result<Vec<FileRecord>, CatalogError> {
        let clause = filter.where_clause();
        let (sql, after_id, limit) = match page {
            RecordPage::After { after_id, limit } => (
                format!(
                    "SELECT {RECORD_COLUMNS} FROM files WHERE {clause} AND id > ?1
                     ORDER BY id ASC LIMIT ?2"
                ),
                after_id,
                limit,
            ),
            RecordPage::Tail { limit } => (
                format!(
                    "SELECT {RECORD_COLUMNS} FROM files WHERE {clause} AND id > ?1
                     ORDER BY id DESC LIMIT ?2"
                ),
                0,
                limit,
            ),
        };
        let mut stmt = self.connection.prepare_cached(&sql).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![after_id, limit as i64], record_from_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Look up a record by its normalised relative path.
    pub fn record_by_path(&self, path: &str) -> Result<Option<FileRecord>, CatalogError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE path = ?1");
        self.connection
            .prepare_cached(&sql)
            .map_err(map_sql_error)?
            .query_row(params![path], record_from_row)
            .optional()
            .map_err(map_sql_error)
    }

    /// Fetch every record ordered by path.
    #[cfg(test)]
    pub(crate) fn list_records(&self) -> Result<Vec<FileRecord>, CatalogError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files ORDER BY path ASC");
        let mut stmt = self.connection.prepare(&sql).map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], record_from_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }
}

pub(super) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        size: row.get::<_, Option<i64>>(2)?.map(|size| size.max(0) as u64),
        mtime: row.get(3)?,
        checksum: row.get(4)?,
        found: TriState::from_sql(row.get(5)?),
        integrity_ok: TriState::from_sql(row.get(6)?),
    })
}
