use std::collections::VecDeque;
use std::path::PathBuf;

use rusqlite::{Row, params};

use super::read::{RECORD_COLUMNS, record_from_row};
use super::util::{escape_like, map_sql_error};
use super::{Catalog, CatalogError, FileRecord, RecordFilter, SumColumn};

const LISTING_PAGE_SIZE: usize = 1_000;

/// Headline numbers for a catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSummary {
    /// Directory the records are relative to, if set.
    pub base_path: Option<PathBuf>,
    /// Every record, present or not.
    pub records: u64,
    /// Sum of known sizes in bytes.
    pub total_size: u64,
    /// Records missing on disk at the last look.
    pub deleted: u64,
    /// Records that failed the last verify.
    pub changed: u64,
    /// Records that passed the last verify.
    pub verified: u64,
    /// Present records still lacking a checksum.
    pub pending_checksums: u64,
}

/// Files sharing one checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    /// Digest shared by every member.
    pub checksum: String,
    /// Number of records in the group.
    pub count: u64,
    /// Combined size of every member, the space a dedup could reclaim minus one copy.
    pub total_size: u64,
    /// Member paths in ascending order.
    pub paths: Vec<String>,
}

type RowMapper<T> = fn(&Row<'_>) -> rusqlite::Result<T>;
type Finisher<T> = fn(&Catalog, &mut T) -> Result<(), CatalogError>;

/// Lazy, page-at-a-time listing over a read-only query.
pub struct Listing<'a, T> {
    catalog: &'a Catalog,
    sql: String,
    param: Option<String>,
    map: RowMapper<T>,
    finish: Option<Finisher<T>>,
    offset: usize,
    page_size: usize,
    buffer: VecDeque<T>,
    exhausted: bool,
}

impl<'a, T> Listing<'a, T> {
    fn new(catalog: &'a Catalog, sql: String, param: Option<String>, map: RowMapper<T>) -> Self {
        Self {
            catalog,
            sql,
            param,
            map,
            finish: None,
            offset: 0,
            page_size: LISTING_PAGE_SIZE,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    fn with_finisher(mut self, finish: Finisher<T>) -> Self {
        self.finish = Some(finish);
        self
    }

    /// Override the number of rows fetched per round trip.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn fetch_page(&mut self) -> Result<(), CatalogError> {
        let sql = format!("{} LIMIT ?1 OFFSET ?2", self.sql);
        let mut stmt = self
            .catalog
            .connection
            .prepare_cached(&sql)
            .map_err(map_sql_error)?;
        let limit = self.page_size as i64;
        let offset = self.offset as i64;
        let rows = match &self.param {
            Some(param) => stmt.query_map(params![limit, offset, param], self.map),
            None => stmt.query_map(params![limit, offset], self.map),
        }
        .map_err(map_sql_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_sql_error)?;
        drop(stmt);
        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        self.offset += rows.len();
        for mut item in rows {
            if let Some(finish) = self.finish {
                finish(self.catalog, &mut item)?;
            }
            self.buffer.push_back(item);
        }
        Ok(())
    }
}

impl<T> Iterator for Listing<'_, T> {
    type Item = Result<T, CatalogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_page() {
                self.exhausted = true;
                self.buffer.clear();
                return Some(Err(err));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl Catalog {
    /// Records with a known size, largest first.
    pub fn rank_by_size(&self) -> Listing<'_, FileRecord> {
        self.records_where("size IS NOT NULL", "size DESC, id ASC", None)
    }

    /// Present records, most recently modified first.
    pub fn rank_by_mtime(&self) -> Listing<'_, FileRecord> {
        self.records_where("found = 1", "mtime DESC, id ASC", None)
    }

    /// Records missing on disk, largest first.
    pub fn show_deleted(&self) -> Listing<'_, FileRecord> {
        self.records_where(
            RecordFilter::Missing.where_clause(),
            "size DESC, id ASC",
            None,
        )
    }

    /// Records whose content no longer matches the stored checksum, largest first.
    pub fn show_changed(&self) -> Listing<'_, FileRecord> {
        self.records_where(
            RecordFilter::Changed.where_clause(),
            "size DESC, id ASC",
            None,
        )
    }

    /// Records whose path contains `term`, largest first.
    pub fn search(&self, term: &str) -> Listing<'_, FileRecord> {
        let pattern = format!("%{}%", escape_like(term));
        self.records_where(
            "path LIKE ?3 ESCAPE '\\'",
            "size DESC, id ASC",
            Some(pattern),
        )
    }

    /// Checksums shared by more than one record, ranked by combined size.
    pub fn list_duplicates(&self) -> Listing<'_, DuplicateGroup> {
        let sql = "SELECT checksum, COUNT(*) AS members, COALESCE(SUM(size), 0) AS total
                   FROM files
                   WHERE checksum IS NOT NULL
                   GROUP BY checksum
                   HAVING COUNT(*) > 1
                   ORDER BY total DESC, checksum ASC"
            .to_string();
        Listing::new(self, sql, None, |row| {
            Ok(DuplicateGroup {
                checksum: row.get(0)?,
                count: row.get::<_, i64>(1)?.max(0) as u64,
                total_size: row.get::<_, i64>(2)?.max(0) as u64,
                paths: Vec::new(),
            })
        })
        .with_finisher(fill_duplicate_paths)
    }

    /// Counts shown above the command menu.
    pub fn summary(&self) -> Result<CatalogSummary, CatalogError> {
        Ok(CatalogSummary {
            base_path: self.base_path()?,
            records: self.count(RecordFilter::All)?,
            total_size: self.sum(SumColumn::Size, RecordFilter::All)?,
            deleted: self.count(RecordFilter::Missing)?,
            changed: self.count(RecordFilter::Changed)?,
            verified: self.count(RecordFilter::Verified)?,
            pending_checksums: self.count(RecordFilter::PendingChecksum)?,
        })
    }

    fn records_where(
        &self,
        clause: &str,
        order: &str,
        param: Option<String>,
    ) -> Listing<'_, FileRecord> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE {clause} ORDER BY {order}");
        Listing::new(self, sql, param, record_from_row)
    }
}

fn fill_duplicate_paths(catalog: &Catalog, group: &mut DuplicateGroup) -> Result<(), CatalogError> {
    let mut stmt = catalog
        .connection
        .prepare_cached("SELECT path FROM files WHERE checksum = ?1 ORDER BY path ASC")
        .map_err(map_sql_error)?;
    group.paths = stmt
        .query_map(params![group.checksum], |row| row.get::<_, String>(0))
        .map_err(map_sql_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(map_sql_error)?;
    Ok(())
}
