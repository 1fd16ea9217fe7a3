use std::path::{Path, PathBuf};

use rusqlite::{Connection, Transaction};
use thiserror::Error;

/// Option lookups and upserts.
pub mod options;
/// Aggregates and paged record reads.
pub mod read;
/// Read-only reporting views (rankings, duplicates, deleted, changed).
pub mod report;
/// SQLite schema management for catalog files.
pub mod schema;
/// Path normalisation and error mapping helpers.
pub mod util;
/// Batched write transactions.
pub mod write;

pub use read::{RecordFilter, RecordPage, SumColumn};
pub use report::{CatalogSummary, DuplicateGroup, Listing};
pub use write::InsertOutcome;
pub use util::normalize_relative_path;

/// Default filename for a catalog created next to the app config.
pub const DEFAULT_CATALOG_FILE_NAME: &str = "catalog.db";
/// Option key holding the directory every record path is relative to.
pub const OPTION_BASE_PATH: &str = "basepath";
/// Option key holding the hash algorithm the stored checksums were made with.
pub const OPTION_HASH_ALGORITHM: &str = "hash_algorithm";

/// Three-valued flag stored as a nullable integer column.
///
/// `found` and `integrity_ok` both use this so that "not yet observed" can
/// never be confused with `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriState {
    #[default]
    Unknown,
    True,
    False,
}

impl TriState {
    /// Convert to the SQLite representation (`NULL`, `1`, `0`).
    pub fn as_sql(self) -> Option<i64> {
        match self {
            TriState::Unknown => None,
            TriState::True => Some(1),
            TriState::False => Some(0),
        }
    }

    /// Parse a nullable integer column. Any non-zero value counts as true.
    pub fn from_sql(value: Option<i64>) -> Self {
        match value {
            None => TriState::Unknown,
            Some(0) => TriState::False,
            Some(_) => TriState::True,
        }
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::True
        } else {
            TriState::False
        }
    }
}

/// One cataloged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Surrogate key, assigned on first insert and never reused.
    pub id: i64,
    /// Path relative to the catalog base path, `/`-separated.
    pub path: String,
    /// Size in bytes, if known.
    pub size: Option<u64>,
    /// Last observed modification time in epoch seconds, if known.
    pub mtime: Option<i64>,
    /// Hex-encoded content digest, filled in by the checksum pass.
    pub checksum: Option<String>,
    /// Whether the file was present on disk at the last look.
    pub found: TriState,
    /// Result of the last verify pass.
    pub integrity_ok: TriState,
}

/// Errors returned when managing a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backing file could not be created or opened.
    #[error("Catalog unavailable at {path}: {source}")]
    StoreUnavailable {
        path: PathBuf,
        source: rusqlite::Error,
    },
    /// Failed to create the catalog's parent directory.
    #[error("Could not write to {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// SQLite query failed.
    #[error("Catalog query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Provided path was not relative to the base path.
    #[error("Path must be relative to the base path: {0}")]
    PathMustBeRelative(PathBuf),
    /// Provided path contained disallowed components or was empty.
    #[error("Path contains invalid relative components: {0}")]
    InvalidRelativePath(PathBuf),
    /// Path cannot be stored without losing bytes.
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
    /// Database is locked or busy.
    #[error("Catalog is busy, please retry")]
    Busy,
    /// SQLite returned an unexpected result.
    #[error("SQLite returned an unexpected result")]
    Unexpected,
}

/// SQLite-backed catalog of file records and options.
///
/// The connection is single-threaded; whoever holds `&mut Catalog` owns the
/// write handle for the duration of a pass.
pub struct Catalog {
    connection: Connection,
    path: PathBuf,
}

/// Groups catalog writes into one transaction that can be flushed and reopened.
pub struct CatalogBatch<'conn> {
    connection: &'conn Connection,
    tx: Option<Transaction<'conn>>,
    commits: usize,
}

impl Catalog {
    /// Open (or create) the catalog file and ensure its schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        util::create_parent_if_needed(path)?;
        let connection =
            Connection::open(path).map_err(|source| CatalogError::StoreUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog = Self {
            connection,
            path: path.to_path_buf(),
        };
        catalog.apply_pragmas()?;
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotently ensure both tables and their indices exist.
    pub fn init_schema(&self) -> Result<(), CatalogError> {
        schema::apply_schema(&self.connection)
    }

    /// Throughput over immediate durability: each batch boundary is a
    /// committed transaction, so a kill loses at most the in-flight batch.
    fn apply_pragmas(&self) -> Result<(), CatalogError> {
        self.connection
            .execute_batch(
                "PRAGMA synchronous = OFF;
             PRAGMA journal_size_limit = -1;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;",
            )
            .and_then(|_| {
                self.connection
                    .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
                        row.get::<_, i64>(0)
                    })
            })
            .map(|_| ())
            .map_err(|source| CatalogError::StoreUnavailable {
                path: self.path.clone(),
                source,
            })
    }
}
