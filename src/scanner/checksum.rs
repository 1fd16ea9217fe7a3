use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogBatch, FileRecord, RecordFilter, RecordPage, SumColumn};

use super::hash::{HashAlgorithm, HashErrorPolicy, HashFailure, hash_file};
use super::{ChecksumStats, ScanError};

/// Default bytes hashed per committed page.
pub const DEFAULT_HASH_BYTES_PER_BATCH: u64 = 500_000_000;

/// Records per page so that each page hashes roughly `bytes_per_batch` bytes.
///
/// Never below one. An empty or all-zero-size pending set is processed as a single page.
pub fn block_size(file_count: u64, total_size: u64, bytes_per_batch: u64) -> usize {
    if file_count == 0 {
        return 1;
    }
    if total_size == 0 {
        return usize::try_from(file_count).unwrap_or(usize::MAX);
    }
    let average = total_size as f64 / file_count as f64;
    let block = (bytes_per_batch as f64 / average).round();
    if block < 1.0 { 1 } else { block as usize }
}

/// Produces the digest of one file.
pub(super) type Digester = fn(&Path, HashAlgorithm) -> Result<String, HashFailure>;

/// Hashing knobs shared by the checksum and verify passes.
#[derive(Debug, Clone, Copy)]
pub(super) struct HashSettings {
    pub(super) algorithm: HashAlgorithm,
    pub(super) bytes_per_batch: u64,
    pub(super) error_policy: HashErrorPolicy,
    pub(super) digest: Digester,
}

/// Result of hashing one record's file.
pub(super) enum Hashed {
    Digest(String),
    /// The file is gone, or unreadable under [`HashErrorPolicy::MarkMissing`].
    Missing,
}

impl HashSettings {
    pub(super) fn new(
        algorithm: HashAlgorithm,
        bytes_per_batch: u64,
        error_policy: HashErrorPolicy,
    ) -> Self {
        Self {
            algorithm,
            bytes_per_batch: bytes_per_batch.max(1),
            error_policy,
            digest: hash_file,
        }
    }

    /// Pending file count, pending bytes, and the derived block size for `filter`.
    pub(super) fn block_for(
        &self,
        catalog: &Catalog,
        filter: RecordFilter,
    ) -> Result<(u64, u64, usize), ScanError> {
        let files = catalog.count(filter)?;
        let bytes = catalog.sum(SumColumn::Size, filter)?;
        Ok((files, bytes, block_size(files, bytes, self.bytes_per_batch)))
    }

    pub(super) fn hash(&self, base: &Path, record: &FileRecord) -> Result<Hashed, ScanError> {
        let path = base.join(&record.path);
        match (self.digest)(&path, self.algorithm) {
            Ok(digest) => Ok(Hashed::Digest(digest)),
            Err(HashFailure::Open(err)) => {
                debug!(path = %path.display(), error = %err, "File vanished before hashing");
                Ok(Hashed::Missing)
            }
            Err(HashFailure::Read(source)) => match self.error_policy {
                HashErrorPolicy::Fatal => Err(ScanError::Hash { path, source }),
                HashErrorPolicy::MarkMissing => {
                    warn!(path = %path.display(), error = %source, "Read failed while hashing");
                    Ok(Hashed::Missing)
                }
            },
        }
    }
}

/// Repeatedly take the highest-id page of `filter` and hand each record to
/// `visit`, committing once per page, until the filter matches nothing.
///
/// `visit` must move every record out of the filtered set or this never ends.
/// A visit error drops the page's transaction, rolling it back.
pub(super) fn drain_pages(
    catalog: &Catalog,
    filter: RecordFilter,
    block_size: usize,
    cancel: Option<&AtomicBool>,
    mut visit: impl FnMut(&mut CatalogBatch<'_>, &FileRecord) -> Result<(), ScanError>,
) -> Result<usize, ScanError> {
    let limit = block_size.max(1);
    let mut pages = 0;
    loop {
        let page = catalog.page(filter, RecordPage::Tail { limit })?;
        if page.is_empty() {
            return Ok(pages);
        }
        let mut batch = catalog.write_batch()?;
        for record in &page {
            if let Some(cancel) = cancel
                && cancel.load(Ordering::Relaxed)
            {
                batch.commit()?;
                return Err(ScanError::Canceled);
            }
            visit(&mut batch, record)?;
        }
        batch.commit()?;
        pages += 1;
        debug!(page = pages, records = page.len(), "Committed hash page");
    }
}

/// Fill in checksums for every present record that lacks one.
pub(super) fn make_checksums(
    catalog: &Catalog,
    base: &Path,
    settings: HashSettings,
    cancel: Option<&AtomicBool>,
) -> Result<ChecksumStats, ScanError> {
    let (pending_files, pending_bytes, block_size) =
        settings.block_for(catalog, RecordFilter::PendingChecksum)?;
    let mut stats = ChecksumStats {
        pending_files,
        pending_bytes,
        block_size,
        ..ChecksumStats::default()
    };
    let pages = drain_pages(
        catalog,
        RecordFilter::PendingChecksum,
        block_size,
        cancel,
        |batch, record| {
            match settings.hash(base, record)? {
                Hashed::Digest(digest) => {
                    batch.set_checksum(record.id, &digest)?;
                    stats.hashed += 1;
                }
                Hashed::Missing => {
                    batch.mark_missing(record.id)?;
                    stats.missing += 1;
                }
            }
            Ok(())
        },
    )?;
    stats.pages = pages;
    info!(
        hashed = stats.hashed,
        missing = stats.missing,
        pages = stats.pages,
        block_size,
        "Checksum pass finished"
    );
    Ok(stats)
}
