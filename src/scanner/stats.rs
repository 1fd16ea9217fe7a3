/// Summary of a collection cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectStats {
    /// New records added to the catalog.
    pub inserted: usize,
    /// Candidates whose path was already cataloged.
    pub already_cataloged: usize,
    /// Files left out because their name cannot be stored losslessly.
    pub skipped: usize,
    /// Transactions committed by the writer, including the final one.
    pub commits: usize,
    /// Highest number of candidates handed off but not yet received by the writer.
    pub peak_in_flight: usize,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Records visited.
    pub checked: usize,
    /// Records whose file was present; size and mtime were refreshed.
    pub found: usize,
    /// Records whose file could not be opened; now flagged not found.
    pub missing: usize,
    /// Pages committed.
    pub pages: usize,
}

/// Summary of a checksum pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChecksumStats {
    /// Records lacking a checksum when the pass started.
    pub pending_files: u64,
    /// Combined size of those records in bytes.
    pub pending_bytes: u64,
    /// Records per committed page.
    pub block_size: usize,
    /// Pages committed.
    pub pages: usize,
    /// Checksums written.
    pub hashed: usize,
    /// Records flagged not found instead of hashed.
    pub missing: usize,
}

/// Summary of a reindex-and-check run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VerifyStats {
    /// Collection that ran first.
    pub collect: CollectStats,
    /// Reconciliation that followed collection.
    pub reconcile: ReconcileStats,
    /// Checksum pass for records that had none.
    pub checksum: ChecksumStats,
    /// Records per committed verify page.
    pub block_size: usize,
    /// Verify pages committed.
    pub pages: usize,
    /// Records whose content still matches the stored checksum.
    pub ok: usize,
    /// Records whose content no longer matches.
    pub changed: usize,
    /// Records that vanished during verification.
    pub missing: usize,
}
