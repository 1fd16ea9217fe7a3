//! Catalog maintenance passes: collection, reconciliation, checksums, verify.

mod checksum;
mod errors;
mod hash;
mod pipeline;
mod reconcile;
mod stats;
mod verify;
mod walk;
mod writer;

pub use checksum::{DEFAULT_HASH_BYTES_PER_BATCH, block_size};
pub use errors::ScanError;
pub use hash::{HashAlgorithm, HashErrorPolicy};
pub use pipeline::{
    DEFAULT_COMMIT_INTERVAL, DEFAULT_RECONCILE_PAGE_SIZE, Pipeline, PipelineSettings,
    set_base_path,
};
pub use stats::{ChecksumStats, CollectStats, ReconcileStats, VerifyStats};
pub use walk::{Candidate, Walker};
