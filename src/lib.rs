//! File catalog with duplicate, deletion and bit-rot detection.
/// Config and log directory resolution.
pub mod app_dirs;
/// SQLite-backed catalog of file records and options.
pub mod catalog;
/// `config.toml` handling.
pub mod config;
/// Tracing subscriber setup.
pub mod logging;
/// Walk, collection, reconciliation, checksum and verify passes.
pub mod scanner;
