use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, SyncSender, sync_channel},
    },
    thread,
};

use tracing::info;

use crate::catalog::Catalog;

use super::checksum::{DEFAULT_HASH_BYTES_PER_BATCH, HashSettings, make_checksums};
use super::hash::{HashAlgorithm, HashErrorPolicy, resolve_algorithm};
use super::reconcile::reconcile;
use super::verify::verify;
use super::walk::{Candidate, Walker};
use super::writer::{CatalogWriter, InFlight, WriterCommand, WriterEvent};
use super::{ChecksumStats, CollectStats, ReconcileStats, ScanError, VerifyStats};

/// Successful inserts between writer commits.
pub const DEFAULT_COMMIT_INTERVAL: usize = 10_000;
/// Records per reconciliation page.
pub const DEFAULT_RECONCILE_PAGE_SIZE: usize = 10_000;

/// Tuning for a [`Pipeline`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub commit_interval: usize,
    pub reconcile_page_size: usize,
    pub hash_bytes_per_batch: u64,
    /// Used only when the catalog has no recorded algorithm yet.
    pub hash_algorithm: HashAlgorithm,
    pub hash_error_policy: HashErrorPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            reconcile_page_size: DEFAULT_RECONCILE_PAGE_SIZE,
            hash_bytes_per_batch: DEFAULT_HASH_BYTES_PER_BATCH,
            hash_algorithm: HashAlgorithm::default(),
            hash_error_policy: HashErrorPolicy::default(),
        }
    }
}

/// One run of catalog maintenance over a borrowed catalog.
///
/// Holding `&mut Catalog` makes the pipeline the only writer for as long as it
/// lives, so passes can never overlap.
pub struct Pipeline<'a> {
    catalog: &'a mut Catalog,
    settings: PipelineSettings,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> Pipeline<'a> {
    pub fn new(catalog: &'a mut Catalog, settings: PipelineSettings) -> Self {
        Self {
            catalog,
            settings,
            cancel: None,
        }
    }

    /// Honor `cancel` at every hand-off and every record.
    pub fn with_cancel(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The stored base path, checked to be a directory.
    pub fn base_path(&self) -> Result<PathBuf, ScanError> {
        let base = self
            .catalog
            .base_path()?
            .ok_or(ScanError::MissingBasePath)?;
        if base.is_dir() {
            Ok(base)
        } else {
            Err(ScanError::InvalidRoot(base))
        }
    }

    /// Walk the base path and insert every file not yet cataloged.
    pub fn collect(&mut self) -> Result<CollectStats, ScanError> {
        let base = self.base_path()?;
        let walker = Walker::new(&base)?;
        self.collect_from(&base, walker)
    }

    /// Run the rendezvous over `candidates`, which must lie under `base`.
    fn collect_from(
        &mut self,
        base: &Path,
        candidates: impl Iterator<Item = Candidate>,
    ) -> Result<CollectStats, ScanError> {
        let cancel = self.cancel;
        let in_flight = InFlight::default();
        let writer = CatalogWriter::new(base, self.settings.commit_interval, &in_flight);
        let catalog = &mut *self.catalog;
        let (command_tx, command_rx) = sync_channel(0);
        let (event_tx, event_rx) = sync_channel(0);

        let (produced, written) = thread::scope(|scope| {
            let handle = scope.spawn(move || writer.run(catalog, command_rx, event_tx));
            let produced = produce(candidates, cancel, &command_tx, &event_rx, &in_flight);
            drop(command_tx);
            drop(event_rx);
            let written = handle.join().map_err(|_| ScanError::WriterPanicked);
            (produced, written)
        });
        let report = match (produced, written?) {
            (Ok(()), Ok(report)) => report,
            (Err(ScanError::WriterDisconnected), Err(err)) => return Err(err),
            (Err(err), _) | (Ok(()), Err(err)) => return Err(err),
        };
        let stats = CollectStats {
            inserted: report.inserted,
            already_cataloged: report.already_cataloged,
            skipped: report.skipped,
            commits: report.commits,
            peak_in_flight: in_flight.peak(),
        };
        info!(
            base = %base.display(),
            inserted = stats.inserted,
            already_cataloged = stats.already_cataloged,
            skipped = stats.skipped,
            "Collection finished"
        );
        Ok(stats)
    }

    /// Re-stat every record, flagging files that disappeared.
    pub fn check(&mut self) -> Result<ReconcileStats, ScanError> {
        let base = self.base_path()?;
        reconcile(
            self.catalog,
            &base,
            self.settings.reconcile_page_size,
            self.cancel,
        )
    }

    /// Hash every present record that has no checksum yet.
    pub fn make_checksums(&mut self) -> Result<ChecksumStats, ScanError> {
        let base = self.base_path()?;
        let settings = self.hash_settings()?;
        make_checksums(self.catalog, &base, settings, self.cancel)
    }

    /// Collect, reconcile, fill missing checksums, then rehash everything and
    /// flag records whose content changed.
    pub fn reindex_check(&mut self) -> Result<VerifyStats, ScanError> {
        let base = self.base_path()?;
        let settings = self.hash_settings()?;
        let mut stats = VerifyStats {
            collect: self.collect()?,
            ..VerifyStats::default()
        };
        stats.reconcile = self.check()?;
        stats.checksum = make_checksums(self.catalog, &base, settings, self.cancel)?;
        verify(self.catalog, &base, settings, self.cancel, &mut stats)?;
        Ok(stats)
    }

    fn hash_settings(&self) -> Result<HashSettings, ScanError> {
        Ok(HashSettings::new(
            resolve_algorithm(self.catalog, self.settings.hash_algorithm)?,
            self.settings.hash_bytes_per_batch,
            self.settings.hash_error_policy,
        ))
    }
}

/// Validate `path` as a directory and store its canonical form as the base path.
pub fn set_base_path(catalog: &Catalog, path: &Path) -> Result<PathBuf, ScanError> {
    if !path.is_dir() {
        return Err(ScanError::InvalidRoot(path.to_path_buf()));
    }
    let canonical = path.canonicalize().map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    catalog.set_base_path(&canonical)?;
    Ok(canonical)
}

/// Walker half of the rendezvous: wait for `Ready`, then produce and send
/// exactly one candidate.
fn produce(
    mut candidates: impl Iterator<Item = Candidate>,
    cancel: Option<&AtomicBool>,
    commands: &SyncSender<WriterCommand>,
    events: &Receiver<WriterEvent>,
    in_flight: &InFlight,
) -> Result<(), ScanError> {
    loop {
        expect_event(events, WriterEvent::Ready)?;
        if let Some(cancel) = cancel
            && cancel.load(Ordering::Relaxed)
        {
            finish(commands, events)?;
            return Err(ScanError::Canceled);
        }
        let Some(candidate) = candidates.next() else {
            break;
        };
        in_flight.sent();
        commands
            .send(WriterCommand::Insert(candidate))
            .map_err(|_| ScanError::WriterDisconnected)?;
    }
    finish(commands, events)
}

fn finish(
    commands: &SyncSender<WriterCommand>,
    events: &Receiver<WriterEvent>,
) -> Result<(), ScanError> {
    commands
        .send(WriterCommand::Finish)
        .map_err(|_| ScanError::WriterDisconnected)?;
    expect_event(events, WriterEvent::Committed)?;
    commands
        .send(WriterCommand::Terminate)
        .map_err(|_| ScanError::WriterDisconnected)
}

fn expect_event(events: &Receiver<WriterEvent>, expected: WriterEvent) -> Result<(), ScanError> {
    match events.recv() {
        Ok(event) if event == expected => Ok(()),
        _ => Err(ScanError::WriterDisconnected),
    }
}
