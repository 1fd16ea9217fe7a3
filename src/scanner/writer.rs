use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{Receiver, SyncSender},
    },
};

use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogBatch, CatalogError, InsertOutcome, normalize_relative_path};

use super::{Candidate, ScanError};

/// Messages from the walker side to the writer.
#[derive(Debug)]
pub(super) enum WriterCommand {
    Insert(Candidate),
    /// Commit what is pending and acknowledge with [`WriterEvent::Committed`].
    Finish,
    /// Exit without further work; an uncommitted transaction is rolled back.
    Terminate,
}

/// Messages from the writer back to the walker.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum WriterEvent {
    /// The writer can take exactly one more candidate.
    Ready,
    Committed,
}

/// Counts candidates that were handed off but not yet picked up by the writer.
#[derive(Debug, Default)]
pub(super) struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub(super) fn sent(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub(super) fn received(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub(super) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub(super) struct WriterReport {
    pub(super) inserted: usize,
    pub(super) already_cataloged: usize,
    pub(super) skipped: usize,
    pub(super) commits: usize,
}

/// Writer half of a collection cycle. Holds the only write transaction.
pub(super) struct CatalogWriter<'a> {
    base: &'a Path,
    commit_interval: usize,
    in_flight: &'a InFlight,
}

impl<'a> CatalogWriter<'a> {
    pub(super) fn new(base: &'a Path, commit_interval: usize, in_flight: &'a InFlight) -> Self {
        Self {
            base,
            commit_interval: commit_interval.max(1),
            in_flight,
        }
    }

    pub(super) fn run(
        &self,
        catalog: &Catalog,
        commands: Receiver<WriterCommand>,
        events: SyncSender<WriterEvent>,
    ) -> Result<WriterReport, ScanError> {
        let mut report = WriterReport::default();
        let mut batch = Some(catalog.write_batch()?);
        signal(&events, WriterEvent::Ready)?;
        loop {
            // A closed channel means the walker gave up; treat it as terminate.
            let Ok(command) = commands.recv() else {
                debug!("Walker hung up; writer exiting");
                return Ok(report);
            };
            match command {
                WriterCommand::Insert(candidate) => {
                    self.in_flight.received();
                    let Some(active) = batch.as_mut() else {
                        return Err(ScanError::WriterDisconnected);
                    };
                    self.insert(active, &candidate, &mut report)?;
                    signal(&events, WriterEvent::Ready)?;
                }
                WriterCommand::Finish => {
                    if let Some(active) = batch.take() {
                        report.commits = active.commit()?;
                        info!(
                            inserted = report.inserted,
                            already_cataloged = report.already_cataloged,
                            commits = report.commits,
                            "Collection committed"
                        );
                    }
                    signal(&events, WriterEvent::Committed)?;
                }
                WriterCommand::Terminate => return Ok(report),
            }
        }
    }

    fn insert(
        &self,
        batch: &mut CatalogBatch<'_>,
        candidate: &Candidate,
        report: &mut WriterReport,
    ) -> Result<(), ScanError> {
        let relative = candidate
            .path
            .strip_prefix(self.base)
            .map_err(|_| ScanError::InvalidRoot(candidate.path.clone()))?;
        let relative = match normalize_relative_path(relative) {
            Ok(relative) => relative,
            Err(CatalogError::NonUtf8Path(path)) => {
                warn!(path = %path.display(), "Skipping file with a non UTF-8 name");
                report.skipped += 1;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };
        match batch.insert_new(&relative, candidate.size, candidate.mtime)? {
            InsertOutcome::Inserted => {
                report.inserted += 1;
                if report.inserted % self.commit_interval == 0 {
                    batch.flush_and_restart()?;
                    report.commits = batch.commits();
                    debug!(inserted = report.inserted, "Committed collection batch");
                }
            }
            InsertOutcome::AlreadyCataloged => report.already_cataloged += 1,
        }
        Ok(())
    }
}

fn signal(events: &SyncSender<WriterEvent>, event: WriterEvent) -> Result<(), ScanError> {
    events
        .send(event)
        .map_err(|_| ScanError::WriterDisconnected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecordFilter;
    use std::{sync::mpsc::sync_channel, thread};
    use tempfile::tempdir;

    fn candidate(base: &Path, name: &str) -> Candidate {
        Candidate {
            path: base.join(name),
            size: 1,
            mtime: 1,
        }
    }

    #[test]
    fn commits_every_interval_and_on_finish() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("tree");
        let mut catalog = Catalog::open(dir.path().join("catalog.db")).unwrap();
        let in_flight = InFlight::default();
        let (command_tx, command_rx) = sync_channel(0);
        let (event_tx, event_rx) = sync_channel(0);

        let report = thread::scope(|scope| {
            let catalog = &mut catalog;
            let writer = CatalogWriter::new(&base, 2, &in_flight);
            let handle = scope.spawn(move || writer.run(catalog, command_rx, event_tx));
            for name in ["a", "b", "c", "a"] {
                assert_eq!(event_rx.recv().unwrap(), WriterEvent::Ready);
                in_flight.sent();
                command_tx
                    .send(WriterCommand::Insert(candidate(&base, name)))
                    .unwrap();
            }
            assert_eq!(event_rx.recv().unwrap(), WriterEvent::Ready);
            command_tx.send(WriterCommand::Finish).unwrap();
            assert_eq!(event_rx.recv().unwrap(), WriterEvent::Committed);
            command_tx.send(WriterCommand::Terminate).unwrap();
            handle.join().unwrap().unwrap()
        });

        assert_eq!(report.inserted, 3);
        assert_eq!(report.already_cataloged, 1);
        assert_eq!(report.commits, 2);
        assert_eq!(catalog.count(RecordFilter::All).unwrap(), 3);
        assert_eq!(in_flight.peak(), 1);
    }

    #[test]
    fn terminate_without_finish_rolls_back_open_batch() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("tree");
        let mut catalog = Catalog::open(dir.path().join("catalog.db")).unwrap();
        let in_flight = InFlight::default();
        let (command_tx, command_rx) = sync_channel(0);
        let (event_tx, event_rx) = sync_channel(0);

        thread::scope(|scope| {
            let catalog = &mut catalog;
            let writer = CatalogWriter::new(&base, 100, &in_flight);
            let handle = scope.spawn(move || writer.run(catalog, command_rx, event_tx));
            assert_eq!(event_rx.recv().unwrap(), WriterEvent::Ready);
            in_flight.sent();
            command_tx
                .send(WriterCommand::Insert(candidate(&base, "a")))
                .unwrap();
            assert_eq!(event_rx.recv().unwrap(), WriterEvent::Ready);
            command_tx.send(WriterCommand::Terminate).unwrap();
            handle.join().unwrap().unwrap();
        });

        assert_eq!(catalog.count(RecordFilter::All).unwrap(), 0);
    }
}
