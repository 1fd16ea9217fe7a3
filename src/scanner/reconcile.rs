use std::{
    fs::File,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use tracing::{debug, info};

use crate::catalog::{Catalog, FileRecord, RecordFilter, RecordPage};

use super::walk::epoch_seconds;
use super::{ReconcileStats, ScanError};

/// Re-stat every cataloged record, one committed transaction per page.
pub(super) fn reconcile(
    catalog: &Catalog,
    base: &Path,
    page_size: usize,
    cancel: Option<&AtomicBool>,
) -> Result<ReconcileStats, ScanError> {
    let mut stats = ReconcileStats::default();
    let limit = page_size.max(1);
    let mut after_id = 0;
    loop {
        let page = catalog.page(RecordFilter::All, RecordPage::After { after_id, limit })?;
        let Some(last) = page.last() else {
            break;
        };
        after_id = last.id;
        let mut batch = catalog.write_batch()?;
        for record in &page {
            if let Some(cancel) = cancel
                && cancel.load(Ordering::Relaxed)
            {
                batch.commit()?;
                return Err(ScanError::Canceled);
            }
            stats.checked += 1;
            match probe(base, record) {
                Some((size, mtime)) => {
                    batch.update_stat(record.id, size, mtime)?;
                    stats.found += 1;
                }
                None => {
                    batch.mark_missing(record.id)?;
                    stats.missing += 1;
                }
            }
        }
        batch.commit()?;
        stats.pages += 1;
        debug!(after_id, records = page.len(), "Reconciled page");
    }
    info!(
        checked = stats.checked,
        found = stats.found,
        missing = stats.missing,
        "Reconciliation finished"
    );
    Ok(stats)
}

/// Open the record's file and stat it; `None` when it is gone or no longer a regular file.
fn probe(base: &Path, record: &FileRecord) -> Option<(u64, i64)> {
    let path = base.join(&record.path);
    let meta = File::open(&path).and_then(|file| file.metadata()).ok()?;
    if !meta.is_file() {
        return None;
    }
    let mtime = meta.modified().ok().map(epoch_seconds)?;
    Some((meta.len(), mtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TriState;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn updates_present_files_and_flags_missing_ones() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("tree");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("kept.txt"), b"grown content").unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.db")).unwrap();
        let mut batch = catalog.write_batch().unwrap();
        batch.insert_new("kept.txt", 1, 1).unwrap();
        batch.insert_new("gone.txt", 7, 3).unwrap();
        batch.commit().unwrap();
        let gone = catalog.record_by_path("gone.txt").unwrap().unwrap();
        let mut batch = catalog.write_batch().unwrap();
        batch.set_checksum(gone.id, "abc").unwrap();
        batch.commit().unwrap();

        let stats = reconcile(&catalog, &base, 1, None).unwrap();
        assert_eq!(stats.checked, 2);
        assert_eq!(stats.found, 1);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.pages, 2);

        let kept = catalog.record_by_path("kept.txt").unwrap().unwrap();
        assert_eq!(kept.size, Some(13));
        assert_eq!(kept.found, TriState::True);
        let gone = catalog.record_by_path("gone.txt").unwrap().unwrap();
        assert_eq!(gone.found, TriState::False);
        assert_eq!(gone.size, Some(7));
        assert_eq!(gone.mtime, Some(3));
        assert_eq!(gone.checksum.as_deref(), Some("abc"));
    }

    #[test]
    fn path_replaced_by_directory_counts_as_missing() {
        let dir = tempdir().unwrap();
        let base = dir.path().to_path_buf();
        fs::create_dir_all(base.join("was_file")).unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.db")).unwrap();
        let mut batch = catalog.write_batch().unwrap();
        batch.insert_new("was_file", 1, 1).unwrap();
        batch.commit().unwrap();

        let stats = reconcile(&catalog, &base, 10, None).unwrap();
        assert_eq!(stats.missing, 1);
    }

    #[test]
    fn cancel_stops_before_touching_records() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.db")).unwrap();
        let mut batch = catalog.write_batch().unwrap();
        batch.insert_new("a.txt", 1, 1).unwrap();
        batch.commit().unwrap();
        let cancel = AtomicBool::new(true);
        let err = reconcile(&catalog, dir.path(), 10, Some(&cancel)).unwrap_err();
        assert!(matches!(err, ScanError::Canceled));
        let record = catalog.record_by_path("a.txt").unwrap().unwrap();
        assert_eq!(record.found, TriState::True);
    }
}
