use std::{path::Path, sync::atomic::AtomicBool};

use tracing::info;

use crate::catalog::{Catalog, RecordFilter, TriState};

use super::checksum::{HashSettings, Hashed, drain_pages};
use super::{ScanError, VerifyStats};

/// Rehash every present file and compare against the stored checksum.
///
/// Results land in `integrity_ok`; stored checksums are never overwritten on
/// a mismatch, so the discrepancy stays visible until pruned. A record with no
/// stored checksum adopts the fresh digest and counts as intact.
pub(super) fn verify(
    catalog: &Catalog,
    base: &Path,
    settings: HashSettings,
    cancel: Option<&AtomicBool>,
    stats: &mut VerifyStats,
) -> Result<(), ScanError> {
    catalog.reset_integrity()?;
    let (_, _, block_size) = settings.block_for(catalog, RecordFilter::PendingVerify)?;
    stats.block_size = block_size;
    let (mut ok, mut changed, mut missing) = (0, 0, 0);
    let result = drain_pages(
        catalog,
        RecordFilter::PendingVerify,
        block_size,
        cancel,
        |batch, record| {
            match settings.hash(base, record)? {
                Hashed::Digest(digest) => match record.checksum.as_deref() {
                    Some(stored) if stored == digest => {
                        batch.set_integrity(record.id, TriState::True)?;
                        ok += 1;
                    }
                    Some(_) => {
                        batch.set_integrity(record.id, TriState::False)?;
                        changed += 1;
                    }
                    None => {
                        batch.set_checksum(record.id, &digest)?;
                        batch.set_integrity(record.id, TriState::True)?;
                        ok += 1;
                    }
                },
                Hashed::Missing => {
                    batch.mark_missing(record.id)?;
                    missing += 1;
                }
            }
            Ok(())
        },
    );
    stats.ok = ok;
    stats.changed = changed;
    stats.missing = missing;
    stats.pages = result?;
    info!(ok, changed, missing, block_size, "Verify pass finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::checksum::make_checksums;
    use crate::scanner::hash::{HashAlgorithm, HashErrorPolicy};
    use std::fs;
    use tempfile::tempdir;

    fn settings() -> HashSettings {
        HashSettings::new(HashAlgorithm::Blake3, 1_000, HashErrorPolicy::Fatal)
    }

    #[test]
    fn flags_only_the_mutated_file() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.db")).unwrap();
        let mut batch = catalog.write_batch().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(dir.path().join(name), name.as_bytes()).unwrap();
            batch.insert_new(name, 5, 1).unwrap();
        }
        batch.commit().unwrap();
        make_checksums(&catalog, dir.path(), settings(), None).unwrap();
        let stored_b = catalog.record_by_path("b.txt").unwrap().unwrap().checksum;

        fs::write(dir.path().join("b.txt"), b"b.txT").unwrap();
        let mut stats = VerifyStats::default();
        verify(&catalog, dir.path(), settings(), None, &mut stats).unwrap();

        assert_eq!(stats.ok, 2);
        assert_eq!(stats.changed, 1);
        let b = catalog.record_by_path("b.txt").unwrap().unwrap();
        assert_eq!(b.integrity_ok, TriState::False);
        assert_eq!(b.checksum, stored_b);
        for name in ["a.txt", "c.txt"] {
            let record = catalog.record_by_path(name).unwrap().unwrap();
            assert_eq!(record.integrity_ok, TriState::True);
        }
    }

    #[test]
    fn unchecksummed_records_adopt_the_fresh_digest() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("new.txt"), b"abc").unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.db")).unwrap();
        let mut batch = catalog.write_batch().unwrap();
        batch.insert_new("new.txt", 3, 1).unwrap();
        batch.commit().unwrap();

        let mut stats = VerifyStats::default();
        verify(&catalog, dir.path(), settings(), None, &mut stats).unwrap();
        let record = catalog.record_by_path("new.txt").unwrap().unwrap();
        assert_eq!(record.integrity_ok, TriState::True);
        assert_eq!(
            record.checksum,
            Some(blake3::hash(b"abc").to_hex().to_string())
        );
    }
}
