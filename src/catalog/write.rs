use rusqlite::{Transaction, params};

use super::util::{is_unique_violation, map_sql_error};
use super::{Catalog, CatalogBatch, CatalogError, TriState};

/// Outcome of inserting a freshly walked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The path was already cataloged; the existing row is left untouched.
    AlreadyCataloged,
}

impl Catalog {
    /// Start a write batch that wraps related mutations in a single transaction.
    pub fn write_batch(&self) -> Result<CatalogBatch<'_>, CatalogError> {
        let tx = begin(&self.connection)?;
        Ok(CatalogBatch {
            connection: &self.connection,
            tx: Some(tx),
            commits: 0,
        })
    }

    /// Delete every record whose file was missing at the last look.
    pub fn prune_deleted(&self) -> Result<usize, CatalogError> {
        let removed = self
            .connection
            .execute("DELETE FROM files WHERE found = 0", [])
            .map_err(map_sql_error)?;
        Ok(removed)
    }

    /// Reset records that failed verification so the next cycle rehashes them.
    pub fn prune_changed(&self) -> Result<usize, CatalogError> {
        let reset = self
            .connection
            .execute(
                "UPDATE files
                 SET checksum = NULL, integrity_ok = NULL, size = NULL
                 WHERE integrity_ok = 0",
                [],
            )
            .map_err(map_sql_error)?;
        Ok(reset)
    }

    /// Clear verification results for every present file ahead of a verify run.
    pub fn reset_integrity(&self) -> Result<usize, CatalogError> {
        let reset = self
            .connection
            .execute("UPDATE files SET integrity_ok = NULL WHERE found = 1", [])
            .map_err(map_sql_error)?;
        Ok(reset)
    }
}

fn begin(connection: &rusqlite::Connection) -> Result<Transaction<'_>, CatalogError> {
    connection
        .unchecked_transaction()
        .map_err(map_sql_error)
}

impl<'conn> CatalogBatch<'conn> {
    fn tx(&self) -> Result<&Transaction<'conn>, CatalogError> {
        self.tx.as_ref().ok_or(CatalogError::Unexpected)
    }

    /// Insert a new record. A path that is already cataloged is reported, not failed.
    pub fn insert_new(
        &mut self,
        path: &str,
        size: u64,
        mtime: i64,
    ) -> Result<InsertOutcome, CatalogError> {
        let result = self
            .tx()?
            .prepare_cached(
                "INSERT INTO files (path, size, mtime, found) VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(map_sql_error)?
            .execute(params![path, size as i64, mtime, TriState::True.as_sql()]);
        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::AlreadyCataloged),
            Err(err) => Err(map_sql_error(err)),
        }
    }

    /// Record a fresh stat of a present file.
    pub fn update_stat(&mut self, id: i64, size: u64, mtime: i64) -> Result<(), CatalogError> {
        self.execute(
            "UPDATE files SET size = ?1, mtime = ?2, found = ?3 WHERE id = ?4",
            params![size as i64, mtime, TriState::True.as_sql(), id],
        )
    }

    /// Flag a record as missing, keeping its last known size, mtime and checksum.
    pub fn mark_missing(&mut self, id: i64) -> Result<(), CatalogError> {
        self.execute(
            "UPDATE files SET found = ?1 WHERE id = ?2",
            params![TriState::False.as_sql(), id],
        )
    }

    pub fn set_checksum(&mut self, id: i64, checksum: &str) -> Result<(), CatalogError> {
        self.execute(
            "UPDATE files SET checksum = ?1 WHERE id = ?2",
            params![checksum, id],
        )
    }

    pub fn set_integrity(&mut self, id: i64, integrity: TriState) -> Result<(), CatalogError> {
        self.execute(
            "UPDATE files SET integrity_ok = ?1 WHERE id = ?2",
            params![integrity.as_sql(), id],
        )
    }

    fn execute(&mut self, sql: &str, params: impl rusqlite::Params) -> Result<(), CatalogError> {
        self.tx()?
            .prepare_cached(sql)
            .map_err(map_sql_error)?
            .execute(params)
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Number of commits performed so far, including the final one.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// Commit everything written so far and open a fresh transaction.
    pub fn flush_and_restart(&mut self) -> Result<(), CatalogError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().map_err(map_sql_error)?;
            self.commits += 1;
        }
        self.tx = Some(begin(self.connection)?);
        Ok(())
    }

    /// Commit all batched operations atomically, returning the total commit count.
    pub fn commit(mut self) -> Result<usize, CatalogError> {
        if let Some(tx) = self.tx.take() {
            tx.commit().map_err(map_sql_error)?;
            self.commits += 1;
        }
        Ok(self.commits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecordFilter;
    use tempfile::tempdir;

    fn open() -> (tempfile::TempDir, Catalog) {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path().join("catalog.db")).unwrap();
        (dir, catalog)
    }

    #[test]
    fn insert_reports_duplicates_without_touching_the_row() {
        let (_dir, catalog) = open();
        let mut batch = catalog.write_batch().unwrap();
        assert_eq!(
            batch.insert_new("one.txt", 3, 10).unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            batch.insert_new("one.txt", 99, 20).unwrap(),
            InsertOutcome::AlreadyCataloged
        );
        batch.commit().unwrap();

        let record = catalog.record_by_path("one.txt").unwrap().unwrap();
        assert_eq!(record.size, Some(3));
        assert_eq!(record.mtime, Some(10));
        assert_eq!(record.found, TriState::True);
        assert_eq!(catalog.count(RecordFilter::All).unwrap(), 1);
    }

    #[test]
    fn flush_and_restart_commits_and_keeps_batch_usable() {
        let (_dir, catalog) = open();
        let mut batch = catalog.write_batch().unwrap();
        batch.insert_new("a.txt", 1, 1).unwrap();
        batch.flush_and_restart().unwrap();
        assert_eq!(batch.commits(), 1);
        batch.insert_new("b.txt", 1, 1).unwrap();
        assert_eq!(batch.commit().unwrap(), 2);
        assert_eq!(catalog.count(RecordFilter::All).unwrap(), 2);
    }

    #[test]
    fn dropped_batch_rolls_back_uncommitted_writes() {
        let (_dir, catalog) = open();
        {
            let mut batch = catalog.write_batch().unwrap();
            batch.insert_new("kept.txt", 1, 1).unwrap();
            batch.flush_and_restart().unwrap();
            batch.insert_new("lost.txt", 1, 1).unwrap();
        }
        let paths: Vec<String> = catalog
            .list_records()
            .unwrap()
            .into_iter()
            .map(|record| record.path)
            .collect();
        assert_eq!(paths, vec!["kept.txt".to_string()]);
    }

    #[test]
    fn ids_are_never_reused_after_prune() {
        let (_dir, catalog) = open();
        let mut batch = catalog.write_batch().unwrap();
        batch.insert_new("a.txt", 1, 1).unwrap();
        batch.insert_new("b.txt", 1, 1).unwrap();
        batch.commit().unwrap();
        let b = catalog.record_by_path("b.txt").unwrap().unwrap();

        let mut batch = catalog.write_batch().unwrap();
        batch.mark_missing(b.id).unwrap();
        batch.commit().unwrap();
        assert_eq!(catalog.prune_deleted().unwrap(), 1);

        let mut batch = catalog.write_batch().unwrap();
        batch.insert_new("c.txt", 1, 1).unwrap();
        batch.commit().unwrap();
        let c = catalog.record_by_path("c.txt").unwrap().unwrap();
        assert!(c.id > b.id);
    }

    #[test]
    fn prune_deleted_removes_only_missing_rows() {
        let (_dir, catalog) = open();
        catalog
            .connection
            .execute_batch(
                "INSERT INTO files (path, found) VALUES ('gone.txt', 0), ('here.txt', 1), ('new.txt', NULL);",
            )
            .unwrap();
        assert_eq!(catalog.prune_deleted().unwrap(), 1);
        let paths: Vec<String> = catalog
            .list_records()
            .unwrap()
            .into_iter()
            .map(|record| record.path)
            .collect();
        assert_eq!(paths, vec!["here.txt".to_string(), "new.txt".to_string()]);
    }

    #[test]
    fn prune_changed_resets_only_failed_rows() {
        let (_dir, catalog) = open();
        catalog
            .connection
            .execute_batch(
                "INSERT INTO files (path, size, checksum, found, integrity_ok) VALUES
                    ('bad.txt', 5, 'x', 1, 0),
                    ('good.txt', 6, 'y', 1, 1);",
            )
            .unwrap();
        assert_eq!(catalog.prune_changed().unwrap(), 1);
        let bad = catalog.record_by_path("bad.txt").unwrap().unwrap();
        assert_eq!(bad.checksum, None);
        assert_eq!(bad.size, None);
        assert_eq!(bad.integrity_ok, TriState::Unknown);
        let good = catalog.record_by_path("good.txt").unwrap().unwrap();
        assert_eq!(good.checksum.as_deref(), Some("y"));
        assert_eq!(good.size, Some(6));
        assert_eq!(good.integrity_ok, TriState::True);
    }
}
