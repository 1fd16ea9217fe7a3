use std::{
    collections::VecDeque,
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::warn;

use super::ScanError;

/// A regular file found during the walk, with the stat taken at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: i64,
}

/// Depth-first walk over a directory tree yielding regular files.
///
/// Entries are visited in file-name order so repeated walks over the same
/// tree produce the same sequence. Work happens lazily in `next`, which lets
/// the caller decide when the next traversal step may run.
pub struct Walker {
    stack: Vec<PathBuf>,
    files: VecDeque<PathBuf>,
}

impl Walker {
    /// Start a walk at `root`. Only an unreadable root is an error; anything
    /// unreadable below it is logged and skipped.
    pub fn new(root: &Path) -> Result<Self, ScanError> {
        let mut walker = Self {
            stack: Vec::new(),
            files: VecDeque::new(),
        };
        let entries = fs::read_dir(root).map_err(|source| ScanError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        walker.expand(root, entries);
        Ok(walker)
    }

    fn expand(&mut self, dir: &Path, entries: fs::ReadDir) {
        let mut children = Vec::new();
        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        dir = %dir.display(),
                        error = %err,
                        "Failed to read directory entry during walk"
                    );
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Failed to read file type during walk"
                    );
                    continue;
                }
            };
            if file_type.is_dir() || file_type.is_file() {
                children.push((entry.file_name(), path, file_type.is_dir()));
            }
        }
        children.sort_by(|a, b| a.0.cmp(&b.0));
        let mut subdirs = Vec::new();
        for (_, path, is_dir) in children {
            if is_dir {
                subdirs.push(path);
            } else {
                self.files.push_back(path);
            }
        }
        self.stack.extend(subdirs.into_iter().rev());
    }

    fn next_dir(&mut self) -> Option<()> {
        let dir = self.stack.pop()?;
        match fs::read_dir(&dir) {
            Ok(entries) => self.expand(&dir, entries),
            Err(err) => {
                warn!(
                    dir = %dir.display(),
                    error = %err,
                    "Failed to read directory during walk"
                );
            }
        }
        Some(())
    }
}

impl Iterator for Walker {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            let Some(path) = self.files.pop_front() else {
                self.next_dir()?;
                continue;
            };
            match stat(&path) {
                Ok((size, mtime)) => return Some(Candidate { path, size, mtime }),
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Failed to stat file during walk"
                    );
                }
            }
        }
    }
}

/// Size and modification time of a path, following the file type seen by the caller.
pub(crate) fn stat(path: &Path) -> std::io::Result<(u64, i64)> {
    let meta = fs::metadata(path)?;
    Ok((meta.len(), epoch_seconds(meta.modified()?)))
}

/// Whole seconds since the Unix epoch; earlier times come out negative.
pub(crate) fn epoch_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs().min(i64::MAX as u64) as i64,
        Err(before) => -(before.duration().as_secs().min(i64::MAX as u64) as i64),
    }
}
