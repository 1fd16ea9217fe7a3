use std::path::{Path, PathBuf};

use checksummer::{
    catalog::{Catalog, FileRecord},
    scanner::set_base_path,
};
use tempfile::TempDir;

/// A scratch directory holding a file tree and a catalog that tracks it.
pub struct TreeFixture {
    _temp: TempDir,
    pub root: PathBuf,
    pub catalog: Catalog,
}

impl TreeFixture {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let temp = tempfile::tempdir().expect("create tempdir");
        let tree = temp.path().join("tree");
        std::fs::create_dir_all(&tree).expect("create tree dir");
        for (name, contents) in files {
            write_file(&tree, name, contents.as_bytes());
        }
        let catalog = Catalog::open(temp.path().join("state").join("catalog.db"))
            .expect("open catalog");
        let root = set_base_path(&catalog, &tree).expect("set base path");
        Self {
            _temp: temp,
            root,
            catalog,
        }
    }

    pub fn write(&self, name: &str, contents: &str) {
        write_file(&self.root, name, contents.as_bytes());
    }

    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.root.join(name)).expect("remove file");
    }

    pub fn record(&self, path: &str) -> FileRecord {
        self.catalog
            .record_by_path(path)
            .expect("query record")
            .unwrap_or_else(|| panic!("no record for {path}"))
    }
}

pub fn write_file(root: &Path, name: &str, bytes: &[u8]) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(&path, bytes).expect("write file");
}
