//! Test helper functions and utilities.

use std::path::{Path, PathBuf};

/// Assert that every file in `files` has identical bytes under both roots.
pub fn assert_same_files(expected_root: &Path, actual_root: &Path, files: &[PathBuf]) {
    for rel in files {
        let expected = std::fs::read(expected_root.join(rel))
            .unwrap_or_else(|e| panic!("missing expected {}: {}", rel.display(), e));
        let actual = std::fs::read(actual_root.join(rel))
            .unwrap_or_else(|e| panic!("missing restored {}: {}", rel.display(), e));
        assert!(expected == actual, "{} differs after restore", rel.display());
    }
}

/// Whether `dir` has no entries.
pub fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(true)
}
