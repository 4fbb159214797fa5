//! Baseline store - named reference images under a fixed root

use std::path::{Path, PathBuf};

use crate::error::SnapResult;

/// Directory of accepted reference images, keyed by check name.
///
/// Entries are only ever created during a run, never mutated or deleted, so an
/// existence check going stale between calls is harmless.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    root: PathBuf,
}

impl BaselineStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a baseline exists for `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Path a baseline for `name` would live at. Does not guarantee existence.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.png", name))
    }

    /// Names of all stored baselines.
    pub fn names(&self) -> SnapResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(vec![]);
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "png").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_root_yields_no_names() {
        let store = BaselineStore::new("/nonexistent/baselines");
        assert!(!store.exists("CardList"));
        assert!(store.names().unwrap().is_empty());
    }

    #[test]
    fn names_list_png_stems_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CardList.png"), b"x").unwrap();
        std::fs::write(dir.path().join("MoviePage.png"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let store = BaselineStore::new(dir.path());
        assert!(store.exists("CardList"));
        assert!(!store.exists("notes"));
        assert_eq!(store.names().unwrap(), vec!["CardList", "MoviePage"]);
    }

    #[test]
    fn path_is_rooted_and_png() {
        let store = BaselineStore::new("/tmp/baselines");
        assert_eq!(
            store.path("CardList"),
            PathBuf::from("/tmp/baselines/CardList.png")
        );
    }
}
