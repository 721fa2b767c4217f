//! Deterministic traversal of a staged artifact directory.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::PackageError;

/// One regular file inside the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Archive entry name: path relative to the root, `/`-separated.
    pub name: String,
    /// Absolute (or root-joined) path on disk.
    pub path: PathBuf,
}

/// Files of an artifact directory, sorted by entry name.
///
/// The order is the byte order of the `/`-separated relative path, never the
/// order the filesystem happens to enumerate in, so the same tree always
/// produces the same archive.
#[derive(Debug, Clone)]
pub struct ArtifactListing {
    root: PathBuf,
    entries: Vec<ListingEntry>,
}

impl ArtifactListing {
    /// Walk `root` recursively and collect every regular file.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::ArchiveIo`] if the tree cannot be read and
    /// [`PackageError::NonUtf8Path`] for names that cannot become archive
    /// entry names.
    pub fn scan(root: &Path) -> Result<Self, PackageError> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                PackageError::ArchiveIo {
                    path,
                    source: e.into(),
                }
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(|_| PackageError::NonUtf8Path(entry.path().to_path_buf()))?;
            let name = entry_name(rel)
                .ok_or_else(|| PackageError::NonUtf8Path(entry.path().to_path_buf()))?;

            entries.push(ListingEntry {
                name,
                path: entry.path().to_path_buf(),
            });
        }

        Ok(Self::from_entries(root, entries))
    }

    /// Build a listing from pre-collected entries, sorting them.
    pub fn from_entries(root: impl Into<PathBuf>, mut entries: Vec<ListingEntry>) -> Self {
        entries.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
        entries.dedup_by(|a, b| a.name == b.name);
        Self {
            root: root.into(),
            entries,
        }
    }

    /// Directory the listing was taken from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries in archive order.
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    /// Entry names in archive order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory held no files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Join path components with `/`, whatever the host separator is.
fn entry_name(rel: &Path) -> Option<String> {
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    let name = parts?.join("/");
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_order_ignores_creation_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::write(root.join("manifest.json"), "{}").unwrap();
        std::fs::create_dir_all(root.join("js")).unwrap();
        std::fs::write(root.join("js/desktop.js"), "x").unwrap();
        std::fs::write(root.join("icon.png"), [0u8; 4]).unwrap();

        let listing = ArtifactListing::scan(root).unwrap();
        let names: Vec<_> = listing.names().collect();
        assert_eq!(names, vec!["icon.png", "js/desktop.js", "manifest.json"]);
    }

    #[test]
    fn test_sorts_by_full_path_not_per_directory() {
        // '.' (0x2E) sorts before '/' (0x2F), so a.txt precedes a/b.
        let entries = vec![
            ListingEntry {
                name: "a/b".into(),
                path: PathBuf::from("a/b"),
            },
            ListingEntry {
                name: "a.txt".into(),
                path: PathBuf::from("a.txt"),
            },
            ListingEntry {
                name: "B".into(),
                path: PathBuf::from("B"),
            },
        ];
        let listing = ArtifactListing::from_entries(".", entries);
        let names: Vec<_> = listing.names().collect();
        assert_eq!(names, vec!["B", "a.txt", "a/b"]);
    }

    #[test]
    fn test_directories_are_not_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("css/empty")).unwrap();
        std::fs::write(dir.path().join("css/config.css"), "").unwrap();

        let listing = ArtifactListing::scan(dir.path()).unwrap();
        assert_eq!(listing.names().collect::<Vec<_>>(), vec!["css/config.css"]);
    }

    #[test]
    fn test_missing_root_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ArtifactListing::scan(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, PackageError::ArchiveIo { .. }));
    }
}
