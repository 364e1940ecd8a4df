use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use derive_more::Display;

/// The identity of the data behind a store.
///
/// Two store handles alias the same underlying data if and only if their identities are equal.
/// This is used to detect when the source and destination of a conversion are the same store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum StorageIdentity {
    /// An in-memory store, identified by a process-unique id.
    #[display("memory:{_0}")]
    Memory(u64),
    /// A filesystem store, identified by its canonical base path.
    #[display("file:{}", _0.display())]
    Filesystem(PathBuf),
}

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(0);

impl StorageIdentity {
    /// Allocate a new, unique, in-memory identity.
    #[must_use]
    pub fn new_memory() -> Self {
        Self::Memory(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a filesystem identity for `path`.
    ///
    /// The path is canonicalised if it exists, so that different spellings of the same directory compare equal.
    #[must_use]
    pub fn new_filesystem(path: &Path) -> Self {
        Self::Filesystem(std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_identities_are_unique() {
        let a = StorageIdentity::new_memory();
        let b = StorageIdentity::new_memory();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn filesystem_identity_canonical() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = StorageIdentity::new_filesystem(dir.path());
        let b = StorageIdentity::new_filesystem(&dir.path().join("."));
        assert_eq!(a, b);
    }
}
