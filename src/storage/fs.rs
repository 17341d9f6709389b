//! Filesystem-backed object store.
//!
//! Keys map directly onto paths under a root directory. Key components are
//! percent-encoded by [`super::keys`], so no component can escape the root.

use std::path::{Path, PathBuf};

use super::{ObjectStore, StorageError};

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for component in key.split('/') {
            path.push(component);
        }
        path
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ObjectStore for FsObjectStore {
    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.path_for(key).is_file())
    }

    fn read_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    key: key.to_string(),
                }
            } else {
                StorageError::Io {
                    key: key.to_string(),
                    source: e,
                }
            }
        })
    }

    fn write_bytes(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                key: key.to_string(),
                source: e,
            })?;
        }
        std::fs::write(&path, data).map_err(|e| StorageError::Io {
            key: key.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::keys::paper_key;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let key = paper_key("10.1/x", "source.pdf");
        assert!(!store.exists(&key).unwrap());

        store.write_bytes(&key, b"%PDF-1.4").unwrap();
        assert!(store.exists(&key).unwrap());
        assert_eq!(store.read_bytes(&key).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn missing_key_reads_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let result = store.read_bytes("papers/none/document.json");
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn rewrite_same_key_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        store.write_bytes("a/b", b"one").unwrap();
        store.write_bytes("a/b", b"one").unwrap();
        assert_eq!(store.read_bytes("a/b").unwrap(), b"one");
    }

    #[test]
    fn encoded_doi_stays_one_path_component() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let key = paper_key("10.1002/(SICI)1098<x>", "metadata.json");
        store.write_bytes(&key, b"{}").unwrap();

        // Exactly one directory level under papers/.
        let papers_dir = dir.path().join("papers");
        let entries: Vec<_> = std::fs::read_dir(&papers_dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
