//! Resumable object storage.
//!
//! Every pipeline artifact lives behind the [`ObjectStore`] trait: raw bytes
//! plus JSON helpers and an existence check. Artifacts are written once,
//! complete, and never mutated — presence of a key is the resumability signal
//! that lets a re-run skip finished work.

pub mod fs;
pub mod keys;
pub mod memory;

pub use fs::FsObjectStore;
pub use keys::{assessment_key, encode_doi, paper_key};
pub use memory::MemoryObjectStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error for {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Key-value object store. Keys are `/`-separated logical paths built by
/// [`keys`]; values are immutable once written.
///
/// Writes to a given key are produced by exactly one logical computation
/// (one paper's extraction, one variant's aggregation) — concurrent writers
/// to the same key are a caller error, not something the store guards
/// against. Re-writing identical content is safe.
pub trait ObjectStore: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool, StorageError>;

    fn read_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    fn write_bytes(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Read and deserialize a JSON artifact.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<T, StorageError> {
    let bytes = store.read_bytes(key)?;
    serde_json::from_slice(&bytes).map_err(|e| StorageError::Json {
        key: key.to_string(),
        source: e,
    })
}

/// Serialize and write a JSON artifact.
pub fn write_json<T: Serialize>(
    store: &dyn ObjectStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Json {
        key: key.to_string(),
        source: e,
    })?;
    store.write_bytes(key, &bytes)
}
