//! Storage backend abstraction.
//!
//! One interface, two implementations selected at construction time:
//! [`JsonFileBackend`] is the durable path (write-to-temp then atomic
//! rename), [`MemoryBackend`] substitutes for it in unit tests.

use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use thiserror::Error;

/// Errors raised by the storage subsystem.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Malformed client input. Mapped to HTTP 400; nothing is persisted.
    #[error("{0}")]
    Validation(String),
    /// Durable read/write failure.
    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// Record could not be encoded or decoded.
    #[error("storage encoding failure: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A place to keep one JSON document.
///
/// Both the state store and the report log persist a single document
/// through this trait. `load` returns `None` when no document exists yet;
/// `store` must replace the document atomically.
pub trait Backend: Send + Sync {
    fn load(&self) -> Result<Option<Value>, StoreError>;
    fn store(&self, doc: &Value) -> Result<(), StoreError>;
}

/// File-backed storage: one pretty-printed JSON document per file.
///
/// Writes go to a `.tmp` sibling first and are moved into place with
/// `fs::rename`, so a crash mid-write leaves either the prior complete
/// document or the new one, never a torn file. A missing or unparseable
/// file reads as `None`.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Backend for JsonFileBackend {
    fn load(&self) -> Result<Option<Value>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content).ok())
    }

    fn store(&self, doc: &Value) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        fs::write(&tmp_path, serde_json::to_vec_pretty(doc)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory storage for unit tests. Not durable.
#[derive(Default)]
pub struct MemoryBackend {
    doc: Mutex<Option<Value>>,
}

impl Backend for MemoryBackend {
    fn load(&self) -> Result<Option<Value>, StoreError> {
        let doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(doc.clone())
    }

    fn store(&self, doc: &Value) -> Result<(), StoreError> {
        let mut slot = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(doc.clone());
        Ok(())
    }
}

impl StoreError {
    /// True for client-input errors, false for persistence faults.
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_file_backend_missing_reads_none() {
        let tmp = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(tmp.path().join("missing.json"));
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn test_file_backend_round_trip() {
        let tmp = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(tmp.path().join("data").join("doc.json"));
        let doc = json!({"reports": [{"id": 1}]});
        backend.store(&doc).unwrap();
        assert_eq!(backend.load().unwrap(), Some(doc));
    }

    #[test]
    fn test_file_backend_corrupt_reads_none() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.json");
        std::fs::write(&path, "{not json").unwrap();
        let backend = JsonFileBackend::new(&path);
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn test_file_backend_leaves_no_tmp_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.json");
        let backend = JsonFileBackend::new(&path);
        backend.store(&json!({"a": 1})).unwrap();
        assert!(path.exists());
        assert!(!tmp.path().join("doc.json.tmp").exists());
    }

    #[test]
    fn test_memory_backend_round_trip() {
        let backend = MemoryBackend::default();
        assert!(backend.load().unwrap().is_none());
        backend.store(&json!({"a": 1})).unwrap();
        assert_eq!(backend.load().unwrap(), Some(json!({"a": 1})));
    }
}
