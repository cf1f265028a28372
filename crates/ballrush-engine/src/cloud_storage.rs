//! Storage abstraction for local and cloud saves.
//!
//! This module provides:
//! - StorageBackend trait shared by the local store and the cloud
//! - LocalStorage with atomic writes (temp file + rename)
//! - MemoryStorage, an in-process backend with failure injection
//! - Sync status tracking

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ballrush_common::BallrushError;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found.
    #[error("File not found: {0}")]
    NotFound(String),

    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Backend not available.
    #[error("Storage backend not available: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether this is a missing-file error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StorageError> for BallrushError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => Self::Io(e),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Sync status of the save record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SyncStatus {
    /// Not synced: no cloud, or not signed in.
    #[default]
    LocalOnly,
    /// Local changes waiting for upload.
    PendingUpload,
    /// Cloud copy matches the last save.
    Synced,
    /// Last cloud operation failed; local copy is authoritative.
    Failed,
}

impl SyncStatus {
    /// Returns display name for the status.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::LocalOnly => "Local Only",
            Self::PendingUpload => "Uploading...",
            Self::Synced => "Synced",
            Self::Failed => "Sync Failed",
        }
    }

    /// Returns whether the cloud copy is current.
    #[must_use]
    pub fn is_synced(self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Trait for storage backends.
pub trait StorageBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Checks if the backend is available/connected.
    fn is_available(&self) -> bool;

    /// Reads a blob.
    fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Writes a blob, replacing any previous one.
    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Deletes a blob.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Checks if a blob exists.
    fn exists(&self, key: &str) -> StorageResult<bool>;
}

impl std::fmt::Debug for dyn StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Rejects keys that could escape the storage directory.
fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Empty key".to_string()));
    }

    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    for c in invalid_chars {
        if key.contains(c) {
            return Err(StorageError::InvalidKey(format!(
                "Invalid character '{c}' in key"
            )));
        }
    }
    if key == "." || key == ".." {
        return Err(StorageError::InvalidKey(key.to_string()));
    }

    Ok(())
}

// ============================================================================
// Local Storage
// ============================================================================

/// Local filesystem storage implementation.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    /// Base directory for storage.
    base_path: PathBuf,
}

impl LocalStorage {
    /// Creates a new local storage backend.
    #[must_use]
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Gets the full path for a key.
    fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    /// Returns the temp path for atomic writes.
    fn temp_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.tmp"))
    }

    /// Ensures the base directory exists.
    fn ensure_dir(&self) -> StorageResult<()> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)?;
        }
        Ok(())
    }
}

impl StorageBackend for LocalStorage {
    fn name(&self) -> &str {
        "Local Storage"
    }

    fn is_available(&self) -> bool {
        self.ensure_dir().is_ok()
    }

    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        match fs::read(self.key_path(key)) {
            Ok(data) => {
                debug!("Read {} bytes from {}", data.len(), key);
                Ok(data)
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.ensure_dir()?;

        let temp_path = self.temp_path(key);
        let final_path = self.key_path(key);

        // Write to temp file
        {
            let file = File::create(&temp_path)?;
            let mut writer = BufWriter::new(file);
            writer.write_all(data)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        // Atomic rename
        if let Err(e) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        debug!("Wrote {} bytes to {}", data.len(), key);
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.key_path(key).is_file())
    }
}

// ============================================================================
// Memory Storage
// ============================================================================

/// In-process storage. Stands in for a cloud backend in tests and the
/// headless driver; availability and failures can be switched at runtime.
#[derive(Debug)]
pub struct MemoryStorage {
    name: String,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    available: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new("Memory Storage")
    }
}

impl MemoryStorage {
    /// Creates an empty, available store.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blobs: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Marks the backend reachable or not.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Makes every read fail with a network error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every write fail with a network error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stored blob, bypassing failure injection.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().get(key).cloned()
    }

    /// Number of stored blobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    fn check_reachable(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(self.name.clone()))
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.check_reachable()?;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Network("read failed".to_string()));
        }
        self.blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        validate_key(key)?;
        self.check_reachable()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Network("write failed".to_string()));
        }
        self.blobs.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.check_reachable()?;
        self.blobs
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        self.check_reachable()?;
        Ok(self.blobs.read().contains_key(key))
    }
}
