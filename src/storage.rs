//! Local Best-Distance Storage
//!
//! The all-time best attempt distance survives between matches. It is read
//! once when a session is prepared and written only when beaten.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Serialize, Deserialize};
use tracing::debug;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// File could not be read or written
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// File contents are not a valid record
    #[error("storage format error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence for the best distance (whole metres).
pub trait BestDistanceStore: Send + Sync {
    /// Stored best, or 0 if nothing has been stored.
    fn load(&self) -> Result<u64, StorageError>;

    /// Replace the stored best.
    fn save(&self, distance_m: u64) -> Result<(), StorageError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct BestDistanceRecord {
    flappygull_best_distance: u64,
}

/// JSON file store.
#[derive(Debug, Clone)]
pub struct FileBestDistanceStore {
    path: PathBuf,
}

impl FileBestDistanceStore {
    /// Store at `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BestDistanceStore for FileBestDistanceStore {
    fn load(&self) -> Result<u64, StorageError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let record: BestDistanceRecord = serde_json::from_str(&text)?;
        Ok(record.flappygull_best_distance)
    }

    fn save(&self, distance_m: u64) -> Result<(), StorageError> {
        let text = serde_json::to_string(&BestDistanceRecord { flappygull_best_distance: distance_m })?;
        std::fs::write(&self.path, text)?;
        debug!(path = %self.path.display(), distance_m, "Best distance saved");
        Ok(())
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryBestDistanceStore {
    best: AtomicU64,
}

impl MemoryBestDistanceStore {
    /// Store starting at `distance_m`.
    pub fn new(distance_m: u64) -> Self {
        Self { best: AtomicU64::new(distance_m) }
    }
}

impl BestDistanceStore for MemoryBestDistanceStore {
    fn load(&self) -> Result<u64, StorageError> {
        Ok(self.best.load(Ordering::SeqCst))
    }

    fn save(&self, distance_m: u64) -> Result<(), StorageError> {
        self.best.store(distance_m, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("flappygull-{}-{name}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_missing_file_is_zero() {
        let store = FileBestDistanceStore::new(temp_path("missing"));
        assert_eq!(store.load().expect("readable"), 0);
    }

    #[test]
    fn test_file_save_then_load() {
        let path = temp_path("roundtrip");
        let store = FileBestDistanceStore::new(&path);
        store.save(137).expect("writable");
        assert_eq!(FileBestDistanceStore::new(&path).load().expect("readable"), 137);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let path = temp_path("corrupt");
        std::fs::write(&path, "not json").expect("writable");
        assert!(matches!(FileBestDistanceStore::new(&path).load(), Err(StorageError::Json(_))));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryBestDistanceStore::new(5);
        assert_eq!(store.load().expect("infallible"), 5);
        store.save(9).expect("infallible");
        assert_eq!(store.load().expect("infallible"), 9);
    }
}
