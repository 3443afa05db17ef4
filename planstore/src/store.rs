//! Core Store implementation
//!
//! One JSON file per record under `{base}/{collection}/{id}.json`.
//! Archived records move to `{base}/archive/{collection}/{id}.json`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// A persistable record with identity and a version counter
///
/// The version must be bumped by the owner on every committed mutation;
/// the store enforces that writes carry a strictly newer version than the
/// copy on disk.
pub trait Record: Serialize + DeserializeOwned {
    /// Unique identifier within the collection
    fn id(&self) -> &str;

    /// Monotonically increasing version counter
    fn version(&self) -> u64;

    /// Collection (directory) name for this record type
    fn collection_name() -> &'static str;
}

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Version conflict on {id}: stored version {stored}, write carried {attempted}")]
    VersionConflict { id: String, stored: u64, attempted: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if this is a version conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// JSON-file backed record store
#[derive(Clone)]
pub struct Store {
    base_path: PathBuf,
}

impl Store {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        debug!(?base_path, "Opened plan store");
        Ok(Self { base_path })
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.base_path.join(collection)
    }

    fn record_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection).join(format!("{}.json", id))
    }

    fn archive_path(&self, collection: &str, id: &str) -> PathBuf {
        self.base_path.join("archive").join(collection).join(format!("{}.json", id))
    }

    /// Load a record by id, returning None if it does not exist
    pub fn get<T: Record>(&self, id: &str) -> Result<Option<T>, StoreError> {
        let path = self.record_path(T::collection_name(), id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let record = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    /// Load a record by id, erroring if it does not exist
    pub fn get_required<T: Record>(&self, id: &str) -> Result<T, StoreError> {
        self.get(id)?
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", T::collection_name(), id)))
    }

    /// Write a record, enforcing the optimistic-concurrency check
    ///
    /// Succeeds only if the record carries a strictly newer version than
    /// the stored copy (or no copy exists yet). The write goes through a
    /// temp file and rename so a crash never leaves a truncated record.
    pub fn put<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        let collection = T::collection_name();
        let id = record.id();

        if let Some(existing) = self.get::<T>(id)? {
            if record.version() <= existing.version() {
                debug!(
                    %id,
                    stored = existing.version(),
                    attempted = record.version(),
                    "put: rejecting stale write"
                );
                return Err(StoreError::VersionConflict {
                    id: id.to_string(),
                    stored: existing.version(),
                    attempted: record.version(),
                });
            }
        }

        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir)?;

        let path = self.record_path(collection, id);
        let tmp = dir.join(format!("{}.json.tmp", id));
        fs::write(&tmp, serde_json::to_string_pretty(record)?)?;
        fs::rename(&tmp, &path)?;

        debug!(%id, version = record.version(), %collection, "put: wrote record");
        Ok(())
    }

    /// List all record ids in a collection
    pub fn list_ids<T: Record>(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.collection_dir(T::collection_name());
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Load every record in a collection
    pub fn list<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        let mut records = Vec::new();
        for id in self.list_ids::<T>()? {
            if let Some(record) = self.get::<T>(&id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Move a record to the archive area
    ///
    /// Archived records no longer appear in `get`/`list` but remain on
    /// disk for audit.
    pub fn archive<T: Record>(&self, id: &str) -> Result<(), StoreError> {
        let collection = T::collection_name();
        let src = self.record_path(collection, id);
        if !src.exists() {
            return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
        }

        let dst = self.archive_path(collection, id);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&src, &dst)?;

        info!(%id, %collection, "Archived record");
        Ok(())
    }
}
