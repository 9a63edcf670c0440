use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::{RotationStore, StoreError};
use crate::types::GroupRotation;

pub const ROTATION_FORMAT_VERSION: u32 = 1;

const RECORD_EXTENSION: &str = "json";
const LOCK_EXTENSION: &str = "lock";

const LOCK_ATTEMPTS: u32 = 50;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);

/// On-disk envelope around a rotation.
#[derive(Serialize, Deserialize)]
struct StoredRotation {
    format_version: u32,
    rotation: GroupRotation,
}

/// One pretty-printed JSON file per group under `root`.
///
/// Group ids are form-urlencoded into file names, so ids containing path
/// separators cannot escape the data directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, group_id: &str) -> PathBuf {
        let encoded: String = url::form_urlencoded::byte_serialize(group_id.as_bytes()).collect();
        self.root.join(format!("{encoded}.{RECORD_EXTENSION}"))
    }

    fn lock_path(&self, group_id: &str) -> PathBuf {
        self.record_path(group_id).with_extension(LOCK_EXTENSION)
    }

    fn read_record(path: &Path) -> Result<GroupRotation, StoreError> {
        let content = fs::read_to_string(path)?;
        let stored: StoredRotation = serde_json::from_str(&content)?;
        if stored.format_version != ROTATION_FORMAT_VERSION {
            return Err(StoreError::VersionMismatch {
                found: stored.format_version,
                expected: ROTATION_FORMAT_VERSION,
            });
        }
        Ok(stored.rotation)
    }
}

/// Exclusive write lock on one group's record, held as a marker file created
/// with `create_new` and removed on drop.
///
/// A writer that dies holding the lock leaves the marker behind; writers then
/// fail with [`StoreError::Locked`] until it is removed.
struct RecordLock {
    path: PathBuf,
}

impl RecordLock {
    fn acquire(path: PathBuf, group_id: &str) -> Result<Self, StoreError> {
        for _ in 0..LOCK_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    thread::sleep(LOCK_RETRY_DELAY)
                }
                Err(e) => return Err(e.into()),
            }
        }
        tracing::warn!(group_id, path = %path.display(), "rotation record lock not acquired");
        Err(StoreError::Locked { group_id: group_id.to_string() })
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to release record lock"
            );
        }
    }
}

impl RotationStore for JsonFileStore {
    fn get(&self, group_id: &str) -> Result<Option<GroupRotation>, StoreError> {
        let path = self.record_path(group_id);
        if !path.exists() {
            return Ok(None);
        }

        let rotation = Self::read_record(&path)?;
        if rotation.group_id != group_id {
            return Err(StoreError::KeyMismatch {
                requested: group_id.to_string(),
                found: rotation.group_id,
            });
        }
        Ok(Some(rotation))
    }

    fn put(&self, rotation: &GroupRotation) -> Result<(), StoreError> {
        let path = self.record_path(&rotation.group_id);
        let stored =
            StoredRotation { format_version: ROTATION_FORMAT_VERSION, rotation: rotation.clone() };
        let data = serde_json::to_vec_pretty(&stored)?;

        // Atomic save: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&data)?;
            file.flush()?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;

        tracing::debug!(group_id = %rotation.group_id, bytes = data.len(), "rotation persisted");
        Ok(())
    }

    fn put_if_version(
        &self,
        rotation: &GroupRotation,
        expected: Option<u64>,
    ) -> Result<(), StoreError> {
        let group_id = &rotation.group_id;
        let _lock = RecordLock::acquire(self.lock_path(group_id), group_id)?;

        let found = self.get(group_id)?.map(|r| r.version);
        if found != expected {
            return Err(StoreError::VersionConflict {
                group_id: group_id.clone(),
                expected,
                found,
            });
        }
        self.put(rotation)
    }

    fn delete(&self, group_id: &str) -> Result<bool, StoreError> {
        let path = self.record_path(group_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        tracing::debug!(group_id, "rotation record removed");
        Ok(true)
    }

    fn group_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            ids.push(Self::read_record(&path)?.group_id);
        }
        ids.sort();
        Ok(ids)
    }
}
