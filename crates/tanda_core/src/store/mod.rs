//! Persistence seam for rotation state.
//!
//! The coordinator only talks to [`RotationStore`]; it keeps no global maps of
//! its own. [`MemoryStore`] backs tests and embedded use, [`JsonFileStore`]
//! keeps one JSON document per group on disk.

mod error;
mod file;
mod memory;

pub use error::StoreError;
pub use file::{JsonFileStore, ROTATION_FORMAT_VERSION};
pub use memory::MemoryStore;

use crate::types::GroupRotation;

/// Key-value store of rotations keyed by group id.
///
/// Implementations must make a single `put` atomic: readers see either the
/// previous record or the new one, never a mix.
pub trait RotationStore: Send + Sync {
    fn get(&self, group_id: &str) -> Result<Option<GroupRotation>, StoreError>;

    fn put(&self, rotation: &GroupRotation) -> Result<(), StoreError>;

    /// Compare-and-swap write. Stores `rotation` only if the stored record's
    /// version equals `expected` (`None` meaning no record), as one atomic
    /// step with respect to every other `put_if_version` on the same group.
    ///
    /// Fails with [`StoreError::VersionConflict`] otherwise.
    fn put_if_version(
        &self,
        rotation: &GroupRotation,
        expected: Option<u64>,
    ) -> Result<(), StoreError>;

    /// Returns whether a record existed.
    fn delete(&self, group_id: &str) -> Result<bool, StoreError>;

    fn group_ids(&self) -> Result<Vec<String>, StoreError>;
}

impl<S: RotationStore + ?Sized> RotationStore for std::sync::Arc<S> {
    fn get(&self, group_id: &str) -> Result<Option<GroupRotation>, StoreError> {
        (**self).get(group_id)
    }

    fn put(&self, rotation: &GroupRotation) -> Result<(), StoreError> {
        (**self).put(rotation)
    }

    fn put_if_version(
        &self,
        rotation: &GroupRotation,
        expected: Option<u64>,
    ) -> Result<(), StoreError> {
        (**self).put_if_version(rotation, expected)
    }

    fn delete(&self, group_id: &str) -> Result<bool, StoreError> {
        (**self).delete(group_id)
    }

    fn group_ids(&self) -> Result<Vec<String>, StoreError> {
        (**self).group_ids()
    }
}
