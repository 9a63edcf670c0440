use std::collections::HashMap;
use std::sync::RwLock;

use super::{RotationStore, StoreError};
use crate::types::GroupRotation;

/// In-process store. Records are cloned in and out, so callers never hold
/// references into shared state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rotations: RwLock<HashMap<String, GroupRotation>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rotations, read through a poisoned lock as well.
    pub fn len(&self) -> usize {
        match self.rotations.read() {
            Ok(rotations) => rotations.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RotationStore for MemoryStore {
    fn get(&self, group_id: &str) -> Result<Option<GroupRotation>, StoreError> {
        let rotations = self.rotations.read().map_err(|_| StoreError::Poisoned)?;
        Ok(rotations.get(group_id).cloned())
    }

    fn put(&self, rotation: &GroupRotation) -> Result<(), StoreError> {
        let mut rotations = self.rotations.write().map_err(|_| StoreError::Poisoned)?;
        rotations.insert(rotation.group_id.clone(), rotation.clone());
        Ok(())
    }

    fn put_if_version(
        &self,
        rotation: &GroupRotation,
        expected: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut rotations = self.rotations.write().map_err(|_| StoreError::Poisoned)?;
        let found = rotations.get(&rotation.group_id).map(|r| r.version);
        if found != expected {
            return Err(StoreError::VersionConflict {
                group_id: rotation.group_id.clone(),
                expected,
                found,
            });
        }
        rotations.insert(rotation.group_id.clone(), rotation.clone());
        Ok(())
    }

    fn delete(&self, group_id: &str) -> Result<bool, StoreError> {
        let mut rotations = self.rotations.write().map_err(|_| StoreError::Poisoned)?;
        Ok(rotations.remove(group_id).is_some())
    }

    fn group_ids(&self) -> Result<Vec<String>, StoreError> {
        let rotations = self.rotations.read().map_err(|_| StoreError::Poisoned)?;
        let mut ids: Vec<String> = rotations.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
