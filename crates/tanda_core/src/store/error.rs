use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Format version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Stored record for {requested} belongs to group {found}")]
    KeyMismatch { requested: String, found: String },

    #[error("Version conflict on {group_id}: expected {expected:?}, found {found:?}")]
    VersionConflict { group_id: String, expected: Option<u64>, found: Option<u64> },

    #[error("Rotation {group_id} is locked by another writer")]
    Locked { group_id: String },

    #[error("Store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Transient failures worth retrying by the embedding application.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Locked { .. })
    }
}
