//! Error types for the rotation core.
//!
//! Every failure is local and recoverable. A mutating operation that returns
//! an error leaves the persisted rotation untouched.

use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, TandaError>;

#[derive(Error, Debug)]
pub enum TandaError {
    /// Malformed member list, empty group, duplicate ids, bad amounts.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid payout frequency: {0}")]
    InvalidFrequency(String),

    #[error("Rotation not found for group {group_id}")]
    RotationNotFound { group_id: String },

    #[error("Member {member_id} is not part of the rotation for group {group_id}")]
    MemberNotFound { group_id: String, member_id: String },

    #[error("Group {group_id} already has an active rotation")]
    DuplicateRotation { group_id: String },

    #[error("Group {group_id} has no pending members left to draw")]
    NoRemainingMembers { group_id: String },

    /// Only raised when strict completion is enabled in the config.
    #[error("Member {member_id} already received the payout for group {group_id}")]
    AlreadyCompleted { group_id: String, member_id: String },

    #[error("Rotation {group_id} changed concurrently (expected version {expected}, found {found})")]
    ConcurrentModification { group_id: String, expected: u64, found: u64 },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl TandaError {
    /// Stable wire code used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            TandaError::InvalidInput(_) => "INVALID_INPUT",
            TandaError::UnknownStrategy(_) => "UNKNOWN_STRATEGY",
            TandaError::InvalidFrequency(_) => "INVALID_FREQUENCY",
            TandaError::RotationNotFound { .. } => "ROTATION_NOT_FOUND",
            TandaError::MemberNotFound { .. } => "MEMBER_NOT_FOUND",
            TandaError::DuplicateRotation { .. } => "DUPLICATE_ROTATION",
            TandaError::NoRemainingMembers { .. } => "NO_REMAINING_MEMBERS",
            TandaError::AlreadyCompleted { .. } => "ALREADY_COMPLETED",
            TandaError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            TandaError::InvalidConfig(_) => "INVALID_CONFIG",
            TandaError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// True when the caller sent something wrong, as opposed to an
    /// infrastructure failure the embedding application may retry.
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            TandaError::Storage(_)
                | TandaError::ConcurrentModification { .. }
                | TandaError::InvalidConfig(_)
        )
    }
}
