//! # tanda_core - Turn Assignment for Rotating Savings Groups
//!
//! Decides and tracks who receives the pooled payout in each cycle of a
//! tanda (rotating savings group).
//!
//! ## Features
//! - Four ordering strategies: lottery, sequential, contribution-based, needs-based
//! - Seedable draws for reproducible lotteries
//! - Append-only lottery audit history with result digests
//! - Payout completion tracking with optimistic version checks
//! - Dispute re-draws that keep completed turns fixed
//! - JSON API mirroring the HTTP routes of the group backend

pub mod api;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod store;
pub mod types;

// Re-export main API
pub use api::{ApiError, ApiResponse, LotteryApi};
pub use config::{DrawConfig, ScoringConfig, TandaConfig};
pub use coordinator::{
    Clock, CompletionOutcome, FixedClock, LotteryCoordinator, RotationOptions, RotationProgress,
    RotationReport, RotationStatus, SystemClock, TurnInfo,
};
pub use engine::{DrawSource, FixedDraws, OrderingContext, RotationEngine, SeededDraws};
pub use error::{Result, TandaError};
pub use store::{JsonFileStore, MemoryStore, RotationStore, StoreError};
pub use types::{
    DrawMethod, GroupId, GroupRotation, LotteryRecord, MemberId, PayoutFrequency, RankedMember,
    RotationPhase, Strategy, TurnAssignment, TurnStatus,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SCHEMA_VERSION: u8 = 1;
