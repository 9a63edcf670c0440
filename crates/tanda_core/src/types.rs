//! Rotation data model: strategies, turn assignments, lottery audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::TandaError;

pub type GroupId = String;
pub type MemberId = String;

/// How the payout order of a group is decided. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Uniform random draw, lowest number goes first
    Lottery,
    /// Creation order
    Sequential,
    /// Highest contributor goes first
    ContributionBased,
    /// Highest need score goes first
    NeedsBased,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::Lottery,
        Strategy::Sequential,
        Strategy::ContributionBased,
        Strategy::NeedsBased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Lottery => "lottery",
            Strategy::Sequential => "sequential",
            Strategy::ContributionBased => "contribution_based",
            Strategy::NeedsBased => "needs_based",
        }
    }

    /// Whether a smaller draw number earns an earlier turn.
    pub fn is_ascending(&self) -> bool {
        matches!(self, Strategy::Lottery | Strategy::Sequential)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = TandaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lottery" => Ok(Strategy::Lottery),
            "sequential" => Ok(Strategy::Sequential),
            "contribution_based" => Ok(Strategy::ContributionBased),
            "needs_based" => Ok(Strategy::NeedsBased),
            other => Err(TandaError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Payout cadence used to derive advisory payout dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutFrequency {
    #[default]
    Weekly,
    Biweekly,
    Monthly,
}

impl PayoutFrequency {
    pub fn weeks_multiplier(&self) -> i64 {
        match self {
            PayoutFrequency::Weekly => 1,
            PayoutFrequency::Biweekly => 2,
            PayoutFrequency::Monthly => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutFrequency::Weekly => "weekly",
            PayoutFrequency::Biweekly => "biweekly",
            PayoutFrequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for PayoutFrequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutFrequency {
    type Err = TandaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "weekly" => Ok(PayoutFrequency::Weekly),
            "biweekly" => Ok(PayoutFrequency::Biweekly),
            "monthly" => Ok(PayoutFrequency::Monthly),
            other => Err(TandaError::InvalidFrequency(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Pending,
    Completed,
}

/// Lifecycle of a rotation. Creation runs synchronously, so a stored
/// rotation is always either in progress or complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPhase {
    InProgress,
    Complete,
}

/// One position in the ordering produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMember {
    pub member_id: MemberId,
    pub rank: u32,
    pub draw_number: f64,
}

/// A member's turn within a rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnAssignment {
    pub member_id: MemberId,
    pub rank: u32,
    pub draw_number: f64,
    pub status: TurnStatus,
    pub expected_payout_date: DateTime<Utc>,
    #[serde(default)]
    pub payout_amount: Option<f64>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TurnAssignment {
    pub fn is_pending(&self) -> bool {
        self.status == TurnStatus::Pending
    }

    pub(crate) fn complete(&mut self, amount: f64, at: DateTime<Utc>) {
        self.status = TurnStatus::Completed;
        self.payout_amount = Some(amount);
        self.completed_at = Some(at);
    }
}

/// Why a lottery record exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawMethod {
    Initial { strategy: Strategy },
    Redraw { reason: String },
}

impl DrawMethod {
    pub fn is_redraw(&self) -> bool {
        matches!(self, DrawMethod::Redraw { .. })
    }
}

/// Append-only audit entry for a single draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotteryRecord {
    pub record_id: Uuid,
    pub group_id: GroupId,
    pub conducted_at: DateTime<Utc>,
    pub participants: Vec<MemberId>,
    pub result: Vec<RankedMember>,
    pub method: DrawMethod,
    pub result_digest: String,
}

impl LotteryRecord {
    pub fn new(
        group_id: &str,
        conducted_at: DateTime<Utc>,
        participants: Vec<MemberId>,
        result: Vec<RankedMember>,
        method: DrawMethod,
    ) -> Self {
        let result_digest = digest_result(&result);
        Self {
            record_id: Uuid::new_v4(),
            group_id: group_id.to_string(),
            conducted_at,
            participants,
            result,
            method,
            result_digest,
        }
    }

    /// Recomputes the digest over `result` and compares it to the stored one.
    pub fn verify_digest(&self) -> bool {
        digest_result(&self.result) == self.result_digest
    }
}

fn digest_result(result: &[RankedMember]) -> String {
    let mut hasher = Sha256::new();
    for entry in result {
        hasher.update(format!("{}:{}:{}\n", entry.member_id, entry.rank, entry.draw_number));
    }
    format!("{:x}", hasher.finalize())
}

/// Persisted rotation state for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRotation {
    pub group_id: GroupId,
    /// Creation order; re-draws iterate members in this order.
    pub members: Vec<MemberId>,
    pub strategy: Strategy,
    pub frequency: PayoutFrequency,
    pub created_at: DateTime<Utc>,
    /// Reference date for expected payout dates.
    pub started_at: DateTime<Utc>,
    /// Sorted by rank.
    pub turn_order: Vec<TurnAssignment>,
    /// Completion order.
    pub completed_turns: Vec<MemberId>,
    pub lottery_history: Vec<LotteryRecord>,
    /// Bumped on every persisted mutation.
    pub version: u64,
}

impl GroupRotation {
    pub fn total_members(&self) -> usize {
        self.members.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed_turns.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed_turns.len() == self.members.len()
    }

    pub fn phase(&self) -> RotationPhase {
        if self.is_complete() {
            RotationPhase::Complete
        } else {
            RotationPhase::InProgress
        }
    }

    pub fn progress_percentage(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.total_members() as f64 * 100.0
    }

    /// Lowest-rank pending assignment.
    pub fn next_pending(&self) -> Option<&TurnAssignment> {
        self.turn_order.iter().filter(|t| t.is_pending()).min_by_key(|t| t.rank)
    }

    pub fn assignment(&self, member_id: &str) -> Option<&TurnAssignment> {
        self.turn_order.iter().find(|t| t.member_id == member_id)
    }

    pub(crate) fn assignment_mut(&mut self, member_id: &str) -> Option<&mut TurnAssignment> {
        self.turn_order.iter_mut().find(|t| t.member_id == member_id)
    }

    /// Pending members in creation order.
    pub fn pending_members(&self) -> Vec<MemberId> {
        self.members
            .iter()
            .filter(|m| self.assignment(m).map(|t| t.is_pending()).unwrap_or(false))
            .cloned()
            .collect()
    }

    pub fn draw_numbers(&self) -> Vec<f64> {
        self.turn_order.iter().map(|t| t.draw_number).collect()
    }

    pub fn latest_lottery(&self) -> Option<&LotteryRecord> {
        self.lottery_history.last()
    }
}
