//! Read-only views over a rotation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{mean_draw_number, RotationEngine};
use crate::types::{
    GroupId, GroupRotation, LotteryRecord, MemberId, PayoutFrequency, RotationPhase, Strategy,
    TurnAssignment,
};

/// Full snapshot returned by creation, status and re-draw calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationStatus {
    pub group_id: GroupId,
    pub strategy: Strategy,
    pub frequency: PayoutFrequency,
    pub phase: RotationPhase,
    pub is_complete: bool,
    pub total_members: usize,
    pub completed_count: usize,
    pub remaining_count: usize,
    pub progress_percentage: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub turn_order: Vec<TurnAssignment>,
    pub completed_turns: Vec<MemberId>,
    pub next_recipient: Option<TurnAssignment>,
    /// When the most recent lottery record was drawn
    pub last_drawn_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl RotationStatus {
    pub(crate) fn of(rotation: &GroupRotation) -> Self {
        Self {
            group_id: rotation.group_id.clone(),
            strategy: rotation.strategy,
            frequency: rotation.frequency,
            phase: rotation.phase(),
            is_complete: rotation.is_complete(),
            total_members: rotation.total_members(),
            completed_count: rotation.completed_count(),
            remaining_count: rotation.total_members() - rotation.completed_count(),
            progress_percentage: rotation.progress_percentage(),
            created_at: rotation.created_at,
            started_at: rotation.started_at,
            turn_order: rotation.turn_order.clone(),
            completed_turns: rotation.completed_turns.clone(),
            next_recipient: rotation.next_pending().cloned(),
            last_drawn_at: rotation.latest_lottery().map(|r| r.conducted_at),
            version: rotation.version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationProgress {
    pub group_id: GroupId,
    pub phase: RotationPhase,
    pub completed_count: usize,
    pub total_members: usize,
    pub progress_percentage: f64,
}

impl RotationProgress {
    pub(crate) fn of(rotation: &GroupRotation) -> Self {
        Self {
            group_id: rotation.group_id.clone(),
            phase: rotation.phase(),
            completed_count: rotation.completed_count(),
            total_members: rotation.total_members(),
            progress_percentage: rotation.progress_percentage(),
        }
    }
}

/// Result of a payout confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOutcome {
    /// False when the confirmation was a replay of an earlier one.
    pub turn_completed: bool,
    pub rotation_complete: bool,
    pub next_recipient: Option<TurnAssignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnInfo {
    pub group_id: GroupId,
    pub assignment: TurnAssignment,
    pub is_next: bool,
    pub turns_until_payout: u32,
}

impl TurnInfo {
    pub(crate) fn of(rotation: &GroupRotation, assignment: &TurnAssignment) -> Self {
        let is_next =
            rotation.next_pending().map(|t| t.member_id == assignment.member_id).unwrap_or(false);
        let completed = rotation.completed_count() as u32;
        Self {
            group_id: rotation.group_id.clone(),
            assignment: assignment.clone(),
            is_next,
            turns_until_payout: assignment.rank.saturating_sub(completed + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationSummary {
    pub group_id: GroupId,
    pub strategy: Strategy,
    pub frequency: PayoutFrequency,
    pub phase: RotationPhase,
    pub total_members: usize,
    pub completed_count: usize,
    pub remaining_count: usize,
    pub progress_percentage: f64,
    pub started_at: DateTime<Utc>,
    pub lottery_draws: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub fairness_score: f64,
    pub mean_draw_number: f64,
    /// Last actual payout once complete, otherwise the latest expected date.
    pub completion_date: Option<DateTime<Utc>>,
    pub completion_is_estimate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationReport {
    pub summary: RotationSummary,
    pub turn_order: Vec<TurnAssignment>,
    pub latest_lottery: Option<LotteryRecord>,
    pub statistics: ReportStatistics,
    pub generated_at: DateTime<Utc>,
}

impl RotationReport {
    pub(crate) fn build(
        rotation: &GroupRotation,
        engine: &RotationEngine,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let draw_numbers = rotation.draw_numbers();
        let complete = rotation.is_complete();

        let completion_date = if complete {
            rotation.turn_order.iter().filter_map(|t| t.completed_at).max()
        } else {
            rotation
                .turn_order
                .iter()
                .filter(|t| t.is_pending())
                .map(|t| t.expected_payout_date)
                .max()
        };

        Self {
            summary: RotationSummary {
                group_id: rotation.group_id.clone(),
                strategy: rotation.strategy,
                frequency: rotation.frequency,
                phase: rotation.phase(),
                total_members: rotation.total_members(),
                completed_count: rotation.completed_count(),
                remaining_count: rotation.total_members() - rotation.completed_count(),
                progress_percentage: rotation.progress_percentage(),
                started_at: rotation.started_at,
                lottery_draws: rotation.lottery_history.len(),
            },
            turn_order: rotation.turn_order.clone(),
            latest_lottery: rotation.latest_lottery().cloned(),
            statistics: ReportStatistics {
                fairness_score: engine.fairness_score(&draw_numbers),
                mean_draw_number: mean_draw_number(&draw_numbers),
                completion_date,
                completion_is_estimate: !complete,
            },
            generated_at,
        }
    }
}
