//! # Lottery Coordinator
//!
//! Owns rotation state per group and enforces the turn state machine:
//!
//! ```text
//! initialize ──▶ InProgress ──(last payout recorded)──▶ Complete
//!                  │    ▲
//!                  └────┘ record_payout_completion / re_conduct_lottery
//! ```
//!
//! Every mutation runs as one read-modify-write under a per-group lock and
//! writes the store exactly once, after all validation has passed. The write
//! is a compare-and-swap on the stored `version`
//! ([`RotationStore::put_if_version`]), so a competing writer on a shared
//! store surfaces as [`TandaError::ConcurrentModification`].

mod clock;
mod report;

pub use clock::{Clock, FixedClock, SystemClock};
pub use report::{
    CompletionOutcome, ReportStatistics, RotationProgress, RotationReport, RotationStatus,
    RotationSummary, TurnInfo,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use crate::config::TandaConfig;
use crate::engine::{DrawSource, OrderingContext, RotationEngine, SeededDraws};
use crate::error::{Result, TandaError};
use crate::store::{RotationStore, StoreError};
use crate::types::{
    DrawMethod, GroupRotation, LotteryRecord, MemberId, PayoutFrequency, RankedMember, Strategy,
    TurnAssignment, TurnStatus,
};

/// Per-request inputs for [`LotteryCoordinator::initialize_group_rotation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationOptions {
    pub contributions: HashMap<MemberId, f64>,
    pub needs_scores: HashMap<MemberId, f64>,
    /// Falls back to the configured default frequency
    pub frequency: Option<PayoutFrequency>,
    /// Reference date for payout dates; falls back to the clock
    pub start_date: Option<DateTime<Utc>>,
    /// Replace an in-progress rotation instead of rejecting the request
    pub force: bool,
}

pub struct LotteryCoordinator<S: RotationStore> {
    store: S,
    config: TandaConfig,
    engine: RotationEngine,
    draws: Mutex<Box<dyn DrawSource + Send>>,
    clock: Arc<dyn Clock>,
    group_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: RotationStore> LotteryCoordinator<S> {
    /// Fails with [`TandaError::InvalidConfig`] when `config` does not validate.
    pub fn new(store: S, config: TandaConfig) -> Result<Self> {
        config.validate()?;
        let engine = RotationEngine::new(&config);
        Ok(Self {
            store,
            config,
            engine,
            draws: Mutex::new(Box::new(SeededDraws::from_entropy())),
            clock: Arc::new(SystemClock),
            group_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_draws(mut self, draws: Box<dyn DrawSource + Send>) -> Self {
        self.draws = Mutex::new(draws);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TandaConfig {
        &self.config
    }

    pub fn engine(&self) -> &RotationEngine {
        &self.engine
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================
    // Mutations
    // ========================

    pub fn initialize_group_rotation(
        &self,
        group_id: &str,
        members: Vec<MemberId>,
        strategy: Strategy,
        options: RotationOptions,
    ) -> Result<RotationStatus> {
        validate_group_id(group_id)?;

        self.with_group_lock(group_id, || {
            let existing = self.store.get(group_id)?;
            if let Some(current) = &existing {
                let replace_allowed = current.is_complete()
                    || (options.force && self.config.allow_force_reinit);
                if !replace_allowed {
                    tracing::warn!(group_id, "rejected re-initialisation of active rotation");
                    return Err(TandaError::DuplicateRotation { group_id: group_id.to_string() });
                }
                tracing::info!(
                    group_id,
                    completed = current.completed_count(),
                    "replacing existing rotation"
                );
            }

            let ctx = OrderingContext::default()
                .with_contributions(options.contributions)
                .with_needs_scores(options.needs_scores);
            let order = self.draw_order(&members, strategy, &ctx)?;

            let now = self.clock.now();
            let frequency = options.frequency.unwrap_or(self.config.default_frequency);
            let started_at = options.start_date.unwrap_or(now);

            let turn_order = order
                .iter()
                .map(|entry| TurnAssignment {
                    member_id: entry.member_id.clone(),
                    rank: entry.rank,
                    draw_number: entry.draw_number,
                    status: TurnStatus::Pending,
                    expected_payout_date: self.engine.expected_payout_date(
                        entry.rank,
                        frequency,
                        started_at,
                    ),
                    payout_amount: None,
                    completed_at: None,
                })
                .collect();

            let expected_version = existing.as_ref().map(|r| r.version);
            // audit trail survives a replacement
            let mut lottery_history =
                existing.map(|r| r.lottery_history).unwrap_or_default();
            if strategy == Strategy::Lottery {
                lottery_history.push(LotteryRecord::new(
                    group_id,
                    now,
                    members.clone(),
                    order,
                    DrawMethod::Initial { strategy },
                ));
            }

            let mut rotation = GroupRotation {
                group_id: group_id.to_string(),
                members,
                strategy,
                frequency,
                created_at: now,
                started_at,
                turn_order,
                completed_turns: Vec::new(),
                lottery_history,
                version: 0,
            };
            self.commit(&mut rotation, expected_version)?;

            tracing::info!(
                group_id,
                strategy = %strategy,
                members = rotation.total_members(),
                "rotation initialised"
            );
            Ok(RotationStatus::of(&rotation))
        })
    }

    /// Marks `member_id`'s turn as paid.
    ///
    /// Confirming an already-paid member is a no-op unless strict completion
    /// is configured, because payout confirmations may be retried.
    pub fn record_payout_completion(
        &self,
        group_id: &str,
        member_id: &str,
        payout_amount: f64,
    ) -> Result<CompletionOutcome> {
        if !payout_amount.is_finite() || payout_amount < 0.0 {
            return Err(TandaError::InvalidInput(format!(
                "payout amount must be a non-negative number, got {payout_amount}"
            )));
        }

        self.with_group_lock(group_id, || {
            let mut rotation = self.load(group_id)?;
            let now = self.clock.now();

            let assignment = rotation
                .assignment_mut(member_id)
                .ok_or_else(|| member_not_found(group_id, member_id))?;

            if !assignment.is_pending() {
                if self.config.strict_completion {
                    tracing::warn!(group_id, member_id, "duplicate payout confirmation rejected");
                    return Err(TandaError::AlreadyCompleted {
                        group_id: group_id.to_string(),
                        member_id: member_id.to_string(),
                    });
                }
                tracing::debug!(group_id, member_id, "duplicate payout confirmation ignored");
                return Ok(CompletionOutcome {
                    turn_completed: false,
                    rotation_complete: rotation.is_complete(),
                    next_recipient: rotation.next_pending().cloned(),
                });
            }

            assignment.complete(payout_amount, now);
            rotation.completed_turns.push(member_id.to_string());

            let expected_version = Some(rotation.version);
            self.commit(&mut rotation, expected_version)?;

            let rotation_complete = rotation.is_complete();
            tracing::info!(
                group_id,
                member_id,
                payout_amount,
                completed = rotation.completed_count(),
                total = rotation.total_members(),
                "payout recorded"
            );
            if rotation_complete {
                tracing::info!(group_id, "rotation complete");
            }

            Ok(CompletionOutcome {
                turn_completed: true,
                rotation_complete,
                next_recipient: rotation.next_pending().cloned(),
            })
        })
    }

    /// Re-draws the turn order of every pending member.
    ///
    /// Completed turns keep their rank. Pending members take the remaining
    /// ranks in ascending order, assigned by a fresh lottery over the pending
    /// members in creation order.
    pub fn re_conduct_lottery(&self, group_id: &str, reason: &str) -> Result<RotationStatus> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TandaError::InvalidInput("a re-draw needs a reason".to_string()));
        }

        self.with_group_lock(group_id, || {
            let mut rotation = self.load(group_id)?;

            let pending = rotation.pending_members();
            if pending.is_empty() {
                tracing::warn!(group_id, "re-draw requested on completed rotation");
                return Err(TandaError::NoRemainingMembers { group_id: group_id.to_string() });
            }

            let held: BTreeSet<u32> = rotation
                .turn_order
                .iter()
                .filter(|t| !t.is_pending())
                .map(|t| t.rank)
                .collect();
            let free_ranks: Vec<u32> =
                (1..=rotation.total_members() as u32).filter(|r| !held.contains(r)).collect();

            let draw = self.draw_order(&pending, Strategy::Lottery, &OrderingContext::default())?;

            let mut result = Vec::with_capacity(draw.len());
            for (entry, rank) in draw.into_iter().zip(free_ranks) {
                let frequency = rotation.frequency;
                let started_at = rotation.started_at;
                let assignment = rotation
                    .assignment_mut(&entry.member_id)
                    .ok_or_else(|| member_not_found(group_id, &entry.member_id))?;
                assignment.rank = rank;
                assignment.draw_number = entry.draw_number;
                assignment.expected_payout_date =
                    self.engine.expected_payout_date(rank, frequency, started_at);
                result.push(RankedMember {
                    member_id: entry.member_id,
                    rank,
                    draw_number: entry.draw_number,
                });
            }
            rotation.turn_order.sort_by_key(|t| t.rank);

            let now = self.clock.now();
            rotation.lottery_history.push(LotteryRecord::new(
                group_id,
                now,
                pending,
                result,
                DrawMethod::Redraw { reason: reason.to_string() },
            ));

            let expected_version = Some(rotation.version);
            self.commit(&mut rotation, expected_version)?;

            tracing::info!(
                group_id,
                reason,
                redrawn = rotation.total_members() - rotation.completed_count(),
                "lottery re-conducted"
            );
            Ok(RotationStatus::of(&rotation))
        })
    }

    /// Group teardown. Returns whether a rotation existed.
    pub fn remove_rotation(&self, group_id: &str) -> Result<bool> {
        self.with_group_lock(group_id, || {
            let removed = self.store.delete(group_id)?;
            if removed {
                tracing::info!(group_id, "rotation removed");
            }
            Ok(removed)
        })
    }

    // ========================
    // Queries
    // ========================

    pub fn get_rotation_status(&self, group_id: &str) -> Result<RotationStatus> {
        Ok(RotationStatus::of(&self.load(group_id)?))
    }

    /// Lowest-rank pending turn, or `None` once the rotation is complete.
    pub fn get_next_payout_recipient(&self, group_id: &str) -> Result<Option<TurnAssignment>> {
        Ok(self.load(group_id)?.next_pending().cloned())
    }

    pub fn get_member_turn_info(&self, group_id: &str, member_id: &str) -> Result<TurnInfo> {
        let rotation = self.load(group_id)?;
        let assignment =
            rotation.assignment(member_id).ok_or_else(|| member_not_found(group_id, member_id))?;
        Ok(TurnInfo::of(&rotation, assignment))
    }

    pub fn get_progress(&self, group_id: &str) -> Result<RotationProgress> {
        Ok(RotationProgress::of(&self.load(group_id)?))
    }

    pub fn get_lottery_history(&self, group_id: &str) -> Result<Vec<LotteryRecord>> {
        Ok(self.load(group_id)?.lottery_history)
    }

    pub fn generate_rotation_report(&self, group_id: &str) -> Result<RotationReport> {
        let rotation = self.load(group_id)?;
        Ok(RotationReport::build(&rotation, &self.engine, self.clock.now()))
    }

    pub fn list_groups(&self) -> Result<Vec<String>> {
        Ok(self.store.group_ids()?)
    }

    // ========================
    // Internals
    // ========================

    fn load(&self, group_id: &str) -> Result<GroupRotation> {
        self.store
            .get(group_id)?
            .ok_or_else(|| TandaError::RotationNotFound { group_id: group_id.to_string() })
    }

    fn draw_order(
        &self,
        members: &[MemberId],
        strategy: Strategy,
        ctx: &OrderingContext,
    ) -> Result<Vec<RankedMember>> {
        let mut draws = self.draws.lock().map_err(|_| StoreError::Poisoned)?;
        self.engine.compute_order(members, strategy, ctx, draws.as_mut())
    }

    /// Writes `rotation` if the stored version still equals `expected`.
    fn commit(&self, rotation: &mut GroupRotation, expected: Option<u64>) -> Result<()> {
        let previous = rotation.version;
        rotation.version = expected.unwrap_or(0) + 1;
        match self.store.put_if_version(rotation, expected) {
            Ok(()) => Ok(()),
            Err(StoreError::VersionConflict { group_id, expected, found }) => {
                rotation.version = previous;
                tracing::warn!(%group_id, ?expected, ?found, "concurrent modification detected");
                Err(TandaError::ConcurrentModification {
                    group_id,
                    expected: expected.unwrap_or(0),
                    found: found.unwrap_or(0),
                })
            }
            Err(e) => {
                rotation.version = previous;
                Err(e.into())
            }
        }
    }

    fn with_group_lock<T>(&self, group_id: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = {
            let mut locks = self.group_locks.lock().map_err(|_| StoreError::Poisoned)?;
            Arc::clone(locks.entry(group_id.to_string()).or_default())
        };
        let _guard = lock.lock().map_err(|_| StoreError::Poisoned)?;
        f()
    }
}

fn validate_group_id(group_id: &str) -> Result<()> {
    if group_id.trim().is_empty() {
        return Err(TandaError::InvalidInput("group id must not be blank".to_string()));
    }
    Ok(())
}

fn member_not_found(group_id: &str, member_id: &str) -> TandaError {
    TandaError::MemberNotFound { group_id: group_id.to_string(), member_id: member_id.to_string() }
}
