//! # Rotation Engine
//!
//! Stateless ordering of group members into payout turns.
//!
//! | strategy             | draw number               | direction  |
//! |----------------------|---------------------------|------------|
//! | `lottery`            | uniform integer in range  | ascending  |
//! | `sequential`         | input index + 1           | ascending  |
//! | `contribution_based` | contribution total        | descending |
//! | `needs_based`        | needs score               | descending |
//!
//! Ties on the draw number keep input order, so the resulting ranks are
//! always a total order `1..=N`.

mod draw;
mod scoring;

pub use draw::{DrawSource, FixedDraws, SeededDraws};
pub use scoring::{expected_payout_date, fairness_score, mean_draw_number};

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::config::{DrawConfig, ScoringConfig, TandaConfig};
use crate::error::{Result, TandaError};
use crate::types::{MemberId, PayoutFrequency, RankedMember, Strategy};

/// Strategy inputs. Members missing from a map use the configured fallback.
#[derive(Debug, Clone, Default)]
pub struct OrderingContext {
    pub contributions: HashMap<MemberId, f64>,
    pub needs_scores: HashMap<MemberId, f64>,
}

impl OrderingContext {
    pub fn with_contributions(mut self, contributions: HashMap<MemberId, f64>) -> Self {
        self.contributions = contributions;
        self
    }

    pub fn with_needs_scores(mut self, needs_scores: HashMap<MemberId, f64>) -> Self {
        self.needs_scores = needs_scores;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RotationEngine {
    draw: DrawConfig,
    scoring: ScoringConfig,
}

impl RotationEngine {
    pub fn new(config: &TandaConfig) -> Self {
        Self { draw: config.draw.clone(), scoring: config.scoring.clone() }
    }

    /// Orders `members` according to `strategy`.
    ///
    /// `draws` is only consulted for [`Strategy::Lottery`], once per member in
    /// input order.
    pub fn compute_order(
        &self,
        members: &[MemberId],
        strategy: Strategy,
        ctx: &OrderingContext,
        draws: &mut dyn DrawSource,
    ) -> Result<Vec<RankedMember>> {
        validate_members(members)?;

        let numbers: Vec<f64> = match strategy {
            Strategy::Lottery => members
                .iter()
                .map(|_| f64::from(draws.draw(self.draw.min, self.draw.max)))
                .collect(),
            Strategy::Sequential => (1..=members.len()).map(|i| i as f64).collect(),
            Strategy::ContributionBased => members
                .iter()
                .map(|m| {
                    lookup(&ctx.contributions, m, self.scoring.default_contribution, "contribution")
                })
                .collect::<Result<_>>()?,
            Strategy::NeedsBased => members
                .iter()
                .map(|m| {
                    lookup(&ctx.needs_scores, m, self.scoring.default_needs_score, "needs score")
                })
                .collect::<Result<_>>()?,
        };

        let mut indexed: Vec<(usize, f64)> = numbers.into_iter().enumerate().collect();
        // sort_by is stable: equal draw numbers keep input order
        if strategy.is_ascending() {
            indexed.sort_by(|a, b| a.1.total_cmp(&b.1));
        } else {
            indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        }

        let order: Vec<RankedMember> = indexed
            .into_iter()
            .enumerate()
            .map(|(position, (index, draw_number))| RankedMember {
                member_id: members[index].clone(),
                rank: position as u32 + 1,
                draw_number,
            })
            .collect();

        tracing::debug!(strategy = %strategy, members = order.len(), "computed turn order");
        Ok(order)
    }

    pub fn fairness_score(&self, draw_numbers: &[f64]) -> f64 {
        fairness_score(draw_numbers, self.scoring.fairness_variance_scale)
    }

    pub fn expected_payout_date(
        &self,
        rank: u32,
        frequency: PayoutFrequency,
        reference: DateTime<Utc>,
    ) -> DateTime<Utc> {
        expected_payout_date(rank, frequency, reference)
    }
}

fn validate_members(members: &[MemberId]) -> Result<()> {
    if members.is_empty() {
        return Err(TandaError::InvalidInput("member list must not be empty".to_string()));
    }

    let mut seen = HashSet::with_capacity(members.len());
    for member in members {
        if member.trim().is_empty() {
            return Err(TandaError::InvalidInput("member ids must not be blank".to_string()));
        }
        if !seen.insert(member.as_str()) {
            return Err(TandaError::InvalidInput(format!("duplicate member id: {member}")));
        }
    }
    Ok(())
}

fn lookup(
    values: &HashMap<MemberId, f64>,
    member: &str,
    fallback: f64,
    label: &str,
) -> Result<f64> {
    let value = values.get(member).copied().unwrap_or(fallback);
    if !value.is_finite() {
        return Err(TandaError::InvalidInput(format!(
            "{label} for {member} must be a finite number"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<MemberId> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn order_ids(order: &[RankedMember]) -> Vec<&str> {
        order.iter().map(|r| r.member_id.as_str()).collect()
    }

    fn scores(pairs: &[(&str, f64)]) -> HashMap<MemberId, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn run(
        names: &[&str],
        strategy: Strategy,
        ctx: &OrderingContext,
        draws: &mut dyn DrawSource,
    ) -> Result<Vec<RankedMember>> {
        RotationEngine::default().compute_order(&ids(names), strategy, ctx, draws)
    }

    #[test]
    fn test_sequential_keeps_input_order() {
        let ctx = OrderingContext::default();
        let mut draws = SeededDraws::from_seed(1);
        let order = run(&["a", "b", "c"], Strategy::Sequential, &ctx, &mut draws).unwrap();
        assert_eq!(order_ids(&order), vec!["a", "b", "c"]);
        assert_eq!(order.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(order.iter().map(|r| r.draw_number).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_contribution_based_descending() {
        let ctx = OrderingContext::default()
            .with_contributions(scores(&[("a", 100.0), ("b", 50.0), ("c", 200.0)]));
        let order =
            run(&["a", "b", "c"], Strategy::ContributionBased, &ctx, &mut SeededDraws::from_seed(1))
                .unwrap();
        assert_eq!(order_ids(&order), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_needs_based_uses_fallback_score() {
        // "b" has no entry and falls back to 50
        let ctx =
            OrderingContext::default().with_needs_scores(scores(&[("a", 40.0), ("c", 90.0)]));
        let mut draws = SeededDraws::from_seed(1);
        let order = run(&["a", "b", "c"], Strategy::NeedsBased, &ctx, &mut draws).unwrap();
        assert_eq!(order_ids(&order), vec!["c", "b", "a"]);
        assert_eq!(order[1].draw_number, 50.0);
    }

    #[test]
    fn test_lottery_ascending_with_fixed_draws() {
        let ctx = OrderingContext::default();
        let order = run(&["x", "y"], Strategy::Lottery, &ctx, &mut FixedDraws::new([700, 300]))
            .unwrap();
        assert_eq!(order_ids(&order), vec!["y", "x"]);
        assert_eq!(order[0].draw_number, 300.0);
        assert_eq!(order[1].draw_number, 700.0);
    }

    #[test]
    fn test_ties_resolved_by_input_order() {
        let ctx = OrderingContext::default();
        let order = run(&["p", "q", "r"], Strategy::Lottery, &ctx, &mut FixedDraws::new([5, 5, 1]))
            .unwrap();
        assert_eq!(order_ids(&order), vec!["r", "p", "q"]);

        let ctx =
            OrderingContext::default().with_contributions(scores(&[("p", 10.0), ("q", 10.0)]));
        let order =
            run(&["p", "q"], Strategy::ContributionBased, &ctx, &mut SeededDraws::from_seed(1))
                .unwrap();
        assert_eq!(order_ids(&order), vec!["p", "q"]);
    }

    #[test]
    fn test_rejects_empty_and_duplicates() {
        let ctx = OrderingContext::default();
        let mut draws = SeededDraws::from_seed(1);

        let err = run(&[], Strategy::Lottery, &ctx, &mut draws).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = run(&["a", "b", "a"], Strategy::Sequential, &ctx, &mut draws).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = run(&["a", " "], Strategy::Sequential, &ctx, &mut draws).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn test_rejects_non_finite_scores() {
        let ctx = OrderingContext::default().with_contributions(scores(&[("a", f64::NAN)]));
        let err =
            run(&["a", "b"], Strategy::ContributionBased, &ctx, &mut SeededDraws::from_seed(1))
                .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn test_lottery_respects_configured_range() {
        let mut config = TandaConfig::default();
        config.draw.min = 10;
        config.draw.max = 12;
        let engine = RotationEngine::new(&config);
        let members: Vec<MemberId> = (0..50).map(|i| format!("m{i}")).collect();
        let ctx = OrderingContext::default();
        let order = engine
            .compute_order(&members, Strategy::Lottery, &ctx, &mut SeededDraws::from_seed(9))
            .unwrap();
        assert!(order.iter().all(|r| (10.0..=12.0).contains(&r.draw_number)));
    }
}
