//! Descriptive statistics over a turn order and advisory payout dates.

use chrono::{DateTime, Duration, Utc};

use crate::types::PayoutFrequency;

/// Dispersion of draw numbers mapped onto `[0, 100]`.
///
/// `min(100, variance / variance_scale * 100)` over the population variance.
/// Reporting only; an order is never rejected because of its score.
pub fn fairness_score(draw_numbers: &[f64], variance_scale: f64) -> f64 {
    if draw_numbers.len() < 2 || variance_scale <= 0.0 {
        return 0.0;
    }
    let score = variance(draw_numbers) / variance_scale * 100.0;
    score.clamp(0.0, 100.0)
}

pub fn mean_draw_number(draw_numbers: &[f64]) -> f64 {
    if draw_numbers.is_empty() {
        return 0.0;
    }
    draw_numbers.iter().sum::<f64>() / draw_numbers.len() as f64
}

fn variance(values: &[f64]) -> f64 {
    let mean = mean_draw_number(values);
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64
}

/// `reference + rank * multiplier` weeks.
pub fn expected_payout_date(
    rank: u32,
    frequency: PayoutFrequency,
    reference: DateTime<Utc>,
) -> DateTime<Utc> {
    let weeks = i64::from(rank) * frequency.weeks_multiplier();
    reference + Duration::weeks(weeks)
}
