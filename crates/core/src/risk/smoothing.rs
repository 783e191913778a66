//! Day-over-day continuity: exponential blending of the headline score, banded components
//! with a one-day confirmation delay at the extremes, and contributions reconciled to the
//! published score.

use crate::domain::ComponentScores;
use crate::risk::{clamp_score, ComponentWeights};

/// Band assumed for yesterday when no prior component value exists.
const COLD_START_BAND: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothedScore {
    pub score: u32,
    pub components: ComponentScores,
    pub contrib: ComponentScores,
}

/// `round(alpha * raw + (1 - alpha) * yesterday)`; the raw score on a cold start.
pub fn smooth_score(raw: u32, yesterday: Option<u32>, alpha: f64) -> u32 {
    match yesterday {
        Some(prev) => clamp_score(alpha * raw as f64 + (1.0 - alpha) * prev as f64),
        None => raw.min(100),
    }
}

/// Snaps a 0..=100 value down to one of {0, 25, 50, 75, 100}.
pub fn quantize(value: u32) -> u32 {
    match value {
        0..=20 => 0,
        21..=40 => 25,
        41..=60 => 50,
        61..=80 => 75,
        _ => 100,
    }
}

/// A band may only reach 0 or 100 when yesterday was already there.
pub fn confirm_extreme(band: u32, prev_band: u32) -> u32 {
    match band {
        0 if prev_band != 0 => 25,
        100 if prev_band != 100 => 75,
        _ => band,
    }
}

pub fn quantize_components(
    today: &ComponentScores,
    yesterday: Option<&ComponentScores>,
) -> ComponentScores {
    let step = |value: u32, prev: Option<u32>| {
        let prev_band = prev.map(quantize).unwrap_or(COLD_START_BAND);
        confirm_extreme(quantize(value), prev_band)
    };
    ComponentScores {
        trend: step(today.trend, yesterday.map(|y| y.trend)),
        stress: step(today.stress, yesterday.map(|y| y.stress)),
        regime: step(today.regime, yesterday.map(|y| y.regime)),
    }
}

/// Splits `score` across the components in proportion to their weighted impact.
///
/// The result is non-negative and sums to exactly `score`. Rounding residue goes to the
/// largest contributor; ties resolve in trend, stress, regime order.
pub fn reconcile_contributions(
    banded: &ComponentScores,
    score: u32,
    weights: &ComponentWeights,
) -> ComponentScores {
    let impacts = [
        (weights.trend * banded.trend as f64).round().max(0.0),
        (weights.stress * banded.stress as f64).round().max(0.0),
        (weights.regime * banded.regime as f64).round().max(0.0),
    ];
    let sum: f64 = impacts.iter().sum();
    let scale = if sum > 0.0 { score as f64 / sum } else { 1.0 };

    let mut contrib = impacts.map(|impact| (impact * scale).round().max(0.0) as i64);
    let mut residual = score as i64 - contrib.iter().sum::<i64>();

    if residual > 0 {
        contrib[largest(&contrib)] += residual;
    }
    while residual < 0 {
        let idx = largest(&contrib);
        let take = contrib[idx].min(-residual);
        if take == 0 {
            break;
        }
        contrib[idx] -= take;
        residual += take;
    }

    ComponentScores {
        trend: contrib[0] as u32,
        stress: contrib[1] as u32,
        regime: contrib[2] as u32,
    }
}

fn largest(values: &[i64; 3]) -> usize {
    let mut best = 0;
    for (idx, value) in values.iter().enumerate().skip(1) {
        if *value > values[best] {
            best = idx;
        }
    }
    best
}

/// Applies the full smoothing step against yesterday's published record values.
pub fn smooth(
    raw_score: u32,
    raw_components: &ComponentScores,
    yesterday_score: Option<u32>,
    yesterday_components: Option<&ComponentScores>,
    alpha: f64,
    weights: &ComponentWeights,
) -> SmoothedScore {
    let score = smooth_score(raw_score, yesterday_score, alpha);
    let components = quantize_components(raw_components, yesterday_components);
    let contrib = reconcile_contributions(&components, score, weights);
    SmoothedScore {
        score,
        components,
        contrib,
    }
}
