//! The daily scoring pipeline: indicators, component scores, weighted raw score, smoothing
//! against yesterday, level mapping and confidence.

pub mod components;
pub mod confidence;
pub mod indicators;
pub mod level;
pub mod notes;
pub mod smoothing;

use crate::domain::record::{METHOD_VERSION, SCHEMA_VERSION};
use crate::domain::{
    ComponentScores, Momentum, PriceSource, RiskIndexRecord, ThemeScore, CORE_SYMBOLS,
};
use anyhow::ensure;
use chrono::{DateTime, NaiveDate, Utc};
use components::IndicatorSnapshot;
use level::LevelBreakpoints;

const THEMES_PUBLISHED: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentWeights {
    pub trend: f64,
    pub stress: f64,
    pub regime: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            trend: 0.20,
            stress: 0.45,
            regime: 0.35,
        }
    }
}

/// Policy constants of the index. `Default` is the published methodology.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringParams {
    pub weights: ComponentWeights,
    /// Weight of today's raw score; yesterday's published score gets the rest.
    pub smoothing_alpha: f64,
    pub breakpoints: LevelBreakpoints,
    pub min_percentile_samples: usize,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            weights: ComponentWeights::default(),
            smoothing_alpha: 0.7,
            breakpoints: LevelBreakpoints::default(),
            min_percentile_samples: 30,
        }
    }
}

impl ScoringParams {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(v) = env_f64("MRI_SMOOTHING_ALPHA")? {
            out.smoothing_alpha = v;
        }
        if let Some(v) = env_f64("MRI_WEIGHT_TREND")? {
            out.weights.trend = v;
        }
        if let Some(v) = env_f64("MRI_WEIGHT_STRESS")? {
            out.weights.stress = v;
        }
        if let Some(v) = env_f64("MRI_WEIGHT_REGIME")? {
            out.weights.regime = v;
        }

        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.smoothing_alpha),
            "smoothing alpha must be within 0..=1 (got {})",
            self.smoothing_alpha
        );
        let w = &self.weights;
        for (name, value) in [("trend", w.trend), ("stress", w.stress), ("regime", w.regime)] {
            ensure!(
                value.is_finite() && value >= 0.0,
                "{name} weight must be a non-negative number (got {value})"
            );
        }
        let sum = w.trend + w.stress + w.regime;
        ensure!(
            (sum - 1.0).abs() < 1e-6,
            "component weights must sum to 1 (got {sum})"
        );
        ensure!(
            self.breakpoints.medium_from < self.breakpoints.high_from,
            "medium breakpoint must be below high breakpoint"
        );
        Ok(())
    }
}

fn env_f64(key: &str) -> anyhow::Result<Option<f64>> {
    match std::env::var(key) {
        Ok(s) if !s.trim().is_empty() => {
            let v = s
                .trim()
                .parse::<f64>()
                .map_err(|e| anyhow::anyhow!("{key} must be a number (got {s:?}): {e}"))?;
            Ok(Some(v))
        }
        _ => Ok(None),
    }
}

/// Rounds to the nearest integer and clamps to 0..=100. Non-finite input maps to 0.
pub fn clamp_score(value: f64) -> u32 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u32
}

pub fn raw_score(components: &ComponentScores, weights: &ComponentWeights) -> u32 {
    clamp_score(
        weights.stress * components.stress as f64
            + weights.regime * components.regime as f64
            + weights.trend * components.trend as f64,
    )
}

#[derive(Debug, Clone)]
pub struct DayInputs<'a> {
    pub as_of_date: NaiveDate,
    pub prices: &'a PriceSource,
    /// Most recent archived record strictly before `as_of_date`.
    pub yesterday: Option<&'a RiskIndexRecord>,
    pub generated_at: DateTime<Utc>,
}

/// Scores one day. History-derived fields (percentile, momentum, regime duration, alerts)
/// are left empty for [`crate::history::backfill`].
pub fn score_day(inputs: &DayInputs<'_>, params: &ScoringParams) -> RiskIndexRecord {
    let snapshot = IndicatorSnapshot::from_prices(inputs.prices);
    let raw_components = snapshot.scores();
    let raw = raw_score(&raw_components, &params.weights);

    let smoothed = smoothing::smooth(
        raw,
        &raw_components,
        inputs.yesterday.map(|y| y.score),
        inputs.yesterday.map(|y| &y.components),
        params.smoothing_alpha,
        &params.weights,
    );

    let level = level::level_for_score(smoothed.score, &params.breakpoints);
    let allocation = level::allocation(level);
    let confidence = confidence::confidence_from_components(&raw_components);
    let (top_themes, bottom_themes) = rank_themes(inputs.prices);

    tracing::debug!(
        as_of_date = %inputs.as_of_date,
        raw,
        score = smoothed.score,
        trend = raw_components.trend,
        stress = raw_components.stress,
        regime = raw_components.regime,
        "scored day"
    );

    RiskIndexRecord {
        schema_version: SCHEMA_VERSION,
        method_version: METHOD_VERSION.to_string(),
        date: inputs.as_of_date,
        updated_at: inputs.generated_at,
        inputs: CORE_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        data_status: inputs.prices.source,
        raw_score: raw,
        score: smoothed.score,
        level,
        light: level.light(),
        equity_range: allocation.equity.to_string(),
        bonds_range: allocation.bonds.to_string(),
        cash_range: allocation.cash.to_string(),
        components: smoothed.components,
        component_contrib: smoothed.contrib,
        component_notes: notes::component_notes(&snapshot, &smoothed.components),
        key_drivers: notes::key_drivers(&smoothed.components),
        percentile_rank: None,
        percentile_note: None,
        percentile_sample: 0,
        confidence_level: confidence.level,
        confidence_reason: confidence.reason,
        momentum: Momentum::Stable,
        regime_duration: 1,
        alerts: Vec::new(),
        top_themes,
        bottom_themes,
    }
}

fn rank_themes(prices: &PriceSource) -> (Vec<ThemeScore>, Vec<ThemeScore>) {
    let mut scored: Vec<ThemeScore> = prices
        .theme_symbols()
        .map(|name| notes::theme_score(name, indicators::threshold_momentum(prices.closes(name))))
        .collect();
    if scored.is_empty() {
        return (Vec::new(), Vec::new());
    }
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    let top = scored.iter().take(THEMES_PUBLISHED).cloned().collect();
    let bottom = scored.iter().rev().take(THEMES_PUBLISHED).cloned().collect();
    (top, bottom)
}
