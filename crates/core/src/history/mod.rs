//! Derived views over the archive: per-day deltas, momentum, regime duration, similar
//! dates, monthly grouping, and the backfill pass that stamps them onto today's record.

pub mod alerts;

use crate::domain::{Light, Momentum, RiskIndexRecord, RiskLevel};
use crate::risk::{confidence, ScoringParams};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

const MOMENTUM_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub date: NaiveDate,
    pub score: u32,
    pub raw_score: u32,
    pub level: RiskLevel,
    pub light: Light,
    pub equity_range: String,
    pub delta: i64,
    pub trend_direction: TrendDirection,
}

/// One row per record (oldest-first in, oldest-first out) with the change vs the row before.
pub fn history_rows(records: &[RiskIndexRecord]) -> Vec<HistoryRow> {
    let mut out = Vec::with_capacity(records.len());
    let mut prev: Option<u32> = None;
    for r in records {
        let delta = prev.map_or(0, |p| r.score as i64 - p as i64);
        let trend_direction = match delta {
            d if d > 0 => TrendDirection::Up,
            d if d < 0 => TrendDirection::Down,
            _ => TrendDirection::Flat,
        };
        out.push(HistoryRow {
            date: r.date,
            score: r.score,
            raw_score: r.raw_score,
            level: r.level,
            light: r.light,
            equity_range: r.equity_range.clone(),
            delta,
            trend_direction,
        });
        prev = Some(r.score);
    }
    out
}

/// Mean of the last five scores against the five before them. Needs ten scores.
pub fn momentum(scores: &[u32]) -> Momentum {
    if scores.len() < MOMENTUM_WINDOW * 2 {
        return Momentum::Stable;
    }
    let tail = &scores[scores.len() - MOMENTUM_WINDOW * 2..];
    let (previous, recent) = tail.split_at(MOMENTUM_WINDOW);
    let sum = |s: &[u32]| s.iter().map(|v| *v as u64).sum::<u64>();
    // equal window sizes, so comparing sums compares means
    match sum(recent).cmp(&sum(previous)) {
        std::cmp::Ordering::Greater => Momentum::Rising,
        std::cmp::Ordering::Less => Momentum::Falling,
        std::cmp::Ordering::Equal => Momentum::Stable,
    }
}

/// Number of trailing entries equal to the last one.
pub fn regime_duration(levels: &[RiskLevel]) -> u32 {
    let Some(current) = levels.last() else {
        return 0;
    };
    levels.iter().rev().take_while(|l| *l == current).count() as u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarDate {
    pub date: NaiveDate,
    pub score: u32,
    pub diff: u32,
}

pub fn similar_dates(
    records: &[RiskIndexRecord],
    target: u32,
    exclude: NaiveDate,
    limit: usize,
) -> Vec<SimilarDate> {
    let mut out: Vec<SimilarDate> = records
        .iter()
        .filter(|r| r.date != exclude)
        .map(|r| SimilarDate {
            date: r.date,
            score: r.score,
            diff: r.score.abs_diff(target),
        })
        .collect();
    out.sort_by_key(|s| s.diff);
    out.truncate(limit);
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGroup {
    pub month: String,
    pub dates: Vec<NaiveDate>,
    pub latest: NaiveDate,
}

/// Groups dates by `YYYY-MM`, newest month first, dates ascending within a month.
pub fn monthly_index(dates: &[NaiveDate]) -> Vec<MonthGroup> {
    let mut months: BTreeMap<String, Vec<NaiveDate>> = BTreeMap::new();
    for d in dates {
        months.entry(d.format("%Y-%m").to_string()).or_default().push(*d);
    }
    months
        .into_iter()
        .rev()
        .filter_map(|(month, mut dates)| {
            dates.sort();
            dates.dedup();
            let latest = *dates.last()?;
            Some(MonthGroup {
                month,
                dates,
                latest,
            })
        })
        .collect()
}

/// Fills the history-derived fields of `record`.
///
/// `history` holds the archived records strictly before `record.date`, oldest first.
pub fn backfill(record: &mut RiskIndexRecord, history: &[RiskIndexRecord], params: &ScoringParams) {
    let past_scores: Vec<u32> = history.iter().map(|r| r.score).collect();
    let pct =
        confidence::percentile_rank(&past_scores, record.score, params.min_percentile_samples);
    record.percentile_rank = pct.rank;
    record.percentile_note = pct.note;
    record.percentile_sample = pct.sample;

    let mut scores = past_scores;
    scores.push(record.score);
    record.momentum = momentum(&scores);

    let mut levels: Vec<RiskLevel> = history.iter().map(|r| r.level).collect();
    levels.push(record.level);
    record.regime_duration = regime_duration(&levels);

    record.alerts = alerts::build_alerts(record, history.last());
}
