//! Boundary conversion from older archive layouts into the current [`RiskIndexRecord`].
//!
//! Early archives wrapped the index in `riskIndex` or `marketRisk`, sometimes named the score
//! `mri`, spelled the middle level `neutral`, and omitted most derived fields. Every reader
//! goes through [`normalize_record`] so nothing downstream needs to know about those shapes.

use crate::domain::prices::DataStatus;
use crate::domain::record::{
    ComponentNotes, ComponentScores, Momentum, RiskIndexRecord, RiskLevel, ThemeScore,
    METHOD_VERSION, SCHEMA_VERSION,
};
use crate::risk::{clamp_score, confidence, level, smoothing, ScoringParams};
use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

pub fn normalize_record(value: Value, file_date: NaiveDate) -> anyhow::Result<RiskIndexRecord> {
    if value.get("schemaVersion").is_some() {
        let record: RiskIndexRecord = serde_json::from_value(value)
            .context("record has schemaVersion but does not match the current schema")?;
        return Ok(record);
    }

    let params = ScoringParams::default();
    let root = &value;
    let risk = root
        .get("riskIndex")
        .or_else(|| root.get("marketRisk"))
        .filter(|v| v.is_object())
        .unwrap_or(root);

    let date = str_field(root, "date")
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .unwrap_or(file_date);

    let Some(score) = num_field(risk, "score")
        .or_else(|| num_field(risk, "mri"))
        .or_else(|| num_field(root, "mri"))
        .or_else(|| num_field(risk, "rawScore"))
    else {
        bail!("legacy record for {date} has no score");
    };
    let score = clamp_score(score);
    let raw_score = num_field(risk, "rawScore").map(clamp_score).unwrap_or(score);

    let level = str_field(risk, "level")
        .or_else(|| str_field(root, "riskLevel"))
        .and_then(parse_level)
        .or_else(|| str_field(risk, "light").and_then(parse_light))
        .unwrap_or_else(|| level::level_for_score(score, &params.breakpoints));
    let allocation = level::allocation(level);

    let components = risk
        .get("components")
        .map(|c| {
            ComponentScores::new(
                num_field(c, "trend").map(clamp_score).unwrap_or(50),
                num_field(c, "stress").map(clamp_score).unwrap_or(50),
                num_field(c, "regime").map(clamp_score).unwrap_or(50),
            )
        })
        .unwrap_or(ComponentScores::new(50, 50, 50));
    let component_contrib =
        smoothing::reconcile_contributions(&components, score, &params.weights);

    let component_notes = risk
        .get("componentNotes")
        .and_then(|v| serde_json::from_value::<ComponentNotes>(v.clone()).ok())
        .unwrap_or_default();

    let confidence = confidence::confidence_from_components(&components);

    let updated_at = str_field(risk, "updatedAt")
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());

    let data_status = match str_field(root, "dataStatus") {
        Some("stale") => DataStatus::Stale,
        _ => DataStatus::Fresh,
    };

    let momentum = match str_field(risk, "momentum") {
        Some("Rising") => Momentum::Rising,
        Some("Falling") => Momentum::Falling,
        _ => Momentum::Stable,
    };

    Ok(RiskIndexRecord {
        schema_version: SCHEMA_VERSION,
        method_version: str_field(risk, "methodVersion")
            .unwrap_or(METHOD_VERSION)
            .to_string(),
        date,
        updated_at,
        inputs: vec!["SPY".into(), "QQQ".into(), "TLT".into(), "GLD".into()],
        data_status,
        raw_score,
        score,
        level,
        light: level.light(),
        equity_range: str_field(risk, "equityRange")
            .unwrap_or(allocation.equity)
            .to_string(),
        bonds_range: allocation.bonds.to_string(),
        cash_range: allocation.cash.to_string(),
        components,
        component_contrib,
        component_notes,
        key_drivers: Vec::new(),
        percentile_rank: num_field(risk, "percentileRank").map(clamp_score),
        percentile_note: str_field(risk, "percentileNote")
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        percentile_sample: 0,
        confidence_level: confidence.level,
        confidence_reason: confidence.reason,
        momentum,
        regime_duration: num_field(risk, "regimeDuration")
            .map(|v| v.max(0.0) as u32)
            .unwrap_or(0),
        alerts: Vec::new(),
        top_themes: themes_field(root, "topThemes"),
        bottom_themes: themes_field(root, "bottomThemes"),
    })
}

fn num_field(v: &Value, key: &str) -> Option<f64> {
    v.get(key).and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn str_field<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(Value::as_str)
}

fn parse_level(s: &str) -> Option<RiskLevel> {
    match s {
        "low" => Some(RiskLevel::Low),
        "medium" | "neutral" => Some(RiskLevel::Medium),
        "high" => Some(RiskLevel::High),
        _ => None,
    }
}

fn parse_light(s: &str) -> Option<RiskLevel> {
    match s {
        "green" => Some(RiskLevel::Low),
        "yellow" => Some(RiskLevel::Medium),
        "red" => Some(RiskLevel::High),
        _ => None,
    }
}

fn themes_field(root: &Value, key: &str) -> Vec<ThemeScore> {
    root.get(key)
        .and_then(|v| serde_json::from_value::<Vec<ThemeScore>>(v.clone()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn file_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()
    }

    #[test]
    fn unwraps_risk_index_wrapper() {
        let v = json!({
            "date": "2026-02-03",
            "dataStatus": "stale",
            "riskIndex": {
                "score": 44,
                "rawScore": 52,
                "level": "medium",
                "light": "yellow",
                "equityRange": "40-60%",
                "components": {"trend": 25, "stress": 35, "regime": 50}
            }
        });
        let r = normalize_record(v, file_date()).unwrap();
        assert_eq!(r.score, 44);
        assert_eq!(r.raw_score, 52);
        assert_eq!(r.level, RiskLevel::Medium);
        assert_eq!(r.data_status, DataStatus::Stale);
        assert_eq!(r.components, ComponentScores::new(25, 35, 50));
        assert_eq!(r.component_contrib.total(), 44);
        assert_eq!(r.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn reads_mri_and_neutral_from_flat_document() {
        let v = json!({"date": "2026-01-30", "mri": 70, "riskLevel": "neutral"});
        let r = normalize_record(v, file_date()).unwrap();
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2026, 1, 30).unwrap());
        assert_eq!(r.score, 70);
        assert_eq!(r.level, RiskLevel::Medium);
        assert_eq!(r.components, ComponentScores::new(50, 50, 50));
    }

    #[test]
    fn falls_back_to_market_risk_and_light() {
        let v = json!({"marketRisk": {"score": 80, "light": "red"}});
        let r = normalize_record(v, file_date()).unwrap();
        assert_eq!(r.date, file_date());
        assert_eq!(r.level, RiskLevel::High);
        assert_eq!(r.equity_range, "20-40%");
    }

    #[test]
    fn rejects_document_without_score() {
        let v = json!({"date": "2026-02-03", "riskIndex": {"level": "low"}});
        assert!(normalize_record(v, file_date()).is_err());
    }

    #[test]
    fn current_schema_must_parse_strictly() {
        let v = json!({"schemaVersion": 2, "score": 10});
        assert!(normalize_record(v, file_date()).is_err());
    }
}
