use crate::domain::{MarketRegime, RiskIndexRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const HIGH_ALERT_ABOVE: u32 = 70;
const LOW_ALERT_BELOW: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    RegimeChange {
        date: NaiveDate,
        from: MarketRegime,
        to: MarketRegime,
    },
    ThresholdHigh {
        date: NaiveDate,
        score: u32,
    },
    ThresholdLow {
        date: NaiveDate,
        score: u32,
    },
}

impl Alert {
    pub fn date(&self) -> NaiveDate {
        match self {
            Alert::RegimeChange { date, .. }
            | Alert::ThresholdHigh { date, .. }
            | Alert::ThresholdLow { date, .. } => *date,
        }
    }

    /// Identity for de-duplication. The score is not part of it: one threshold alert of each
    /// kind per day.
    fn key(&self) -> (&'static str, NaiveDate, Option<MarketRegime>, Option<MarketRegime>) {
        match self {
            Alert::RegimeChange { date, from, to } => {
                ("regime_change", *date, Some(*from), Some(*to))
            }
            Alert::ThresholdHigh { date, .. } => ("threshold_high", *date, None, None),
            Alert::ThresholdLow { date, .. } => ("threshold_low", *date, None, None),
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Alert::RegimeChange { .. } => "Risk Alert: Regime Changed",
            Alert::ThresholdHigh { .. } => "High Risk Warning",
            Alert::ThresholdLow { .. } => "Low Risk Notice",
        }
    }
}

/// Alerts raised by `today` relative to the previous published record.
pub fn build_alerts(today: &RiskIndexRecord, previous: Option<&RiskIndexRecord>) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let to = today.level.regime();

    if let Some(prev) = previous {
        let from = prev.level.regime();
        if from != to {
            alerts.push(Alert::RegimeChange {
                date: today.date,
                from,
                to,
            });
        }
    }

    let prev_score = previous.map(|p| p.score);
    if today.score > HIGH_ALERT_ABOVE && prev_score.map_or(true, |p| p <= HIGH_ALERT_ABOVE) {
        alerts.push(Alert::ThresholdHigh {
            date: today.date,
            score: today.score,
        });
    }
    if today.score < LOW_ALERT_BELOW && prev_score.map_or(true, |p| p >= LOW_ALERT_BELOW) {
        alerts.push(Alert::ThresholdLow {
            date: today.date,
            score: today.score,
        });
    }

    alerts
}

/// Appends unseen alerts and returns the history newest-first.
pub fn merge_alert_history(mut history: Vec<Alert>, new_alerts: &[Alert]) -> Vec<Alert> {
    let mut seen: HashSet<_> = history.iter().map(Alert::key).collect();
    for alert in new_alerts {
        if seen.insert(alert.key()) {
            history.push(alert.clone());
        }
    }
    history.sort_by(|a, b| b.date().cmp(&a.date()));
    history
}

/// Headline for the most important alert of a day, if any.
pub fn headline(alerts: &[Alert]) -> Option<&'static str> {
    let rank = |a: &Alert| match a {
        Alert::RegimeChange { .. } => 0,
        Alert::ThresholdHigh { .. } => 1,
        Alert::ThresholdLow { .. } => 2,
    };
    alerts.iter().min_by_key(|a| rank(a)).map(Alert::headline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskLevel;
    use crate::history::tests::record;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, day).unwrap()
    }

    #[test]
    fn regime_change_between_levels() {
        let prev = record(d(1), 40, RiskLevel::Medium);
        let today = record(d(2), 65, RiskLevel::High);
        let alerts = build_alerts(&today, Some(&prev));
        assert_eq!(
            alerts,
            vec![Alert::RegimeChange {
                date: d(2),
                from: MarketRegime::Neutral,
                to: MarketRegime::RiskOff
            }]
        );
    }

    #[test]
    fn threshold_alerts_fire_on_crossing_only() {
        let prev = record(d(1), 72, RiskLevel::High);
        let today = record(d(2), 75, RiskLevel::High);
        assert!(build_alerts(&today, Some(&prev)).is_empty());

        let prev = record(d(1), 68, RiskLevel::High);
        let alerts = build_alerts(&today, Some(&prev));
        assert_eq!(alerts, vec![Alert::ThresholdHigh { date: d(2), score: 75 }]);
    }

    #[test]
    fn first_record_can_raise_threshold_but_not_regime_change() {
        let today = record(d(2), 12, RiskLevel::Low);
        let alerts = build_alerts(&today, None);
        assert_eq!(alerts, vec![Alert::ThresholdLow { date: d(2), score: 12 }]);
    }

    #[test]
    fn merge_dedups_and_sorts_newest_first() {
        let a1 = Alert::ThresholdHigh { date: d(1), score: 71 };
        let a2 = Alert::ThresholdHigh { date: d(3), score: 80 };
        let dup = Alert::ThresholdHigh { date: d(1), score: 75 };
        let merged = merge_alert_history(vec![a1.clone()], &[a2.clone(), dup]);
        assert_eq!(merged, vec![a2, a1]);
    }

    #[test]
    fn alert_json_shape() {
        let a = Alert::RegimeChange {
            date: d(2),
            from: MarketRegime::RiskOn,
            to: MarketRegime::Neutral,
        };
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v["type"], "regime_change");
        assert_eq!(v["from"], "risk_on");
        assert_eq!(v["date"], "2026-04-02");
        assert_eq!(headline(&[a]), Some("Risk Alert: Regime Changed"));
    }
}
