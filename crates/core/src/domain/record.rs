use crate::domain::prices::DataStatus;
use crate::history::alerts::Alert;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Bumped whenever a field is added to or renamed in [`RiskIndexRecord`].
pub const SCHEMA_VERSION: u32 = 2;
pub const METHOD_VERSION: &str = "MRI-1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[serde(alias = "neutral")]
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn light(self) -> Light {
        match self {
            RiskLevel::Low => Light::Green,
            RiskLevel::Medium => Light::Yellow,
            RiskLevel::High => Light::Red,
        }
    }

    pub fn regime(self) -> MarketRegime {
        match self {
            RiskLevel::Low => MarketRegime::RiskOn,
            RiskLevel::Medium => MarketRegime::Neutral,
            RiskLevel::High => MarketRegime::RiskOff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Light {
    Green,
    Yellow,
    Red,
}

impl Light {
    pub fn level(self) -> RiskLevel {
        match self {
            Light::Green => RiskLevel::Low,
            Light::Yellow => RiskLevel::Medium,
            Light::Red => RiskLevel::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    RiskOn,
    Neutral,
    RiskOff,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub trend: u32,
    pub stress: u32,
    pub regime: u32,
}

impl ComponentScores {
    pub fn new(trend: u32, stress: u32, regime: u32) -> Self {
        Self {
            trend,
            stress,
            regime,
        }
    }

    pub fn total(&self) -> u32 {
        self.trend + self.stress + self.regime
    }

    pub fn as_array(&self) -> [u32; 3] {
        [self.trend, self.stress, self.regime]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentNotes {
    pub trend: String,
    pub stress: String,
    pub regime: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Momentum {
    Rising,
    Falling,
    #[default]
    Stable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeScore {
    pub name: String,
    pub score: u32,
    pub note: String,
}

/// The persisted daily artifact. Field names are the contract for downstream renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskIndexRecord {
    pub schema_version: u32,
    pub method_version: String,
    pub date: NaiveDate,
    pub updated_at: DateTime<Utc>,
    pub inputs: Vec<String>,
    pub data_status: DataStatus,

    pub raw_score: u32,
    pub score: u32,
    pub level: RiskLevel,
    pub light: Light,
    pub equity_range: String,
    pub bonds_range: String,
    pub cash_range: String,

    pub components: ComponentScores,
    pub component_contrib: ComponentScores,
    pub component_notes: ComponentNotes,
    #[serde(default)]
    pub key_drivers: Vec<String>,

    pub percentile_rank: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentile_note: Option<String>,
    #[serde(default)]
    pub percentile_sample: usize,
    pub confidence_level: ConfidenceLevel,
    pub confidence_reason: String,

    #[serde(default)]
    pub momentum: Momentum,
    #[serde(default)]
    pub regime_duration: u32,
    #[serde(default)]
    pub alerts: Vec<Alert>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_themes: Vec<ThemeScore>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bottom_themes: Vec<ThemeScore>,
}

impl RiskIndexRecord {
    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_accepts_legacy_neutral_spelling() {
        let level: RiskLevel = serde_json::from_str("\"neutral\"").unwrap();
        assert_eq!(level, RiskLevel::Medium);
        assert_eq!(serde_json::to_string(&level).unwrap(), "\"medium\"");
    }

    #[test]
    fn light_and_level_are_aliases() {
        for level in [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High] {
            assert_eq!(level.light().level(), level);
        }
        assert_eq!(RiskLevel::High.regime(), MarketRegime::RiskOff);
        assert_eq!(
            serde_json::to_string(&MarketRegime::RiskOn).unwrap(),
            "\"risk_on\""
        );
    }
}
