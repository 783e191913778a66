use crate::domain::{ComponentScores, ConfidenceLevel};

const SINGLE_FACTOR_STD: f64 = 35.0;
const MODERATE_STD: f64 = 20.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Percentile {
    /// None until the sample reaches the minimum size.
    pub rank: Option<u32>,
    pub sample: usize,
    pub note: Option<String>,
}

/// Share of `history` plus today that is `<= today`, in percent.
///
/// `history` must not already contain today's score.
pub fn percentile_rank(history: &[u32], today: u32, min_samples: usize) -> Percentile {
    let sample = history.len() + 1;
    if sample < min_samples {
        return Percentile {
            rank: None,
            sample,
            note: Some(format!(
                "insufficient sample (n={sample}, need {min_samples}); percentile withheld"
            )),
        };
    }
    let at_or_below = history.iter().filter(|s| **s <= today).count() + 1;
    let rank = (100.0 * at_or_below as f64 / sample as f64).round() as u32;
    Percentile {
        rank: Some(rank.min(100)),
        sample,
        note: None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Confidence {
    pub level: ConfidenceLevel,
    pub reason: String,
}

/// Label from the population standard deviation of the three component scores.
///
/// Low dispersion reads as low confidence: components that agree closely are not
/// differentiating the market state.
pub fn confidence_from_components(components: &ComponentScores) -> Confidence {
    let std = population_std(&components.as_array().map(f64::from));
    if std >= SINGLE_FACTOR_STD {
        Confidence {
            level: ConfidenceLevel::Medium,
            reason: "single-factor dominated signal".to_string(),
        }
    } else if std >= MODERATE_STD {
        Confidence {
            level: ConfidenceLevel::Medium,
            reason: "moderate agreement between components".to_string(),
        }
    } else {
        Confidence {
            level: ConfidenceLevel::Low,
            reason: "components agree closely; signal is weak".to_string(),
        }
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_withheld_below_minimum() {
        let history = vec![50; 28];
        let p = percentile_rank(&history, 50, 30);
        assert_eq!(p.rank, None);
        assert_eq!(p.sample, 29);
        assert!(p.note.unwrap().contains("n=29"));
    }

    #[test]
    fn percentile_published_at_minimum() {
        let history: Vec<u32> = (0..29).collect();
        let p = percentile_rank(&history, 14, 30);
        // 0..=14 from history (15) + today = 16 of 30
        assert_eq!(p.rank, Some(53));
        assert!(p.note.is_none());
    }

    #[test]
    fn percentile_of_maximum_is_100() {
        let history = vec![10; 40];
        assert_eq!(percentile_rank(&history, 90, 30).rank, Some(100));
    }

    #[test]
    fn confidence_bands() {
        // std of (0, 0, 100) ~ 47
        let c = confidence_from_components(&ComponentScores::new(0, 0, 100));
        assert_eq!(c.level, ConfidenceLevel::Medium);
        assert!(c.reason.contains("single-factor"));

        // std of (25, 50, 100) ~ 31
        let c = confidence_from_components(&ComponentScores::new(25, 50, 100));
        assert_eq!(c.level, ConfidenceLevel::Medium);
        assert!(c.reason.contains("moderate"));

        let c = confidence_from_components(&ComponentScores::new(50, 50, 60));
        assert_eq!(c.level, ConfidenceLevel::Low);
    }
}
