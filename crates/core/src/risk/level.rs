use crate::domain::RiskLevel;

/// Lower bounds (inclusive) of the medium and high bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelBreakpoints {
    pub medium_from: u32,
    pub high_from: u32,
}

impl Default for LevelBreakpoints {
    fn default() -> Self {
        Self {
            medium_from: 31,
            high_from: 61,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub equity: &'static str,
    pub bonds: &'static str,
    pub cash: &'static str,
}

pub fn level_for_score(score: u32, breakpoints: &LevelBreakpoints) -> RiskLevel {
    if score >= breakpoints.high_from {
        RiskLevel::High
    } else if score >= breakpoints.medium_from {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn allocation(level: RiskLevel) -> Allocation {
    match level {
        RiskLevel::Low => Allocation {
            equity: "60-80%",
            bonds: "10-25%",
            cash: "5-15%",
        },
        RiskLevel::Medium => Allocation {
            equity: "40-60%",
            bonds: "20-40%",
            cash: "10-20%",
        },
        RiskLevel::High => Allocation {
            equity: "20-40%",
            bonds: "30-50%",
            cash: "20-30%",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Light;

    #[test]
    fn exact_breakpoints() {
        let bp = LevelBreakpoints::default();
        assert_eq!(level_for_score(0, &bp), RiskLevel::Low);
        assert_eq!(level_for_score(30, &bp), RiskLevel::Low);
        assert_eq!(level_for_score(31, &bp), RiskLevel::Medium);
        assert_eq!(level_for_score(60, &bp), RiskLevel::Medium);
        assert_eq!(level_for_score(61, &bp), RiskLevel::High);
        assert_eq!(level_for_score(100, &bp), RiskLevel::High);
        assert_eq!(level_for_score(61, &bp).light(), Light::Red);
    }

    #[test]
    fn mapping_is_monotonic() {
        let bp = LevelBreakpoints::default();
        let rank = |l: RiskLevel| match l {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        };
        let mut prev = 0;
        for score in 0..=100 {
            let r = rank(level_for_score(score, &bp));
            assert!(r >= prev, "level dropped at {score}");
            prev = r;
        }
    }

    #[test]
    fn equity_range_shrinks_with_risk() {
        assert_eq!(allocation(RiskLevel::Low).equity, "60-80%");
        assert_eq!(allocation(RiskLevel::Medium).equity, "40-60%");
        assert_eq!(allocation(RiskLevel::High).equity, "20-40%");
    }
}
