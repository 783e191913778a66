use crate::domain::{ComponentNotes, ComponentScores, ThemeScore};
use crate::risk::components::IndicatorSnapshot;
use crate::risk::indicators::ThemeHeat;

pub fn component_notes(snapshot: &IndicatorSnapshot, banded: &ComponentScores) -> ComponentNotes {
    let trend = match snapshot.close {
        Some(close) => format!(
            "Trend risk {}: SPY {} MA200 and {} MA50 (rule: close_vs_ma50_ma200)",
            banded.trend,
            side(close, snapshot.ma200),
            side(close, snapshot.ma50),
        ),
        None => format!(
            "Trend risk {}: no benchmark history (rule: close_vs_ma50_ma200)",
            banded.trend
        ),
    };

    let stress = format!(
        "Stress risk {}: vol20 {:.1}%, 60D drawdown {:.1}%, down days {:.0}% (rule: stress_thresholds)",
        banded.stress, snapshot.vol20, snapshot.mdd60, snapshot.down_day_pct
    );

    let regime = {
        let weakening: Vec<&str> = [
            (snapshot.qqq_tlt_weakening, "QQQ/TLT"),
            (snapshot.spy_gld_weakening, "SPY/GLD"),
        ]
        .into_iter()
        .filter_map(|(hit, name)| hit.then_some(name))
        .collect();
        if weakening.is_empty() {
            format!(
                "Regime risk {}: risk-on ratios holding (rule: ratio_down_20d)",
                banded.regime
            )
        } else {
            format!(
                "Regime risk {}: {} weakening over 20D, risk-off (rule: ratio_down_20d)",
                banded.regime,
                weakening.join(", ")
            )
        }
    };

    ComponentNotes {
        trend,
        stress,
        regime,
    }
}

fn side(close: f64, ma: f64) -> &'static str {
    if close >= ma {
        "above"
    } else {
        "below"
    }
}

/// Three short phrases, one per component, from the banded scores.
pub fn key_drivers(banded: &ComponentScores) -> Vec<String> {
    let describe = |value: u32, high: &str, low: &str, neutral: &str| {
        if value >= 75 {
            high.to_string()
        } else if value <= 25 {
            low.to_string()
        } else {
            neutral.to_string()
        }
    };
    vec![
        describe(banded.trend, "trend risk elevated", "trend risk subdued", "trend risk neutral"),
        describe(
            banded.stress,
            "stress risk elevated",
            "stress risk subdued",
            "stress risk neutral",
        ),
        describe(
            banded.regime,
            "risk appetite weak",
            "risk appetite strong",
            "risk appetite neutral",
        ),
    ]
}

pub fn theme_score(name: &str, heat: ThemeHeat) -> ThemeScore {
    let pct = heat.ret * 100.0;
    let note = if heat.ret >= 0.0 {
        format!("20D strength +{pct:.1}%")
    } else {
        format!("20D pullback {pct:.1}%")
    };
    ThemeScore {
        name: name.to_string(),
        score: heat.score,
        note,
    }
}
