use crate::domain::{ComponentScores, PriceSource};
use crate::risk::indicators;

const MA_SHORT: usize = 50;
const MA_LONG: usize = 200;
const VOL_WINDOW: usize = 20;
const DRAWDOWN_WINDOW: usize = 60;
const RATIO_WINDOW: usize = 20;

const VOL_THRESHOLD_PCT: f64 = 25.0;
const DRAWDOWN_THRESHOLD_PCT: f64 = -15.0;
const DOWN_DAY_THRESHOLD_PCT: f64 = 55.0;

const VOL_POINTS: u32 = 35;
const DRAWDOWN_POINTS: u32 = 35;
const DOWN_DAY_POINTS: u32 = 30;
const RATIO_POINTS: u32 = 50;

/// Indicator values behind one day's component scores. Kept for the human-readable notes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    /// None when the benchmark series is empty.
    pub close: Option<f64>,
    pub ma50: f64,
    pub ma200: f64,
    pub vol20: f64,
    pub mdd60: f64,
    pub down_day_pct: f64,
    pub qqq_tlt_weakening: bool,
    pub spy_gld_weakening: bool,
}

impl IndicatorSnapshot {
    pub fn from_prices(prices: &PriceSource) -> Self {
        let spy = prices.closes("SPY");
        let returns = indicators::rolling_returns(spy, VOL_WINDOW);

        Self {
            close: spy.last().copied(),
            ma50: indicators::sma(spy, MA_SHORT),
            ma200: indicators::sma(spy, MA_LONG),
            vol20: indicators::annualized_volatility(&returns),
            mdd60: indicators::max_drawdown(spy, DRAWDOWN_WINDOW),
            down_day_pct: indicators::down_day_share(&returns),
            qqq_tlt_weakening: indicators::cross_asset_ratio_weakening(
                prices.closes("QQQ"),
                prices.closes("TLT"),
                RATIO_WINDOW,
            ),
            spy_gld_weakening: indicators::cross_asset_ratio_weakening(
                spy,
                prices.closes("GLD"),
                RATIO_WINDOW,
            ),
        }
    }

    pub fn scores(&self) -> ComponentScores {
        ComponentScores {
            trend: trend_score(self.close, self.ma50, self.ma200),
            stress: stress_score(self.vol20, self.mdd60, self.down_day_pct),
            regime: regime_score(self.qqq_tlt_weakening, self.spy_gld_weakening),
        }
    }
}

/// Price-structure risk. Higher means weaker structure.
///
/// | close vs MA200 | close vs MA50 | score |
/// |----------------|---------------|-------|
/// | above          | above         | 25    |
/// | above          | below         | 50    |
/// | below          | above         | 75    |
/// | below          | below         | 100   |
pub fn trend_score(close: Option<f64>, ma50: f64, ma200: f64) -> u32 {
    let Some(close) = close else {
        return 50;
    };
    match (close >= ma200, close >= ma50) {
        (true, true) => 25,
        (true, false) => 50,
        (false, true) => 75,
        (false, false) => 100,
    }
}

pub fn stress_score(vol20: f64, mdd60: f64, down_day_pct: f64) -> u32 {
    let mut score = 0;
    if vol20 > VOL_THRESHOLD_PCT {
        score += VOL_POINTS;
    }
    if mdd60 < DRAWDOWN_THRESHOLD_PCT {
        score += DRAWDOWN_POINTS;
    }
    if down_day_pct > DOWN_DAY_THRESHOLD_PCT {
        score += DOWN_DAY_POINTS;
    }
    score.min(100)
}

pub fn regime_score(qqq_tlt_weakening: bool, spy_gld_weakening: bool) -> u32 {
    let mut score = 0;
    if qqq_tlt_weakening {
        score += RATIO_POINTS;
    }
    if spy_gld_weakening {
        score += RATIO_POINTS;
    }
    score.min(100)
}
