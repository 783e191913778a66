//! Pure indicator functions over oldest-first close series.
//!
//! Sparse or malformed input degrades to a neutral value instead of failing; callers never
//! see NaN from here.

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const THEME_LOOKBACK: usize = 20;

/// Mean of the last `min(len, window)` observations; 0 for an empty series.
pub fn sma(series: &[f64], window: usize) -> f64 {
    let n = series.len().min(window);
    if n == 0 {
        return 0.0;
    }
    series[series.len() - n..].iter().sum::<f64>() / n as f64
}

/// Simple daily returns over the trailing `window` steps. Steps whose prior close is not a
/// positive finite number are skipped.
pub fn rolling_returns(series: &[f64], window: usize) -> Vec<f64> {
    if series.len() < 2 {
        return Vec::new();
    }
    let n = (series.len() - 1).min(window);
    series[series.len() - n - 1..]
        .windows(2)
        .filter_map(|w| {
            let (prev, cur) = (w[0], w[1]);
            if prev.is_finite() && prev > 0.0 && cur.is_finite() {
                Some((cur - prev) / prev)
            } else {
                None
            }
        })
        .collect()
}

/// Bessel-corrected standard deviation of `returns`, annualized, in percent.
pub fn annualized_volatility(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt() * 100.0
}

/// Worst peak-to-trough move over the trailing window, in percent (always <= 0).
pub fn max_drawdown(series: &[f64], window: usize) -> f64 {
    let n = series.len().min(window);
    if n < 2 {
        return 0.0;
    }
    let mut peak = f64::NAN;
    let mut worst = 0.0_f64;
    for &price in &series[series.len() - n..] {
        if !(price.is_finite() && price > 0.0) {
            continue;
        }
        if peak.is_nan() || price > peak {
            peak = price;
        }
        let dd = (price - peak) / peak;
        if dd < worst {
            worst = dd;
        }
    }
    worst * 100.0
}

/// Share of negative returns, in percent; 0 when there are no returns.
pub fn down_day_share(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let down = returns.iter().filter(|r| **r < 0.0).count();
    down as f64 / returns.len() as f64 * 100.0
}

/// True when `a / b` today is below `a / b` exactly `window` observations ago.
///
/// Both series must be aligned on the same dates. Returns false when there is not enough
/// history or either ratio cannot be formed.
pub fn cross_asset_ratio_weakening(a: &[f64], b: &[f64], window: usize) -> bool {
    if window == 0 || a.len() <= window || b.len() <= window {
        return false;
    }
    let now = ratio(a[a.len() - 1], b[b.len() - 1]);
    let then = ratio(a[a.len() - 1 - window], b[b.len() - 1 - window]);
    match (now, then) {
        (Some(now), Some(then)) => now < then,
        _ => false,
    }
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    if !num.is_finite() || !den.is_finite() || den == 0.0 {
        return None;
    }
    Some(num / den)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeHeat {
    /// 0..=100, 50 is flat.
    pub score: u32,
    /// Fractional return over the lookback (0.05 == +5%).
    pub ret: f64,
}

/// 20-trading-day return mapped to a 0..=100 heat score: `round(50 + ret * 200)`.
pub fn threshold_momentum(series: &[f64]) -> ThemeHeat {
    let n = series.len().min(THEME_LOOKBACK + 1);
    if n < 2 {
        return ThemeHeat { score: 50, ret: 0.0 };
    }
    let now = series[series.len() - 1];
    let then = series[series.len() - n];
    let ret = if then > 0.0 && then.is_finite() && now.is_finite() {
        now / then - 1.0
    } else {
        0.0
    };
    ThemeHeat {
        score: super::clamp_score(50.0 + ret * 200.0),
        ret,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn sma_of_flat_series() {
        let series = vec![10.0; 60];
        assert!(approx(sma(&series, 50), 10.0));
    }

    #[test]
    fn sma_uses_available_history_when_short() {
        assert!(approx(sma(&[1.0, 2.0, 3.0], 200), 2.0));
        assert_eq!(sma(&[], 50), 0.0);
    }

    #[test]
    fn sma_uses_only_trailing_window() {
        assert!(approx(sma(&[100.0, 1.0, 3.0], 2), 2.0));
    }

    #[test]
    fn rolling_returns_skips_non_positive_prior() {
        let r = rolling_returns(&[0.0, 10.0, 11.0, 9.9], 20);
        assert_eq!(r.len(), 2);
        assert!(approx(r[0], 0.1));
        assert!(approx(r[1], -0.1));
    }

    #[test]
    fn rolling_returns_respects_window() {
        let r = rolling_returns(&[1.0, 2.0, 4.0, 8.0], 2);
        assert_eq!(r.len(), 2);
        assert!(approx(r[0], 1.0));
        assert!(rolling_returns(&[5.0], 20).is_empty());
    }

    #[test]
    fn volatility_needs_two_observations() {
        assert_eq!(annualized_volatility(&[]), 0.0);
        assert_eq!(annualized_volatility(&[0.01]), 0.0);
        assert_eq!(annualized_volatility(&[0.01, 0.01, 0.01]), 0.0);
    }

    #[test]
    fn volatility_is_sample_std_annualized() {
        // sample std of [0.01, -0.01] is sqrt(0.0002)
        let v = annualized_volatility(&[0.01, -0.01]);
        assert!(approx(v, 0.0002_f64.sqrt() * 252.0_f64.sqrt() * 100.0));
    }

    #[test]
    fn max_drawdown_example_path() {
        let dd = max_drawdown(&[100.0, 120.0, 90.0, 95.0, 130.0], 60);
        assert!(approx(dd, -25.0));
    }

    #[test]
    fn max_drawdown_degenerate_inputs() {
        assert_eq!(max_drawdown(&[100.0], 60), 0.0);
        assert_eq!(max_drawdown(&[100.0, 110.0, 120.0], 60), 0.0);
    }

    #[test]
    fn max_drawdown_only_looks_at_window() {
        // The 200 -> 100 crash falls outside the 3-point window.
        let dd = max_drawdown(&[200.0, 100.0, 100.0, 90.0], 3);
        assert!(approx(dd, -10.0));
    }

    #[test]
    fn down_day_share_percent() {
        assert!(approx(down_day_share(&[-0.1, 0.1, -0.2, 0.0]), 50.0));
        assert_eq!(down_day_share(&[]), 0.0);
    }

    #[test]
    fn ratio_weakening_detects_relative_drop() {
        let a = [10.0, 10.0, 9.0];
        let b = [10.0, 10.0, 10.0];
        assert!(cross_asset_ratio_weakening(&a, &b, 2));
        assert!(!cross_asset_ratio_weakening(&b, &a, 2));
    }

    #[test]
    fn ratio_weakening_guards_short_and_zero() {
        assert!(!cross_asset_ratio_weakening(&[1.0, 0.5], &[1.0, 1.0], 2));
        assert!(!cross_asset_ratio_weakening(&[1.0, 0.5], &[0.0, 1.0], 1));
    }

    #[test]
    fn threshold_momentum_maps_return_to_heat() {
        let mut series = vec![100.0; 21];
        *series.last_mut().unwrap() = 110.0;
        let heat = threshold_momentum(&series);
        assert_eq!(heat.score, 70);
        assert!(approx(heat.ret, 0.1));

        let crash: Vec<f64> = (0..21).map(|i| if i == 20 { 50.0 } else { 100.0 }).collect();
        assert_eq!(threshold_momentum(&crash).score, 0);
        assert_eq!(threshold_momentum(&[1.0]).score, 50);
    }
}
