use anyhow::{bail, ensure};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Symbols every run needs. Anything else in `series` is treated as a theme basket.
pub const CORE_SYMBOLS: [&str; 4] = ["SPY", "QQQ", "TLT", "GLD"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Fresh,
    Stale,
}

/// Closing prices aligned on `dates`, oldest first.
///
/// Core symbols always have one close per date. Theme baskets may be shorter and are
/// aligned on the most recent end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSource {
    pub dates: Vec<NaiveDate>,
    pub series: BTreeMap<String, Vec<f64>>,
    pub source: DataStatus,
    pub updated_at: DateTime<Utc>,
}

impl PriceSource {
    pub fn closes(&self, symbol: &str) -> &[f64] {
        self.series.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn theme_symbols(&self) -> impl Iterator<Item = &str> {
        self.series
            .keys()
            .map(String::as_str)
            .filter(|k| !CORE_SYMBOLS.contains(k))
    }

    pub fn with_status(mut self, source: DataStatus) -> Self {
        self.source = source;
        self
    }

    /// Brings the document into the canonical shape: oldest-first dates, unique dates,
    /// and no rows with non-finite or non-positive core closes.
    pub fn normalize(mut self) -> anyhow::Result<Self> {
        for symbol in CORE_SYMBOLS {
            let Some(closes) = self.series.get(symbol) else {
                bail!("price series for {symbol} is missing");
            };
            ensure!(
                closes.len() == self.dates.len(),
                "price series for {symbol} has {} closes for {} dates",
                closes.len(),
                self.dates.len()
            );
        }

        let newest_first =
            self.dates.len() >= 2 && self.dates[0] > self.dates[self.dates.len() - 1];
        if newest_first {
            self.dates.reverse();
            for closes in self.series.values_mut() {
                closes.reverse();
            }
        }

        let mut keep = Vec::with_capacity(self.dates.len());
        let mut last: Option<NaiveDate> = None;
        let mut dropped = 0usize;
        for (idx, date) in self.dates.iter().enumerate() {
            let in_order = last.map_or(true, |prev| *date > prev);
            let valid = CORE_SYMBOLS
                .iter()
                .all(|s| is_valid_close(self.series[*s][idx]));
            if in_order && valid {
                keep.push(idx);
                last = Some(*date);
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::warn!(dropped, "dropped malformed or out-of-order price rows");
        }

        let dates = keep.iter().map(|&i| self.dates[i]).collect();
        let mut series = BTreeMap::new();
        for (symbol, closes) in self.series {
            let cleaned: Vec<f64> = if CORE_SYMBOLS.contains(&symbol.as_str()) {
                keep.iter().map(|&i| closes[i]).collect()
            } else {
                closes.into_iter().filter(|c| is_valid_close(*c)).collect()
            };
            series.insert(symbol, cleaned);
        }

        Ok(Self {
            dates,
            series,
            source: self.source,
            updated_at: self.updated_at,
        })
    }

    /// Drops closes dated after `date`, for scoring a past day from a longer document.
    /// Theme baskets end on the last date like the core series, so they lose the same
    /// number of trailing closes.
    pub fn up_to(mut self, date: NaiveDate) -> Self {
        let keep = self.dates.partition_point(|d| *d <= date);
        let dropped = self.dates.len() - keep;
        if dropped == 0 {
            return self;
        }
        self.dates.truncate(keep);
        for closes in self.series.values_mut() {
            closes.truncate(closes.len().saturating_sub(dropped));
        }
        self
    }

    /// Upserts `fresh` rows into `self` by date and keeps the most recent `keep` rows.
    /// Only dates carrying every core symbol survive the merge.
    pub fn merge(self, fresh: PriceSource, keep: usize) -> PriceSource {
        let mut rows: BTreeMap<NaiveDate, BTreeMap<&'static str, f64>> = BTreeMap::new();
        for doc in [&self, &fresh] {
            for (idx, date) in doc.dates.iter().enumerate() {
                let row = rows.entry(*date).or_default();
                for symbol in CORE_SYMBOLS {
                    if let Some(close) = doc.series.get(symbol).and_then(|c| c.get(idx)) {
                        row.insert(symbol, *close);
                    }
                }
            }
        }

        let complete: Vec<(NaiveDate, BTreeMap<&'static str, f64>)> = rows
            .into_iter()
            .filter(|(_, row)| row.len() == CORE_SYMBOLS.len())
            .collect();
        let skip = complete.len().saturating_sub(keep);

        let mut dates = Vec::with_capacity(complete.len() - skip);
        let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (date, row) in complete.into_iter().skip(skip) {
            dates.push(date);
            for (symbol, close) in row {
                series.entry(symbol.to_string()).or_default().push(close);
            }
        }

        // Theme baskets are not date-keyed; the newer document wins.
        for (symbol, closes) in self.series.into_iter().chain(fresh.series.clone()) {
            if !CORE_SYMBOLS.contains(&symbol.as_str()) {
                series.insert(symbol, closes);
            }
        }

        PriceSource {
            dates,
            series,
            source: fresh.source,
            updated_at: fresh.updated_at,
        }
    }
}

fn is_valid_close(close: f64) -> bool {
    close.is_finite() && close > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn doc(days: &[u32], spy: &[f64]) -> PriceSource {
        let mut series = BTreeMap::new();
        for symbol in CORE_SYMBOLS {
            series.insert(symbol.to_string(), spy.to_vec());
        }
        PriceSource {
            dates: days.iter().map(|&x| d(x)).collect(),
            series,
            source: DataStatus::Fresh,
            updated_at: Utc.with_ymd_and_hms(2026, 3, 10, 21, 0, 0).unwrap(),
        }
    }

    #[test]
    fn normalize_reverses_newest_first_input() {
        let src = doc(&[5, 4, 3], &[3.0, 2.0, 1.0]).normalize().unwrap();
        assert_eq!(src.dates, vec![d(3), d(4), d(5)]);
        assert_eq!(src.closes("SPY"), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn normalize_drops_bad_rows() {
        let src = doc(&[2, 3, 4, 5], &[1.0, f64::NAN, -1.0, 4.0])
            .normalize()
            .unwrap();
        assert_eq!(src.dates, vec![d(2), d(5)]);
        assert_eq!(src.closes("QQQ"), &[1.0, 4.0]);
    }

    #[test]
    fn normalize_rejects_missing_core_symbol() {
        let mut src = doc(&[2, 3], &[1.0, 2.0]);
        src.series.remove("GLD");
        assert!(src.normalize().is_err());
    }

    #[test]
    fn normalize_rejects_length_mismatch() {
        let mut src = doc(&[2, 3], &[1.0, 2.0]);
        src.series.insert("TLT".to_string(), vec![1.0]);
        assert!(src.normalize().is_err());
    }

    #[test]
    fn merge_upserts_by_date_and_keeps_tail() {
        let cached = doc(&[1, 2, 3], &[10.0, 20.0, 30.0]);
        let fresh = doc(&[3, 4], &[31.0, 40.0]);
        let merged = cached.merge(fresh, 3);
        assert_eq!(merged.dates, vec![d(2), d(3), d(4)]);
        assert_eq!(merged.closes("SPY"), &[20.0, 31.0, 40.0]);
    }

    #[test]
    fn merge_takes_themes_from_fresh_document() {
        let mut cached = doc(&[1], &[10.0]);
        cached.series.insert("AI".to_string(), vec![1.0]);
        let mut fresh = doc(&[2], &[11.0]);
        fresh.series.insert("AI".to_string(), vec![2.0, 3.0]);
        let merged = cached.merge(fresh, 10);
        assert_eq!(merged.closes("AI"), &[2.0, 3.0]);
        assert_eq!(merged.theme_symbols().collect::<Vec<_>>(), vec!["AI"]);
    }

    #[test]
    fn up_to_cuts_later_rows() {
        let src = doc(&[2, 3, 4], &[1.0, 2.0, 3.0]).up_to(d(3));
        assert_eq!(src.dates, vec![d(2), d(3)]);
        assert_eq!(src.closes("GLD"), &[1.0, 2.0]);
        assert_eq!(src.clone().up_to(d(9)), src);
        assert!(src.up_to(d(1)).dates.is_empty());
    }

    #[test]
    fn up_to_cuts_theme_closes_after_the_date() {
        let mut src = doc(&[2, 3, 4, 5], &[1.0, 2.0, 3.0, 4.0]);
        // a shorter basket that ends on the last date
        src.series.insert("AI".to_string(), vec![10.0, 10.0, 30.0]);
        let past = src.up_to(d(3));
        assert_eq!(past.closes("SPY"), &[1.0, 2.0]);
        assert_eq!(past.closes("AI"), &[10.0]);
    }
}
