use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// One symbol's daily closes as parsed from a provider, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyCloses {
    pub symbol: String,
    pub rows: Vec<(NaiveDate, f64)>,
}

impl DailyCloses {
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.rows
            .binary_search_by_key(&date, |(d, _)| *d)
            .ok()
            .map(|i| self.rows[i].1)
    }
}

/// Parses a `Date,Open,High,Low,Close[,Volume]` CSV. The header and any row without a
/// parseable date or finite close are skipped.
pub fn parse_daily_csv(symbol: &str, text: &str) -> DailyCloses {
    let mut rows: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for line in text.lines().skip(1) {
        let parts: Vec<&str> = line.trim().split(',').collect();
        if parts.len() < 5 {
            continue;
        }
        let Ok(date) = NaiveDate::parse_from_str(parts[0].trim(), "%Y-%m-%d") else {
            continue;
        };
        let Ok(close) = parts[4].trim().parse::<f64>() else {
            continue;
        };
        if close.is_finite() {
            rows.insert(date, close);
        }
    }
    DailyCloses {
        symbol: symbol.to_string(),
        rows: rows.into_iter().collect(),
    }
}

/// Dates present in every series, ascending.
pub fn intersect_dates(all: &[DailyCloses]) -> Vec<NaiveDate> {
    let mut iter = all.iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let mut common: BTreeSet<NaiveDate> = first.rows.iter().map(|(d, _)| *d).collect();
    for s in iter {
        let next: BTreeSet<NaiveDate> = s.rows.iter().map(|(d, _)| *d).collect();
        common = common.intersection(&next).copied().collect();
    }
    common.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    #[test]
    fn parses_stooq_shape() {
        let csv = "Date,Open,High,Low,Close,Volume\n\
                   2026-02-03,1,2,0.5,101.5,1000\n\
                   2026-02-02,1,2,0.5,100.25,900\n\
                   garbage\n\
                   2026-02-04,1,2,0.5,n/a,1\n";
        let parsed = parse_daily_csv("SPY", csv);
        assert_eq!(parsed.rows, vec![(d(2), 100.25), (d(3), 101.5)]);
        assert_eq!(parsed.close_on(d(3)), Some(101.5));
        assert_eq!(parsed.close_on(d(4)), None);
    }

    #[test]
    fn no_data_body_parses_empty() {
        assert!(parse_daily_csv("GLD", "No data").rows.is_empty());
    }

    #[test]
    fn intersects_across_symbols() {
        let a = DailyCloses {
            symbol: "A".into(),
            rows: vec![(d(1), 1.0), (d(2), 1.0), (d(3), 1.0)],
        };
        let b = DailyCloses {
            symbol: "B".into(),
            rows: vec![(d(2), 1.0), (d(3), 1.0), (d(4), 1.0)],
        };
        assert_eq!(intersect_dates(&[a, b]), vec![d(2), d(3)]);
        assert!(intersect_dates(&[]).is_empty());
    }
}
