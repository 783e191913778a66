use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc, Weekday};
use std::collections::HashSet;

const EST_OFFSET_SECS: i32 = -5 * 3600;
const EDT_OFFSET_SECS: i32 = -4 * 3600;

// DST switches at 02:00 local: 07:00 UTC in March (from EST), 06:00 UTC in November (from EDT).
const DST_START_UTC_HOUR: u32 = 7;
const DST_END_UTC_HOUR: u32 = 6;

/// The as-of date for a run. An explicit `YYYY-MM-DD` wins; otherwise the US/Eastern
/// calendar date of `now_utc`. With `market_days_only`, weekends and configured holidays
/// roll back to the previous business day.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
    market_days_only: bool,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid as-of date {s:?} (expected YYYY-MM-DD)"));
    }

    let mut date = now_utc.with_timezone(&eastern_offset(now_utc)?).date_naive();

    if market_days_only {
        let holidays = configured_holidays(date.year());
        while is_weekend(date) || holidays.contains(&date) {
            date = date - Duration::days(1);
        }
    }

    Ok(date)
}

/// UTC offset of US/Eastern at `now_utc` (EDT during daylight saving, EST otherwise).
pub fn eastern_offset(now_utc: DateTime<Utc>) -> anyhow::Result<FixedOffset> {
    let secs = if is_eastern_dst(now_utc) {
        EDT_OFFSET_SECS
    } else {
        EST_OFFSET_SECS
    };
    FixedOffset::east_opt(secs).context("invalid US/Eastern offset")
}

fn is_eastern_dst(now_utc: DateTime<Utc>) -> bool {
    let year = now_utc.year();
    let start = NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2)
        .and_then(|d| d.and_hms_opt(DST_START_UTC_HOUR, 0, 0));
    let end = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1)
        .and_then(|d| d.and_hms_opt(DST_END_UTC_HOUR, 0, 0));
    match (start, end) {
        (Some(start), Some(end)) => {
            let now = now_utc.naive_utc();
            now >= start && now < end
        }
        _ => false,
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// NYSE fixed-date closures for the years around `year`, moved to the observed weekday,
/// plus anything listed in `US_MARKET_HOLIDAYS`. Floating holidays (MLK, Presidents,
/// Good Friday, Memorial, Labor, Thanksgiving) must come from the env var.
fn configured_holidays(year: i32) -> HashSet<NaiveDate> {
    let mut out = HashSet::new();
    for y in year - 1..=year + 1 {
        for (m, d) in [(1, 1), (6, 19), (7, 4), (12, 25)] {
            // Juneteenth is an exchange holiday from 2022
            if m == 6 && y < 2022 {
                continue;
            }
            if let Some(observed) = NaiveDate::from_ymd_opt(y, m, d).and_then(observed_day) {
                out.insert(observed);
            }
        }
    }

    if let Ok(s) = std::env::var("US_MARKET_HOLIDAYS") {
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Ok(d) = NaiveDate::parse_from_str(part, "%Y-%m-%d") {
                out.insert(d);
            }
        }
    }

    out
}

/// Saturday holidays close the Friday before, Sunday ones the Monday after. New Year's Day
/// on a Saturday is not observed.
fn observed_day(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat if date.month() == 1 && date.day() == 1 => None,
        Weekday::Sat => Some(date - Duration::days(1)),
        Weekday::Sun => Some(date + Duration::days(1)),
        _ => Some(date),
    }
}
