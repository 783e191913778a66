use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use mri_core::domain::{PriceSource, RiskIndexRecord};
use mri_core::history::{alerts, backfill};
use mri_core::risk::{score_day, DayInputs, ScoringParams};
use mri_core::storage::{Archive, ArchiveReadError};
use std::future::Future;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub as_of_date: NaiveDate,
    pub dry_run: bool,
    /// Recompute even when the archive already holds the day.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A valid record already existed and was returned untouched.
    Reused(RiskIndexRecord),
    Computed {
        record: RiskIndexRecord,
        written: bool,
    },
}

impl RunOutcome {
    pub fn record(&self) -> &RiskIndexRecord {
        match self {
            RunOutcome::Reused(record) => record,
            RunOutcome::Computed { record, .. } => record,
        }
    }
}

/// The stored record for the day, if one exists and can be read. An unreadable one is
/// logged and treated as absent so the day gets recomputed.
pub fn existing_record(
    archive: &Archive,
    date: NaiveDate,
) -> anyhow::Result<Option<RiskIndexRecord>> {
    match archive.get(date) {
        Ok(record) => Ok(record),
        Err(err) => match err.downcast_ref::<ArchiveReadError>() {
            Some(diag) => {
                tracing::warn!(
                    %date,
                    path = %diag.path.display(),
                    stage = diag.stage,
                    detail = %diag.detail,
                    "existing record unreadable; recomputing"
                );
                Ok(None)
            }
            None => Err(err),
        },
    }
}

/// One daily run. A readable record already stored for the day is returned as is and
/// `load_prices` is never called; otherwise (or with `force`) the day is computed.
pub async fn run_day<F, Fut>(
    archive: &Archive,
    opts: &RunOptions,
    params: &ScoringParams,
    generated_at: DateTime<Utc>,
    load_prices: F,
) -> anyhow::Result<RunOutcome>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<PriceSource>>,
{
    if !opts.force {
        if let Some(existing) = existing_record(archive, opts.as_of_date)? {
            return Ok(RunOutcome::Reused(existing));
        }
    }

    let prices = load_prices().await?;
    compute_day(archive, &prices, opts, params, generated_at)
}

/// Scores `opts.as_of_date` against the archive and, unless dry-running, stores the result
/// together with `latest.json` and the merged alert history.
pub fn compute_day(
    archive: &Archive,
    prices: &PriceSource,
    opts: &RunOptions,
    params: &ScoringParams,
    generated_at: DateTime<Utc>,
) -> anyhow::Result<RunOutcome> {
    let as_of_date = opts.as_of_date;
    let prices = prices.clone().up_to(as_of_date);
    match prices.latest_date() {
        Some(latest) if latest < as_of_date => {
            tracing::info!(%as_of_date, %latest, "latest close predates as-of date");
        }
        None => tracing::warn!(%as_of_date, "no closes on or before as-of date; scoring degrades"),
        _ => {}
    }

    let yesterday = archive.previous(as_of_date)?;
    // percentile ranks against every published score, not a trailing window
    let history = archive.all_before(as_of_date)?;

    let mut record = score_day(
        &DayInputs {
            as_of_date,
            prices: &prices,
            yesterday: yesterday.as_ref(),
            generated_at,
        },
        params,
    );
    backfill(&mut record, &history, params);

    tracing::info!(
        %as_of_date,
        score = record.score,
        raw_score = record.raw_score,
        level = record.level.as_str(),
        data_status = ?record.data_status,
        yesterday = ?yesterday.as_ref().map(|y| y.date),
        history_len = history.len(),
        "computed market risk index"
    );
    if let Some(headline) = alerts::headline(&record.alerts) {
        tracing::info!(%as_of_date, alerts = record.alerts.len(), headline, "alerts raised");
    }

    if opts.dry_run {
        tracing::info!(%as_of_date, dry_run = true, "skipping archive writes");
        return Ok(RunOutcome::Computed {
            record,
            written: false,
        });
    }

    let path = archive
        .put(&record)
        .with_context(|| format!("failed to write record for {as_of_date}"))?;

    // latest.json only ever moves forward; backfilling an older day leaves it alone.
    let is_newest = archive.dates()?.last().map_or(true, |d| *d <= as_of_date);
    if is_newest {
        archive.write_latest(&record)?;
    }

    if !record.alerts.is_empty() {
        let merged = alerts::merge_alert_history(archive.alert_history(), &record.alerts);
        archive.write_alert_history(&merged)?;
    }

    tracing::info!(%as_of_date, path = %path.display(), "record written");
    Ok(RunOutcome::Computed {
        record,
        written: true,
    })
}
