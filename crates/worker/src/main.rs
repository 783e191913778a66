use clap::Parser;
use mri_core::config::Settings;
use mri_core::risk::ScoringParams;
use mri_core::storage::Archive;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod daily;
mod prices;

use daily::{RunOptions, RunOutcome};
use prices::SourceKind;

#[derive(Debug, Parser)]
#[command(name = "mri_worker")]
struct Args {
    /// Market as-of date (YYYY-MM-DD). Defaults to today's US/Eastern date.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Compute and log the record without writing to the archive.
    #[arg(long)]
    dry_run: bool,

    /// Recompute even if the archive already has a record for the date.
    #[arg(long)]
    force: bool,

    #[arg(long, value_enum, default_value = "stooq")]
    source: SourceKind,

    /// Price document for `--source file`. Overrides MRI_PRICES_FILE.
    #[arg(long)]
    prices_file: Option<PathBuf>,

    /// Overrides MRI_ARCHIVE_DIR.
    #[arg(long)]
    archive_dir: Option<PathBuf>,

    /// Roll weekends and configured holidays back to the previous trading day.
    #[arg(long)]
    market_days_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    if let Some(dir) = args.archive_dir.clone() {
        settings.archive_dir = dir;
    }
    if let Some(path) = args.prices_file.clone() {
        settings.prices_file = Some(path);
    }

    let res = run(&args, &settings).await;
    if let Err(err) = &res {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "market risk run failed");
    }
    res
}

async fn run(args: &Args, settings: &Settings) -> anyhow::Result<()> {
    let now = chrono::Utc::now();
    let as_of_date = mri_core::time::us_market::resolve_as_of_date(
        args.as_of_date.as_deref(),
        now,
        args.market_days_only,
    )?;
    let params = ScoringParams::from_env()?;
    let archive = Archive::open(&settings.archive_dir)?;

    let opts = RunOptions {
        as_of_date,
        dry_run: args.dry_run,
        force: args.force,
    };
    let outcome = daily::run_day(&archive, &opts, &params, now, || {
        prices::load_prices(args.source, settings)
    })
    .await?;

    let record = outcome.record();
    match &outcome {
        RunOutcome::Reused(_) => tracing::info!(
            %as_of_date,
            score = record.score,
            level = record.level.as_str(),
            "record already exists; reusing (pass --force to recompute)"
        ),
        RunOutcome::Computed { written, .. } => tracing::info!(
            %as_of_date,
            score = record.score,
            light = ?record.light,
            written,
            forced = args.force,
            "market risk run finished"
        ),
    }
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
