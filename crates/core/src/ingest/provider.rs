use crate::config::Settings;
use crate::domain::{DataStatus, PriceSource, CORE_SYMBOLS};
use crate::ingest::types::{intersect_dates, parse_daily_csv, DailyCloses};
use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_STOOQ_BASE_URL: &str = "https://stooq.com/q/d/l/";

/// Rows kept from a fresh fetch. Enough for MA200 with margin.
pub const FRESH_WINDOW: usize = 260;

#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Returns a normalized, oldest-first price document.
    async fn fetch_prices(&self) -> Result<PriceSource>;
}

/// Daily CSV downloads from stooq, one request per core symbol.
#[derive(Debug, Clone)]
pub struct StooqProvider {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl StooqProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .stooq_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STOOQ_BASE_URL.to_string());

        let timeout_secs = std::env::var("PRICE_PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("PRICE_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build price provider http client")?;

        Ok(Self {
            http,
            base_url,
            retries,
        })
    }

    fn url(&self, symbol: &str) -> String {
        format!(
            "{}?s={}.us&i=d",
            self.base_url.trim_end_matches('?'),
            symbol.to_ascii_lowercase()
        )
    }

    async fn fetch_once(&self, symbol: &str) -> Result<DailyCloses> {
        let url = self.url(symbol);
        let res = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("stooq request for {symbol} failed"))?;

        let status = res.status();
        if !status.is_success() {
            anyhow::bail!("stooq {symbol} HTTP {status}");
        }
        let text = res
            .text()
            .await
            .with_context(|| format!("failed to read stooq response for {symbol}"))?;

        let parsed = parse_daily_csv(symbol, &text);
        anyhow::ensure!(!parsed.rows.is_empty(), "stooq returned no rows for {symbol}");
        Ok(parsed)
    }

    async fn fetch_symbol(&self, symbol: &str) -> Result<DailyCloses> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetch_once(symbol).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(symbol, attempt, ?backoff, error = %err, "price fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl PriceProvider for StooqProvider {
    fn provider_name(&self) -> &'static str {
        "stooq"
    }

    async fn fetch_prices(&self) -> Result<PriceSource> {
        let (spy, qqq, tlt, gld) = tokio::try_join!(
            self.fetch_symbol(CORE_SYMBOLS[0]),
            self.fetch_symbol(CORE_SYMBOLS[1]),
            self.fetch_symbol(CORE_SYMBOLS[2]),
            self.fetch_symbol(CORE_SYMBOLS[3]),
        )?;
        assemble(&[spy, qqq, tlt, gld], FRESH_WINDOW)
    }
}

/// Lines the per-symbol series up on their common dates and keeps the last `keep`.
pub fn assemble(all: &[DailyCloses], keep: usize) -> Result<PriceSource> {
    let mut dates = intersect_dates(all);
    anyhow::ensure!(!dates.is_empty(), "no common trading dates across symbols");
    let skip = dates.len().saturating_sub(keep);
    dates.drain(..skip);

    let mut series = BTreeMap::new();
    for s in all {
        let closes = dates
            .iter()
            .map(|d| s.close_on(*d).context("intersected date missing a close"))
            .collect::<Result<Vec<f64>>>()?;
        series.insert(s.symbol.clone(), closes);
    }

    PriceSource {
        dates,
        series,
        source: DataStatus::Fresh,
        updated_at: Utc::now(),
    }
    .normalize()
}

/// Reads a `PriceSource` JSON document from disk. Used for backfills and offline runs.
#[derive(Debug, Clone)]
pub struct FilePriceProvider {
    path: PathBuf,
}

impl FilePriceProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(settings.require_prices_file()?))
    }
}

#[async_trait::async_trait]
impl PriceProvider for FilePriceProvider {
    fn provider_name(&self) -> &'static str {
        "file"
    }

    async fn fetch_prices(&self) -> Result<PriceSource> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read prices file {}", self.path.display()))?;
        let doc: PriceSource = serde_json::from_str(&text).with_context(|| {
            format!("prices file {} is not a price document", self.path.display())
        })?;
        doc.normalize()
    }
}
