use anyhow::Context;
use mri_core::config::Settings;
use mri_core::domain::PriceSource;
use mri_core::ingest::{FilePriceProvider, PriceCache, PriceProvider, StooqProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceKind {
    Stooq,
    File,
}

pub async fn load_prices(kind: SourceKind, settings: &Settings) -> anyhow::Result<PriceSource> {
    match kind {
        SourceKind::Stooq => {
            let provider = StooqProvider::from_settings(settings)?;
            let cache = PriceCache::new(&settings.price_cache_path);
            load_with_fallback(&provider, &cache).await
        }
        SourceKind::File => {
            let provider = FilePriceProvider::from_settings(settings)?;
            let prices = provider.fetch_prices().await?;
            tracing::info!(
                provider = provider.provider_name(),
                rows = prices.dates.len(),
                latest = ?prices.latest_date(),
                "loaded prices"
            );
            Ok(prices)
        }
    }
}

/// Fresh prices from `provider`, merged into the cache. When the provider fails the cached
/// document is used instead and marked stale. Fails only when neither is available.
pub async fn load_with_fallback(
    provider: &dyn PriceProvider,
    cache: &PriceCache,
) -> anyhow::Result<PriceSource> {
    let fetch_err = match provider.fetch_prices().await {
        Ok(prices) => {
            tracing::info!(
                provider = provider.provider_name(),
                rows = prices.dates.len(),
                latest = ?prices.latest_date(),
                "fetched fresh prices"
            );
            if let Err(err) = cache.store(&prices) {
                tracing::warn!(path = %cache.path().display(), error = %format!("{err:#}"), "failed to update price cache");
            }
            return Ok(prices);
        }
        Err(err) => err,
    };

    tracing::warn!(
        provider = provider.provider_name(),
        error = %format!("{fetch_err:#}"),
        "price fetch failed; falling back to cache"
    );
    match cache.load() {
        Ok(Some(prices)) => {
            tracing::warn!(path = %cache.path().display(), latest = ?prices.latest_date(), "using stale cached prices");
            Ok(prices)
        }
        Ok(None) => Err(fetch_err)
            .with_context(|| format!("no price cache at {}", cache.path().display())),
        Err(cache_err) => Err(fetch_err).context(format!("price cache unusable: {cache_err:#}")),
    }
}
