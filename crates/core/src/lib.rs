pub mod domain;
pub mod history;
pub mod ingest;
pub mod risk;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    const DEFAULT_ARCHIVE_DIR: &str = "data/daily";
    const DEFAULT_PRICE_CACHE: &str = "data/cache/prices.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub archive_dir: PathBuf,
        pub price_cache_path: PathBuf,
        pub prices_file: Option<PathBuf>,
        pub stooq_base_url: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                archive_dir: std::env::var("MRI_ARCHIVE_DIR")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ARCHIVE_DIR.to_string())
                    .into(),
                price_cache_path: std::env::var("MRI_PRICE_CACHE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PRICE_CACHE.to_string())
                    .into(),
                prices_file: std::env::var("MRI_PRICES_FILE").ok().map(PathBuf::from),
                stooq_base_url: std::env::var("STOOQ_BASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_prices_file(&self) -> anyhow::Result<&std::path::Path> {
            self.prices_file
                .as_deref()
                .context("MRI_PRICES_FILE (or --prices-file) is required for the file source")
        }
    }
}
