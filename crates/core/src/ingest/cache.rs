use crate::domain::{DataStatus, PriceSource};
use crate::storage::write_atomic;
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Rows kept in the on-disk cache.
pub const CACHE_WINDOW: usize = 400;

/// Last-known-good price document, used when the provider is unreachable.
#[derive(Debug, Clone)]
pub struct PriceCache {
    path: PathBuf,
}

impl PriceCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached document marked `stale`, `None` if there is no cache yet.
    pub fn load(&self) -> anyhow::Result<Option<PriceSource>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read price cache {}", self.path.display()))
            }
        };
        let doc: PriceSource = serde_json::from_str(&text)
            .with_context(|| format!("price cache {} is invalid", self.path.display()))?;
        Ok(Some(doc.normalize()?.with_status(DataStatus::Stale)))
    }

    /// Merges `fresh` into the cache. An unreadable cache is replaced.
    pub fn store(&self, fresh: &PriceSource) -> anyhow::Result<()> {
        let merged = match self.load() {
            Ok(Some(existing)) => existing.merge(fresh.clone(), CACHE_WINDOW),
            Ok(None) => fresh.clone().merge(fresh.clone(), CACHE_WINDOW),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "price cache unreadable; replacing");
                fresh.clone().merge(fresh.clone(), CACHE_WINDOW)
            }
        };
        let json = serde_json::to_string_pretty(&merged).context("serialize price cache failed")?;
        write_atomic(&self.path, &json)?;
        tracing::debug!(path = %self.path.display(), rows = merged.dates.len(), "price cache updated");
        Ok(())
    }
}
