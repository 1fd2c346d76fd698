//! Catalog selection
//!
//! Picks the catalog to activate among up to four candidates. The highest
//! version wins; equal versions are decided by source priority:
//!
//! ```text
//! Maintainer > Downloaded > Cached > Bundled
//! ```
//!
//! A download is attempted at most once per process. A successful download
//! is written to the cache (best effort); a failed one falls back to the
//! remaining sources.

use once_cell::sync::Lazy;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::ModcatConfig;
use crate::error::{CatalogError, Result};

/// Where a candidate catalog came from, in tie-break priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CatalogSource {
    Maintainer,
    Downloaded,
    Cached,
    Bundled,
}

impl CatalogSource {
    pub fn as_str(self) -> &'static str {
        match self {
            CatalogSource::Maintainer => "maintainer",
            CatalogSource::Downloaded => "downloaded",
            CatalogSource::Cached => "cached",
            CatalogSource::Bundled => "bundled",
        }
    }
}

impl fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub source: CatalogSource,
    pub catalog: Catalog,
}

impl Candidate {
    pub fn new(source: CatalogSource, catalog: Catalog) -> Self {
        Self { source, catalog }
    }
}

/// Pick the best valid candidate
///
/// Candidates failing the version/timestamp sentinel check are discarded
/// with a warning.
pub fn select(candidates: Vec<Candidate>) -> Result<Candidate> {
    candidates
        .into_iter()
        .filter(|candidate| match candidate.catalog.invalid_reason() {
            None => true,
            Some(reason) => {
                let err = CatalogError::StaleCatalog {
                    source_name: candidate.source.to_string(),
                    reason,
                };
                tracing::warn!("Discarding candidate: {}", err);
                false
            }
        })
        .max_by(|a, b| {
            a.catalog
                .version()
                .cmp(&b.catalog.version())
                .then(b.source.cmp(&a.source))
        })
        .ok_or(CatalogError::NoCatalogAvailable)
}

static PROCESS_LATCH: Lazy<Arc<AtomicBool>> = Lazy::new(|| Arc::new(AtomicBool::new(false)));

/// "Download already attempted" flag
///
/// [`DownloadLatch::process`] shares one flag across the whole process;
/// [`DownloadLatch::new`] creates an independent one.
#[derive(Debug, Clone)]
pub struct DownloadLatch {
    attempted: Arc<AtomicBool>,
}

impl DownloadLatch {
    pub fn new() -> Self {
        Self {
            attempted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn process() -> Self {
        Self {
            attempted: Arc::clone(&PROCESS_LATCH),
        }
    }

    /// True exactly once per latch
    pub fn try_acquire(&self) -> bool {
        !self.attempted.swap(true, Ordering::SeqCst)
    }

    pub fn is_spent(&self) -> bool {
        self.attempted.load(Ordering::SeqCst)
    }

    /// Re-arm the latch
    pub fn reset(&self) {
        self.attempted.store(false, Ordering::SeqCst);
    }
}

impl Default for DownloadLatch {
    fn default() -> Self {
        Self::process()
    }
}

/// Fetches the text of a published catalog
pub trait CatalogFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

impl<F> CatalogFetcher for F
where
    F: Fn(&str) -> Result<String>,
{
    fn fetch(&self, url: &str) -> Result<String> {
        self(url)
    }
}

/// Blocking HTTP fetcher, one attempt, no retry
#[cfg(feature = "download")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: std::time::Duration,
}

#[cfg(feature = "download")]
impl HttpFetcher {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            timeout: std::time::Duration::from_secs(timeout_seconds),
        }
    }
}

#[cfg(feature = "download")]
impl CatalogFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("modcat/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
            .map_err(|e| CatalogError::Download(format!("failed to create HTTP client: {e}")))?;

        let response = client
            .get(url)
            .send()
            .map_err(|e| CatalogError::Download(format!("failed to fetch {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(CatalogError::Download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .text()
            .map_err(|e| CatalogError::Download(format!("failed to read response body: {e}")))
    }
}

/// Fetcher for builds without download support
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDownload;

impl CatalogFetcher for NoDownload {
    fn fetch(&self, _url: &str) -> Result<String> {
        Err(CatalogError::Download(
            "download support is not enabled. Rebuild with --features download".to_string(),
        ))
    }
}

/// Candidate locations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSources {
    pub maintainer: Option<PathBuf>,
    pub cached: Option<PathBuf>,
    pub bundled: Option<PathBuf>,
    pub download_url: Option<String>,
}

impl From<&ModcatConfig> for CatalogSources {
    fn from(config: &ModcatConfig) -> Self {
        Self {
            maintainer: config.local_catalog_path(),
            cached: config.cached_catalog_path(),
            bundled: config.bundled_catalog.clone(),
            download_url: config.download_url.clone(),
        }
    }
}

/// The activated catalog
#[derive(Debug, Clone)]
pub struct Selection {
    pub source: CatalogSource,
    pub catalog: Catalog,
    /// Set when a download URL is configured but an older source was used
    pub stale_warning: Option<String>,
}

#[derive(Debug)]
enum DownloadStatus {
    NotConfigured,
    Succeeded,
    Failed(String),
    Skipped(&'static str),
}

pub struct CatalogSelector<F> {
    sources: CatalogSources,
    fetcher: F,
    latch: DownloadLatch,
}

impl<F: CatalogFetcher> CatalogSelector<F> {
    pub fn new(sources: CatalogSources, fetcher: F, latch: DownloadLatch) -> Self {
        Self {
            sources,
            fetcher,
            latch,
        }
    }

    /// Load every available candidate and activate the best one
    pub fn select(&self) -> Result<Selection> {
        let mut candidates = Vec::new();
        let mut cached_version = None;

        for (source, path) in [
            (CatalogSource::Maintainer, &self.sources.maintainer),
            (CatalogSource::Cached, &self.sources.cached),
            (CatalogSource::Bundled, &self.sources.bundled),
        ] {
            let Some(path) = path else { continue };
            if !path.exists() {
                tracing::debug!("No {} catalog at {}", source, path.display());
                continue;
            }
            match Catalog::load(path) {
                Ok(catalog) => {
                    if source == CatalogSource::Cached {
                        cached_version = Some(catalog.version());
                    }
                    candidates.push(Candidate::new(source, catalog));
                }
                Err(e) => tracing::warn!("Failed to load {} catalog: {}", source, e),
            }
        }

        let status = match self.download(cached_version) {
            Ok(Some(catalog)) => {
                candidates.push(Candidate::new(CatalogSource::Downloaded, catalog));
                DownloadStatus::Succeeded
            }
            Ok(None) if self.sources.download_url.is_none() => DownloadStatus::NotConfigured,
            Ok(None) => DownloadStatus::Skipped("download already attempted in this process"),
            Err(e) => {
                tracing::warn!("Catalog download failed, falling back: {}", e);
                DownloadStatus::Failed(e.to_string())
            }
        };

        let chosen = select(candidates)?;
        tracing::info!(
            "Activated {} catalog version {}",
            chosen.source,
            chosen.catalog.version()
        );

        let stale_warning = match (&status, chosen.source) {
            (_, CatalogSource::Downloaded) => None,
            (DownloadStatus::Succeeded | DownloadStatus::NotConfigured, _) => None,
            (DownloadStatus::Failed(reason), source) => Some(format!(
                "using {} catalog version {}, download failed: {}",
                source,
                chosen.catalog.version(),
                reason
            )),
            (DownloadStatus::Skipped(reason), source) => Some(format!(
                "using {} catalog version {}, {}",
                source,
                chosen.catalog.version(),
                reason
            )),
        };

        Ok(Selection {
            source: chosen.source,
            catalog: chosen.catalog,
            stale_warning,
        })
    }

    /// One download attempt, guarded by the latch
    ///
    /// The download replaces the cache file only when it is activatable and
    /// strictly newer than what the cache already holds.
    fn download(&self, cached_version: Option<u32>) -> Result<Option<Catalog>> {
        let Some(url) = &self.sources.download_url else {
            return Ok(None);
        };
        if !self.latch.try_acquire() {
            tracing::debug!("Catalog download already attempted, skipping");
            return Ok(None);
        }

        tracing::debug!("Downloading catalog from {}", url);
        let content = self.fetcher.fetch(url)?;
        let catalog = Catalog::from_yaml(&content)?;

        if let Some(cache_path) = &self.sources.cached {
            match cached_version {
                _ if !catalog.is_valid() => {}
                Some(cached) if cached >= catalog.version() => tracing::debug!(
                    "Cache keeps version {}, downloaded version {} is not newer",
                    cached,
                    catalog.version()
                ),
                _ => {
                    if let Err(e) = catalog.save(cache_path) {
                        tracing::warn!("Failed to save downloaded catalog to cache: {}", e);
                    }
                }
            }
        }

        Ok(Some(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn catalog(version: u32) -> Catalog {
        Catalog::new().with_version(version, Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_highest_version_wins() {
        let chosen = select(vec![
            Candidate::new(CatalogSource::Maintainer, catalog(7)),
            Candidate::new(CatalogSource::Bundled, catalog(9)),
        ])
        .unwrap();
        assert_eq!(chosen.source, CatalogSource::Bundled);
        assert_eq!(chosen.catalog.version(), 9);
    }

    #[test]
    fn test_ties_follow_source_priority() {
        let chosen = select(vec![
            Candidate::new(CatalogSource::Bundled, catalog(4)),
            Candidate::new(CatalogSource::Cached, catalog(4)),
            Candidate::new(CatalogSource::Downloaded, catalog(4)),
        ])
        .unwrap();
        assert_eq!(chosen.source, CatalogSource::Downloaded);
    }

    #[test]
    fn test_sentinel_candidates_are_discarded() {
        let chosen = select(vec![
            Candidate::new(CatalogSource::Maintainer, Catalog::new()),
            Candidate::new(CatalogSource::Cached, catalog(1)),
        ])
        .unwrap();
        assert_eq!(chosen.source, CatalogSource::Cached);

        let err = select(vec![Candidate::new(CatalogSource::Bundled, catalog(0))]).unwrap_err();
        assert!(matches!(err, CatalogError::NoCatalogAvailable));
    }

    #[test]
    fn test_independent_latch_fires_once() {
        let latch = DownloadLatch::new();
        assert!(latch.try_acquire());
        assert!(!latch.try_acquire());
        assert!(latch.is_spent());
        latch.reset();
        assert!(latch.try_acquire());
    }
}
