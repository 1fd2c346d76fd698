//! Active catalog session
//!
//! Owns the activated catalog for the lifetime of one run. Every change,
//! whether from a reconciliation pass or manual rows, goes through the
//! session so that versions are committed and the change log is appended
//! in one place.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::collect::CollectedSet;
use crate::config::ModcatConfig;
use crate::error::{CatalogError, Result};
use crate::manual::{apply_manual_rows, ManualReport, ManualRow};
use crate::reconcile::{reconcile, ChangeLog, ReconcileOutcome};
use crate::selector::{CatalogFetcher, CatalogSelector, CatalogSource, CatalogSources, DownloadLatch};

pub struct CatalogSession {
    config: ModcatConfig,
    source: CatalogSource,
    catalog: Catalog,
    stale_warning: Option<String>,
    dirty: bool,
}

impl CatalogSession {
    /// Select and activate a catalog
    pub fn open<F: CatalogFetcher>(
        config: ModcatConfig,
        fetcher: F,
        latch: DownloadLatch,
    ) -> Result<Self> {
        let selection =
            CatalogSelector::new(CatalogSources::from(&config), fetcher, latch).select()?;
        if let Some(warning) = &selection.stale_warning {
            tracing::warn!("{}", warning);
        }
        Ok(Self {
            config,
            source: selection.source,
            catalog: selection.catalog,
            stale_warning: selection.stale_warning,
            dirty: false,
        })
    }

    /// Session over an already loaded catalog
    pub fn with_catalog(config: ModcatConfig, source: CatalogSource, catalog: Catalog) -> Self {
        Self {
            config,
            source,
            catalog,
            stale_warning: None,
            dirty: false,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Direct access for edits that bypass the change log
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        self.dirty = true;
        &mut self.catalog
    }

    pub fn source(&self) -> CatalogSource {
        self.source
    }

    pub fn stale_warning(&self) -> Option<&str> {
        self.stale_warning.as_deref()
    }

    pub fn config(&self) -> &ModcatConfig {
        &self.config
    }

    /// Unsaved changes pending
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Merge a collected set into the active catalog
    pub fn reconcile(
        &mut self,
        collected: &CollectedSet,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let outcome = reconcile(&mut self.catalog, collected, &self.config.reconcile, now);
        self.record(&outcome)?;
        Ok(outcome)
    }

    /// Apply maintainer rows; the version moves when any row changed something
    pub fn apply_manual(
        &mut self,
        rows: &[ManualRow],
        now: DateTime<Utc>,
    ) -> Result<(ManualReport, ReconcileOutcome)> {
        let mut log = ChangeLog::new();
        let report = apply_manual_rows(&mut self.catalog, rows, &mut log, now);

        let outcome = if log.is_empty() {
            ReconcileOutcome::NoOp
        } else {
            self.catalog.commit_version(now);
            tracing::info!(
                "Manual changes committed as catalog version {}",
                self.catalog.version()
            );
            ReconcileOutcome::Updated {
                version: self.catalog.version(),
                timestamp: self.catalog.update_timestamp(),
                change_log: log,
            }
        };
        self.record(&outcome)?;
        Ok((report, outcome))
    }

    fn record(&mut self, outcome: &ReconcileOutcome) -> Result<()> {
        let ReconcileOutcome::Updated {
            version,
            timestamp,
            change_log,
        } = outcome
        else {
            return Ok(());
        };
        self.dirty = true;
        if let Some(path) = &self.config.changelog_path {
            change_log.append_to_file(path, *version, *timestamp)?;
            tracing::debug!("Appended version {} to {}", version, path.display());
        }
        Ok(())
    }

    /// Where `save(None)` writes: the maintainer catalog, else the local
    /// catalog beside the cache
    pub fn default_save_path(&self) -> Option<PathBuf> {
        self.config.local_catalog_path()
    }

    /// Persist the active catalog
    pub fn save(&mut self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.default_save_path().ok_or_else(|| {
                CatalogError::invalid("no catalog path configured to save to")
            })?,
        };
        self.catalog.save(&path)?;
        self.dirty = false;
        tracing::info!(
            "Saved catalog version {} to {}",
            self.catalog.version(),
            path.display()
        );
        Ok(path)
    }

    /// End the session, handing back the catalog
    pub fn close(self) -> Catalog {
        if self.dirty {
            tracing::warn!(
                "Closing session with unsaved changes (catalog version {})",
                self.catalog.version()
            );
        }
        self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Mod;
    use crate::manual::ManualCategory;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 8, 0, 0).unwrap()
    }

    fn session(dir: &Path) -> CatalogSession {
        let mut catalog =
            Catalog::new().with_version(3, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        catalog.add_mod(Mod::new(2_000_001, "Traffic")).unwrap();
        let config = ModcatConfig {
            changelog_path: Some(dir.join("changes.txt")),
            ..ModcatConfig::default()
        };
        CatalogSession::with_catalog(config, CatalogSource::Maintainer, catalog)
    }

    #[test]
    fn test_manual_rows_commit_a_version() {
        let dir = TempDir::new().unwrap();
        let mut session = session(dir.path());
        let rows = vec![ManualRow::new(ManualCategory::Mod, "set_note", 2_000_001).arg("checked")];

        let (report, outcome) = session.apply_manual(&rows, now()).unwrap();

        assert_eq!(report.applied, 1);
        assert!(!outcome.is_noop());
        assert_eq!(session.catalog().version(), 4);
        assert_eq!(session.catalog().update_timestamp(), now());
        assert!(session.is_dirty());

        let text = std::fs::read_to_string(dir.path().join("changes.txt")).unwrap();
        assert!(text.starts_with("Catalog version 4, 2026-10-19 08:00:00 UTC"));
    }

    #[test]
    fn test_failed_rows_leave_version_alone() {
        let dir = TempDir::new().unwrap();
        let mut session = session(dir.path());
        let rows = vec![ManualRow::new(ManualCategory::Mod, "set_note", 42).arg("nope")];

        let (report, outcome) = session.apply_manual(&rows, now()).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(outcome.is_noop());
        assert_eq!(session.catalog().version(), 3);
        assert!(!dir.path().join("changes.txt").exists());
    }

    #[test]
    fn test_save_without_path_needs_config() {
        let dir = TempDir::new().unwrap();
        let mut session = session(dir.path());
        session.config.cache_dir = None;
        session.config.maintainer_catalog = Some(dir.path().join("maintainer.yaml"));

        let saved = session.save(None).unwrap();
        assert_eq!(saved, dir.path().join("maintainer.yaml"));
        assert!(!session.is_dirty());

        let catalog = session.close();
        assert_eq!(Catalog::load(&saved).unwrap(), catalog);
    }

    #[test]
    fn test_save_without_maintainer_keeps_cache_intact() {
        let dir = TempDir::new().unwrap();
        let mut session = session(dir.path());
        session.config.cache_dir = Some(dir.path().join("cache"));

        let saved = session.save(None).unwrap();

        assert_eq!(saved, dir.path().join("cache").join(crate::config::LOCAL_CATALOG_FILE));
        assert_ne!(Some(saved), session.config.cached_catalog_path());
        assert!(!dir.path().join("cache").join(crate::config::CACHED_CATALOG_FILE).exists());
    }
}
