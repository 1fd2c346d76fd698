//! modcat configuration
//!
//! ## Configuration Sources (in precedence order)
//!
//! 1. A path given explicitly (CLI `--config`)
//! 2. `.modcat/config.yaml` - Project-level config
//! 3. `~/.config/modcat/config.yaml` - Global config
//! 4. Built-in defaults
//!
//! ```yaml
//! downloadUrl: https://example.org/catalog.yaml
//! bundledCatalog: data/catalog.yaml
//! changelogPath: changelog.txt
//! reconcile:
//!   clearMissingAuthorHandles: false
//!   retireUntouchedAuthors: true
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the cached copy of the last downloaded catalog
pub const CACHED_CATALOG_FILE: &str = "catalog.yaml";

/// File name of locally saved work when no maintainer catalog is configured
pub const LOCAL_CATALOG_FILE: &str = "local-catalog.yaml";

/// Project-level configuration directory
pub const PROJECT_CONFIG_DIR: &str = ".modcat";

const CONFIG_FILE: &str = "config.yaml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModcatConfig {
    /// Where to download the published catalog from
    #[serde(default)]
    pub download_url: Option<String>,

    /// Catalog shipped with the install
    #[serde(default)]
    pub bundled_catalog: Option<PathBuf>,

    /// Maintainer working copy, preferred on equal versions
    #[serde(default)]
    pub maintainer_catalog: Option<PathBuf>,

    /// Directory holding the cached download (platform cache dir if unset)
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Change log file, appended to after every new catalog version
    #[serde(default)]
    pub changelog_path: Option<PathBuf>,

    /// Timeout for the catalog download in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_seconds: u64,

    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl Default for ModcatConfig {
    fn default() -> Self {
        Self {
            download_url: None,
            bundled_catalog: None,
            maintainer_catalog: None,
            cache_dir: None,
            changelog_path: None,
            download_timeout_seconds: default_download_timeout(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

fn default_download_timeout() -> u64 {
    30
}

/// Policy switches for the reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileConfig {
    /// Clear a stored author handle when the source no longer shows one
    #[serde(default)]
    pub clear_missing_author_handles: bool,

    /// Retire authors that no collected mod referenced in a pass
    #[serde(default = "default_retire_untouched_authors")]
    pub retire_untouched_authors: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            clear_missing_author_handles: false,
            retire_untouched_authors: default_retire_untouched_authors(),
        }
    }
}

fn default_retire_untouched_authors() -> bool {
    true
}

impl ModcatConfig {
    /// Resolve configuration by precedence
    ///
    /// An explicit path must exist and parse. Project and global files are
    /// optional; an unreadable one is logged and skipped.
    pub fn load(explicit: Option<&Path>, project_root: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }

        let project = project_root.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE);
        let global = Self::global_config_dir().map(|dir| dir.join(CONFIG_FILE));

        for candidate in std::iter::once(project).chain(global) {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_path(&candidate) {
                Ok(config) => {
                    tracing::debug!("Using config from {}", candidate.display());
                    return Ok(config.resolved_against(project_root, &candidate));
                }
                Err(e) => tracing::warn!("Ignoring config {}: {:#}", candidate.display(), e),
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load a configuration file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Relative paths in a project config are relative to the project root
    fn resolved_against(mut self, project_root: &Path, config_path: &Path) -> Self {
        if !config_path.starts_with(project_root) {
            return self;
        }
        for path in [
            &mut self.bundled_catalog,
            &mut self.maintainer_catalog,
            &mut self.cache_dir,
            &mut self.changelog_path,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = project_root.join(&*path);
            }
        }
        self
    }

    /// Global configuration directory
    pub fn global_config_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "modcat", "modcat")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .or_else(|| dirs::config_dir().map(|d| d.join("modcat")))
    }

    /// Cache directory, falling back to the platform cache location
    pub fn effective_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir.clone().or_else(|| {
            directories::ProjectDirs::from("org", "modcat", "modcat")
                .map(|dirs| dirs.cache_dir().to_path_buf())
                .or_else(|| dirs::cache_dir().map(|d| d.join("modcat")))
        })
    }

    /// Location of the cached download
    pub fn cached_catalog_path(&self) -> Option<PathBuf> {
        self.effective_cache_dir()
            .map(|dir| dir.join(CACHED_CATALOG_FILE))
    }

    /// Where locally reconciled or edited catalogs live
    ///
    /// The maintainer catalog when configured, otherwise a file next to the
    /// cache. Never the cached download itself, which a later download may
    /// replace.
    pub fn local_catalog_path(&self) -> Option<PathBuf> {
        self.maintainer_catalog.clone().or_else(|| {
            self.effective_cache_dir()
                .map(|dir| dir.join(LOCAL_CATALOG_FILE))
        })
    }
}
