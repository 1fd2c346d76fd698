//! Collected records - untrusted facts harvested from the mod source
//!
//! A scraper produces a [`CollectedSet`]; the reconciliation pass merges it
//! into the catalog. Records from a listing page are shallow, records from a
//! detail page carry `details_checked` and are trusted for more fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::catalog::{Compatibility, DlcId, ModId, ModStatus};
use crate::error::{CatalogError, Result};

/// One mod as seen in the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectedMod {
    /// Source id; `None` for local and builtin mods
    pub id: Option<ModId>,

    /// Ships with the application
    pub builtin: bool,

    pub name: String,
    pub author_id: u64,
    pub author_handle: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub source_url: String,
    pub compatible_app_version: String,
    pub required_dlcs: Vec<DlcId>,
    pub required_mods: Vec<ModId>,
    pub statuses: BTreeSet<ModStatus>,

    /// The source tags this mod as incompatible with the current app version
    pub incompatible_tag: bool,

    /// Record comes from a full detail page rather than a listing
    pub details_checked: bool,
}

impl CollectedMod {
    pub fn new(id: ModId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            ..Self::default()
        }
    }

    /// A mod without a source id, matched by name
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            builtin: true,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_details(mut self) -> Self {
        self.details_checked = true;
        self
    }

    pub fn has_status(&self, status: ModStatus) -> bool {
        self.statuses.contains(&status)
    }
}

/// One author as seen in the source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectedAuthor {
    pub id: u64,
    pub handle: String,
    pub name: String,
    pub last_seen: Option<DateTime<Utc>>,
}

/// A set of mods the source declares interchangeable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectedGroup {
    pub name: String,
    pub members: Vec<ModId>,
}

/// Input of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectedSet {
    pub mods: Vec<CollectedMod>,
    pub authors: Vec<CollectedAuthor>,
    pub groups: Vec<CollectedGroup>,
    pub compatibilities: Vec<Compatibility>,

    /// Ids the source positively reported as removed
    pub confirmed_removed: BTreeSet<ModId>,
}

impl CollectedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
            && self.authors.is_empty()
            && self.groups.is_empty()
            && self.compatibilities.is_empty()
            && self.confirmed_removed.is_empty()
    }

    /// Whether a record in this set carries `id` explicitly
    pub fn mentions(&self, id: ModId) -> bool {
        self.mods.iter().any(|m| m.id == Some(id))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).map_err(|source| CatalogError::Parse {
            what: "collected set".to_string(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|source| CatalogError::Json {
            what: "collected set".to_string(),
            source,
        })
    }

    /// Load a collected set; `.json` files are read as JSON, anything else as YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let set = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        tracing::debug!(
            "Loaded {} collected mods and {} authors from {}",
            set.mods.len(),
            set.authors.len(),
            path.display()
        );
        Ok(set)
    }
}
