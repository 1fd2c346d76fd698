//! Catalog entities and their partial-update patches
//!
//! Mods and authors are never replaced wholesale. Every change goes through
//! a [`ModPatch`] or [`AuthorPatch`] so identity and the accumulated change
//! notes survive, and so callers can see exactly which fields moved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::types::{CompatibilityStatus, DlcId, ExclusionCategory, ModId, ModStatus, Stability};

fn is_zero(id: &u64) -> bool {
    *id == 0
}

/// One add-on known to the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mod {
    pub id: ModId,

    pub name: String,

    /// Numeric author id, 0 when unknown
    #[serde(default, skip_serializing_if = "is_zero")]
    pub author_id: u64,

    /// Custom author handle, empty when unknown
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_handle: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_url: String,

    /// Application version the mod was last declared compatible with
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub compatible_app_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_dlcs: Vec<DlcId>,

    /// Required mods; group ids stand in for every member of the group
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_mods: Vec<ModId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successors: Vec<ModId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<ModId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<ModId>,

    #[serde(default)]
    pub stability: Stability,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stability_note: String,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub statuses: BTreeSet<ModStatus>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,

    /// Fields a maintainer froze against automatic changes
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclusions: BTreeSet<ExclusionKey>,

    /// Last manual review
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_date: Option<DateTime<Utc>>,

    /// Last change made by a reconciliation pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_review_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub change_notes: Vec<String>,
}

impl Mod {
    pub fn new(id: ModId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            author_id: 0,
            author_handle: String::new(),
            published: None,
            updated: None,
            source_url: String::new(),
            compatible_app_version: String::new(),
            required_dlcs: Vec::new(),
            required_mods: Vec::new(),
            successors: Vec::new(),
            alternatives: Vec::new(),
            recommendations: Vec::new(),
            stability: Stability::default(),
            stability_note: String::new(),
            statuses: BTreeSet::new(),
            note: String::new(),
            exclusions: BTreeSet::new(),
            review_date: None,
            auto_review_date: None,
            change_notes: Vec::new(),
        }
    }

    pub fn has_status(&self, status: ModStatus) -> bool {
        self.statuses.contains(&status)
    }

    /// Removed from or unlisted in the source
    pub fn is_hidden(&self) -> bool {
        self.statuses.iter().any(|s| s.hides_mod())
    }

    pub fn author_key(&self) -> Option<AuthorKey> {
        AuthorKey::from_parts(self.author_id, &self.author_handle)
    }

    /// Whether an exclusion freezes `category` (optionally for one list item)
    pub fn is_excluded(&self, category: ExclusionCategory, sub_item: Option<u64>) -> bool {
        self.exclusions.contains(&ExclusionKey { category, sub_item })
    }

    /// Apply a patch in place, returning the fields whose value changed
    pub fn apply_patch(&mut self, patch: &ModPatch) -> Vec<ModField> {
        let mut changed = Vec::new();

        macro_rules! set {
            ($field:ident, $kind:expr) => {
                if let Some(value) = &patch.$field {
                    if self.$field != *value {
                        self.$field = value.clone();
                        if !changed.contains(&$kind) {
                            changed.push($kind);
                        }
                    }
                }
            };
        }

        set!(name, ModField::Name);
        set!(author_id, ModField::Author);
        set!(author_handle, ModField::Author);
        set!(published, ModField::Published);
        set!(updated, ModField::Updated);
        set!(source_url, ModField::SourceUrl);
        set!(compatible_app_version, ModField::CompatibleAppVersion);
        set!(required_dlcs, ModField::RequiredDlcs);
        set!(required_mods, ModField::RequiredMods);
        set!(successors, ModField::Successors);
        set!(alternatives, ModField::Alternatives);
        set!(recommendations, ModField::Recommendations);
        set!(stability, ModField::Stability);
        set!(stability_note, ModField::StabilityNote);
        set!(note, ModField::Note);
        set!(review_date, ModField::ReviewDate);
        set!(auto_review_date, ModField::AutoReviewDate);

        let mut statuses_changed = false;
        for status in &patch.add_statuses {
            statuses_changed |= self.statuses.insert(*status);
        }
        for status in &patch.remove_statuses {
            statuses_changed |= self.statuses.remove(status);
        }
        if statuses_changed {
            changed.push(ModField::Statuses);
        }

        if let Some(note) = &patch.change_note {
            self.change_notes.push(note.clone());
        }

        changed
    }
}

/// Fields reported by [`Mod::apply_patch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModField {
    Name,
    Author,
    Published,
    Updated,
    SourceUrl,
    CompatibleAppVersion,
    RequiredDlcs,
    RequiredMods,
    Successors,
    Alternatives,
    Recommendations,
    Stability,
    StabilityNote,
    Statuses,
    Note,
    ReviewDate,
    AutoReviewDate,
}

/// Partial update of a [`Mod`]; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModPatch {
    pub name: Option<String>,
    pub author_id: Option<u64>,
    pub author_handle: Option<String>,
    pub published: Option<Option<DateTime<Utc>>>,
    pub updated: Option<Option<DateTime<Utc>>>,
    pub source_url: Option<String>,
    pub compatible_app_version: Option<String>,
    pub required_dlcs: Option<Vec<DlcId>>,
    pub required_mods: Option<Vec<ModId>>,
    pub successors: Option<Vec<ModId>>,
    pub alternatives: Option<Vec<ModId>>,
    pub recommendations: Option<Vec<ModId>>,
    pub stability: Option<Stability>,
    pub stability_note: Option<String>,
    pub note: Option<String>,
    pub review_date: Option<Option<DateTime<Utc>>>,
    pub auto_review_date: Option<Option<DateTime<Utc>>>,
    pub add_statuses: Vec<ModStatus>,
    pub remove_statuses: Vec<ModStatus>,
    pub change_note: Option<String>,
}

impl ModPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn author(mut self, id: u64, handle: impl Into<String>) -> Self {
        self.author_id = Some(id);
        self.author_handle = Some(handle.into());
        self
    }

    pub fn published(mut self, date: DateTime<Utc>) -> Self {
        self.published = Some(Some(date));
        self
    }

    pub fn updated(mut self, date: DateTime<Utc>) -> Self {
        self.updated = Some(Some(date));
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn compatible_app_version(mut self, version: impl Into<String>) -> Self {
        self.compatible_app_version = Some(version.into());
        self
    }

    pub fn required_dlcs(mut self, dlcs: Vec<DlcId>) -> Self {
        self.required_dlcs = Some(dlcs);
        self
    }

    pub fn required_mods(mut self, ids: Vec<ModId>) -> Self {
        self.required_mods = Some(ids);
        self
    }

    pub fn successors(mut self, ids: Vec<ModId>) -> Self {
        self.successors = Some(ids);
        self
    }

    pub fn alternatives(mut self, ids: Vec<ModId>) -> Self {
        self.alternatives = Some(ids);
        self
    }

    pub fn recommendations(mut self, ids: Vec<ModId>) -> Self {
        self.recommendations = Some(ids);
        self
    }

    pub fn stability(mut self, stability: Stability, note: impl Into<String>) -> Self {
        self.stability = Some(stability);
        self.stability_note = Some(note.into());
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn review_date(mut self, date: DateTime<Utc>) -> Self {
        self.review_date = Some(Some(date));
        self
    }

    pub fn auto_review_date(mut self, date: DateTime<Utc>) -> Self {
        self.auto_review_date = Some(Some(date));
        self
    }

    pub fn add_status(mut self, status: ModStatus) -> Self {
        self.add_statuses.push(status);
        self
    }

    pub fn remove_status(mut self, status: ModStatus) -> Self {
        self.remove_statuses.push(status);
        self
    }

    pub fn change_note(mut self, note: impl Into<String>) -> Self {
        self.change_note = Some(note.into());
        self
    }
}

/// Lookup key for an author: the numeric id when known, otherwise the handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AuthorKey {
    Id(u64),
    Handle(String),
}

impl AuthorKey {
    pub fn from_parts(id: u64, handle: &str) -> Option<Self> {
        if id != 0 {
            Some(AuthorKey::Id(id))
        } else if !handle.trim().is_empty() {
            Some(AuthorKey::Handle(handle.trim().to_string()))
        } else {
            None
        }
    }
}

impl fmt::Display for AuthorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorKey::Id(id) => write!(f, "{id}"),
            AuthorKey::Handle(handle) => f.write_str(handle),
        }
    }
}

/// A mod author
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub id: u64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub handle: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,

    #[serde(default)]
    pub retired: bool,

    /// Keeps a retired author retired even when new mods show up
    #[serde(default)]
    pub exclusion_for_retired: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub change_notes: Vec<String>,
}

impl Author {
    pub fn new(id: u64, handle: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            handle: handle.into().trim().to_string(),
            name: name.into(),
            last_seen: None,
            retired: false,
            exclusion_for_retired: false,
            change_notes: Vec::new(),
        }
    }

    pub fn key(&self) -> Option<AuthorKey> {
        AuthorKey::from_parts(self.id, &self.handle)
    }

    /// Name for change logs, falling back to the handle or id
    pub fn label(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else if !self.handle.is_empty() {
            self.handle.clone()
        } else {
            self.id.to_string()
        }
    }

    pub fn apply_patch(&mut self, patch: &AuthorPatch) -> Vec<AuthorField> {
        let mut changed = Vec::new();

        if let Some(id) = patch.id {
            if self.id != id {
                self.id = id;
                changed.push(AuthorField::Id);
            }
        }
        if let Some(handle) = &patch.handle {
            if self.handle != *handle {
                self.handle = handle.clone();
                changed.push(AuthorField::Handle);
            }
        }
        if let Some(name) = &patch.name {
            if self.name != *name {
                self.name = name.clone();
                changed.push(AuthorField::Name);
            }
        }
        if let Some(last_seen) = patch.last_seen {
            if self.last_seen != Some(last_seen) {
                self.last_seen = Some(last_seen);
                changed.push(AuthorField::LastSeen);
            }
        }
        if let Some(retired) = patch.retired {
            if self.retired != retired {
                self.retired = retired;
                changed.push(AuthorField::Retired);
            }
        }
        if let Some(exclusion) = patch.exclusion_for_retired {
            if self.exclusion_for_retired != exclusion {
                self.exclusion_for_retired = exclusion;
                changed.push(AuthorField::ExclusionForRetired);
            }
        }
        if let Some(note) = &patch.change_note {
            self.change_notes.push(note.clone());
        }

        changed
    }
}

/// Fields reported by [`Author::apply_patch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorField {
    Id,
    Handle,
    Name,
    LastSeen,
    Retired,
    ExclusionForRetired,
}

/// Partial update of an [`Author`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorPatch {
    pub id: Option<u64>,
    pub handle: Option<String>,
    pub name: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub retired: Option<bool>,
    pub exclusion_for_retired: Option<bool>,
    pub change_note: Option<String>,
}

impl AuthorPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into().trim().to_string());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn last_seen(mut self, date: DateTime<Utc>) -> Self {
        self.last_seen = Some(date);
        self
    }

    pub fn retired(mut self, retired: bool) -> Self {
        self.retired = Some(retired);
        self
    }

    pub fn exclusion_for_retired(mut self, exclusion: bool) -> Self {
        self.exclusion_for_retired = Some(exclusion);
        self
    }

    pub fn change_note(mut self, note: impl Into<String>) -> Self {
        self.change_note = Some(note.into());
        self
    }
}

/// A named set of interchangeable mods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: ModId,
    pub name: String,
    pub members: Vec<ModId>,
}

impl Group {
    pub fn new(id: ModId, name: impl Into<String>, members: Vec<ModId>) -> Self {
        Self {
            id,
            name: name.into(),
            members,
        }
    }

    pub fn contains(&self, id: ModId) -> bool {
        self.members.contains(&id)
    }
}

/// A directed statement about two mods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compatibility {
    pub first: ModId,
    pub second: ModId,
    pub status: CompatibilityStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl Compatibility {
    pub fn new(
        first: ModId,
        second: ModId,
        status: CompatibilityStatus,
        note: impl Into<String>,
    ) -> Self {
        Self {
            first,
            second,
            status,
            note: note.into(),
        }
    }
}

/// The part of an exclusion stored on the target mod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionKey {
    pub category: ExclusionCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_item: Option<u64>,
}

/// A manual override freezing one field of one mod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Exclusion {
    pub mod_id: ModId,
    pub category: ExclusionCategory,
    pub sub_item: Option<u64>,
}

impl Exclusion {
    pub fn new(mod_id: ModId, category: ExclusionCategory, sub_item: Option<u64>) -> Self {
        Self {
            mod_id,
            category,
            sub_item,
        }
    }

    pub fn key(&self) -> ExclusionKey {
        ExclusionKey {
            category: self.category,
            sub_item: self.sub_item,
        }
    }
}
