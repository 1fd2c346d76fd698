//! The catalog aggregate and its mutation primitives
//!
//! Entity lists are private. Every operation that can change a list also
//! updates the derived [`CatalogIndex`] in the same call, so the two never
//! drift apart. Expected conflicts come back as [`Violation`] values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::entities::{
    Author, AuthorField, AuthorKey, AuthorPatch, Compatibility, Group, Mod, ModField, ModPatch,
};
use super::index::CatalogIndex;
use super::types::ModId;
use crate::error::{CatalogError, Result, Violation};
use crate::ids;

/// Bumped on breaking changes to the persisted shape
pub const CURRENT_STRUCTURE_VERSION: u32 = 1;

/// Persisted shape of a catalog; indices are rebuilt on conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCatalog {
    pub structure_version: u32,
    pub version: u32,
    pub update_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub compatible_app_version: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub header_text: String,
    #[serde(default)]
    pub footer_text: String,
    #[serde(default)]
    pub mods: Vec<Mod>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub compatibilities: Vec<Compatibility>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub required_assets: Vec<ModId>,
}

/// A versioned catalog of mods, authors, groups and compatibilities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoredCatalog", into = "StoredCatalog")]
pub struct Catalog {
    structure_version: u32,
    version: u32,
    update_timestamp: DateTime<Utc>,

    /// Application version the catalog was reviewed against
    pub compatible_app_version: String,
    pub note: String,
    pub header_text: String,
    pub footer_text: String,

    pub(crate) mods: Vec<Mod>,
    pub(crate) groups: Vec<Group>,
    pub(crate) compatibilities: Vec<Compatibility>,
    pub(crate) authors: Vec<Author>,
    pub(crate) required_assets: Vec<ModId>,

    pub(crate) index: CatalogIndex,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            structure_version: CURRENT_STRUCTURE_VERSION,
            version: 0,
            update_timestamp: DateTime::<Utc>::MIN_UTC,
            compatible_app_version: String::new(),
            note: String::new(),
            header_text: String::new(),
            footer_text: String::new(),
            mods: Vec::new(),
            groups: Vec::new(),
            compatibilities: Vec::new(),
            authors: Vec::new(),
            required_assets: Vec::new(),
            index: CatalogIndex::default(),
        }
    }
}

impl From<StoredCatalog> for Catalog {
    fn from(stored: StoredCatalog) -> Self {
        let mut catalog = Catalog {
            structure_version: stored.structure_version,
            version: stored.version,
            update_timestamp: stored.update_timestamp,
            compatible_app_version: stored.compatible_app_version,
            note: stored.note,
            header_text: stored.header_text,
            footer_text: stored.footer_text,
            mods: stored.mods,
            groups: stored.groups,
            compatibilities: stored.compatibilities,
            authors: stored.authors,
            required_assets: stored.required_assets,
            index: CatalogIndex::default(),
        };
        catalog.create_index();
        catalog
    }
}

impl From<Catalog> for StoredCatalog {
    fn from(catalog: Catalog) -> Self {
        StoredCatalog {
            structure_version: catalog.structure_version,
            version: catalog.version,
            update_timestamp: catalog.update_timestamp,
            compatible_app_version: catalog.compatible_app_version,
            note: catalog.note,
            header_text: catalog.header_text,
            footer_text: catalog.footer_text,
            mods: catalog.mods,
            groups: catalog.groups,
            compatibilities: catalog.compatibilities,
            authors: catalog.authors,
            required_assets: catalog.required_assets,
        }
    }
}

/// Equality over persisted content; the derived index is ignored
impl PartialEq for Catalog {
    fn eq(&self, other: &Self) -> bool {
        self.structure_version == other.structure_version
            && self.version == other.version
            && self.update_timestamp == other.update_timestamp
            && self.compatible_app_version == other.compatible_app_version
            && self.note == other.note
            && self.header_text == other.header_text
            && self.footer_text == other.footer_text
            && self.mods == other.mods
            && self.groups == other.groups
            && self.compatibilities == other.compatibilities
            && self.authors == other.authors
            && self.required_assets == other.required_assets
    }
}

impl Catalog {
    /// An empty catalog; version 0 marks it as not yet published
    pub fn new() -> Self {
        Self::default()
    }

    /// Set version and timestamp, used when importing or seeding a catalog
    pub fn with_version(mut self, version: u32, update_timestamp: DateTime<Utc>) -> Self {
        self.version = version;
        self.update_timestamp = update_timestamp;
        self
    }

    pub fn structure_version(&self) -> u32 {
        self.structure_version
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn update_timestamp(&self) -> DateTime<Utc> {
        self.update_timestamp
    }

    /// Why this catalog cannot be activated, if it cannot
    ///
    /// Version 0 or a minimum timestamp is the "not a real catalog"
    /// sentinel; a newer structure version cannot be read safely.
    pub fn invalid_reason(&self) -> Option<String> {
        if self.version == 0 {
            Some("version is 0".to_string())
        } else if self.update_timestamp == DateTime::<Utc>::MIN_UTC {
            Some("update timestamp is not set".to_string())
        } else if self.structure_version > CURRENT_STRUCTURE_VERSION {
            Some(format!(
                "structure version {} is newer than supported version {}",
                self.structure_version, CURRENT_STRUCTURE_VERSION
            ))
        } else {
            None
        }
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_reason().is_none()
    }

    /// Publish the pending changes as a new version
    pub(crate) fn commit_version(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.update_timestamp = now;
        self.structure_version = CURRENT_STRUCTURE_VERSION;
        self.create_index();
    }

    /// Rebuild every derived index from the entity lists
    ///
    /// Idempotent. Returns the invariant violations found in the lists;
    /// offending entries stay in the lists but are left out of the index.
    pub fn create_index(&mut self) -> Vec<Violation> {
        let (index, violations) =
            CatalogIndex::build(&self.mods, &self.groups, &self.compatibilities, &self.authors);
        for violation in &violations {
            tracing::warn!("Catalog version {}: {}", self.version, violation);
        }
        self.index = index;
        violations
    }

    // ----- mods -----

    pub fn mods(&self) -> &[Mod] {
        &self.mods
    }

    pub fn mod_by_id(&self, id: ModId) -> Option<&Mod> {
        self.index.mods.get(&id).map(|pos| &self.mods[*pos])
    }

    pub fn contains_mod(&self, id: ModId) -> bool {
        self.index.mods.contains_key(&id)
    }

    /// Mods currently carrying an id in the given band
    pub fn mods_of_kind(&self, kind: ids::IdKind) -> impl Iterator<Item = &Mod> {
        self.mods.iter().filter(move |m| ids::classify(m.id) == kind)
    }

    pub fn add_mod(&mut self, m: Mod) -> std::result::Result<(), Violation> {
        if !ids::is_mod_id(m.id) {
            return Err(Violation::InvalidModId { id: m.id });
        }
        if self.contains_mod(m.id) {
            return Err(Violation::DuplicateMod { id: m.id });
        }

        self.index.mods.insert(m.id, self.mods.len());
        self.index.ids.observe(m.id);
        for required in &m.required_mods {
            self.index.add_needed_for(*required, m.id);
        }
        self.mods.push(m);
        Ok(())
    }

    /// Apply a partial update to one mod
    pub fn apply_patch(
        &mut self,
        id: ModId,
        patch: &ModPatch,
    ) -> std::result::Result<Vec<ModField>, Violation> {
        let pos = *self
            .index
            .mods
            .get(&id)
            .ok_or(Violation::UnknownMod { id })?;

        let old_required = self.mods[pos].required_mods.clone();
        let changed = self.mods[pos].apply_patch(patch);

        if changed.contains(&ModField::RequiredMods) {
            for required in old_required {
                self.index.remove_needed_for(required, id);
            }
            for required in self.mods[pos].required_mods.clone() {
                self.index.add_needed_for(required, id);
            }
        }

        Ok(changed)
    }

    /// Mods whose required list names `id` (a mod or a group)
    pub fn needed_for(&self, id: ModId) -> Vec<ModId> {
        self.index
            .needed_for
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    // ----- authors -----

    pub fn authors(&self) -> &[Author] {
        &self.authors
    }

    pub fn author(&self, key: &AuthorKey) -> Option<&Author> {
        self.author_position(key).map(|pos| &self.authors[pos])
    }

    /// Find an author by id first, then by handle
    pub fn find_author(&self, id: u64, handle: &str) -> Option<&Author> {
        self.find_author_position(id, handle)
            .map(|pos| &self.authors[pos])
    }

    pub(crate) fn find_author_position(&self, id: u64, handle: &str) -> Option<usize> {
        let by_id = (id != 0)
            .then(|| self.index.authors_by_id.get(&id).copied())
            .flatten();
        by_id.or_else(|| {
            let handle = handle.trim();
            (!handle.is_empty())
                .then(|| self.index.authors_by_handle.get(handle).copied())
                .flatten()
        })
    }

    fn author_position(&self, key: &AuthorKey) -> Option<usize> {
        match key {
            AuthorKey::Id(id) => self.index.authors_by_id.get(id).copied(),
            AuthorKey::Handle(handle) => self.index.authors_by_handle.get(handle).copied(),
        }
    }

    /// Add an author; its id and handle must not be indexed yet
    pub fn add_author(&mut self, mut author: Author) -> std::result::Result<(), Violation> {
        // Handles are indexed trimmed, the same way lookups trim them
        let trimmed = author.handle.trim();
        if trimmed.len() != author.handle.len() {
            author.handle = trimmed.to_string();
        }
        let key = author.key().ok_or(Violation::AuthorWithoutIdentity)?;

        if author.id != 0 && self.index.authors_by_id.contains_key(&author.id) {
            return Err(Violation::DuplicateAuthor { key: key.to_string() });
        }
        if !author.handle.is_empty() && self.index.authors_by_handle.contains_key(&author.handle)
        {
            return Err(Violation::DuplicateAuthor {
                key: author.handle.clone(),
            });
        }

        let pos = self.authors.len();
        if author.id != 0 {
            self.index.authors_by_id.insert(author.id, pos);
        }
        if !author.handle.is_empty() {
            self.index.authors_by_handle.insert(author.handle.clone(), pos);
        }
        self.authors.push(author);
        Ok(())
    }

    /// Apply a partial update to one author, keeping id/handle lookups unique
    pub fn apply_author_patch(
        &mut self,
        key: &AuthorKey,
        patch: &AuthorPatch,
    ) -> std::result::Result<Vec<AuthorField>, Violation> {
        let pos = self.author_position(key).ok_or_else(|| Violation::UnknownAuthor {
            key: key.to_string(),
        })?;

        if let Some(new_id) = patch.id {
            if new_id != 0
                && self
                    .index
                    .authors_by_id
                    .get(&new_id)
                    .is_some_and(|other| *other != pos)
            {
                return Err(Violation::DuplicateAuthor {
                    key: new_id.to_string(),
                });
            }
        }
        if let Some(new_handle) = &patch.handle {
            if !new_handle.is_empty()
                && self
                    .index
                    .authors_by_handle
                    .get(new_handle)
                    .is_some_and(|other| *other != pos)
            {
                return Err(Violation::DuplicateAuthor {
                    key: new_handle.clone(),
                });
            }
        }

        let old_id = self.authors[pos].id;
        let old_handle = self.authors[pos].handle.clone();
        let new_id = patch.id.unwrap_or(old_id);
        let new_handle = patch.handle.clone().unwrap_or_else(|| old_handle.clone());
        if AuthorKey::from_parts(new_id, &new_handle).is_none() {
            return Err(Violation::AuthorWithoutIdentity);
        }

        let changed = self.authors[pos].apply_patch(patch);

        if changed.contains(&AuthorField::Id) {
            if old_id != 0 {
                self.index.authors_by_id.remove(&old_id);
            }
            if new_id != 0 {
                self.index.authors_by_id.insert(new_id, pos);
            }
        }
        if changed.contains(&AuthorField::Handle) {
            if !old_handle.is_empty() {
                self.index.authors_by_handle.remove(&old_handle);
            }
            if !new_handle.is_empty() {
                self.index.authors_by_handle.insert(new_handle, pos);
            }
        }

        Ok(changed)
    }

    /// Authors with no mod that is still visible in the source
    pub fn authors_without_visible_mods(&self) -> Vec<AuthorKey> {
        let visible: BTreeSet<usize> = self
            .mods
            .iter()
            .filter(|m| !m.is_hidden())
            .filter_map(|m| self.find_author_position(m.author_id, &m.author_handle))
            .collect();

        self.authors
            .iter()
            .enumerate()
            .filter(|(pos, _)| !visible.contains(pos))
            .filter_map(|(_, a)| a.key())
            .collect()
    }

    // ----- required assets -----

    /// Ids known to be non-mod dependencies (assets)
    pub fn required_assets(&self) -> &[ModId] {
        &self.required_assets
    }

    pub fn is_required_asset(&self, id: ModId) -> bool {
        self.required_assets.contains(&id)
    }

    /// Returns false when the id was already listed
    pub fn add_required_asset(&mut self, id: ModId) -> bool {
        if self.is_required_asset(id) {
            return false;
        }
        self.required_assets.push(id);
        true
    }

    pub fn remove_required_asset(&mut self, id: ModId) -> bool {
        let before = self.required_assets.len();
        self.required_assets.retain(|a| *a != id);
        self.required_assets.len() != before
    }

    // ----- id allocation -----

    pub fn allocate_local_id(&mut self) -> Result<ModId> {
        self.index.ids.allocate_local()
    }

    pub fn allocate_unknown_builtin_id(&mut self) -> Result<ModId> {
        self.index.ids.allocate_unknown_builtin()
    }

    pub fn allocate_group_id(&mut self) -> Result<ModId> {
        self.index.ids.allocate_group()
    }

    /// Fail unless `id` is a known mod
    pub(crate) fn require_mod(&self, id: ModId) -> Result<&Mod> {
        self.mod_by_id(id)
            .ok_or_else(|| CatalogError::Invariant(Violation::UnknownMod { id }))
    }
}
