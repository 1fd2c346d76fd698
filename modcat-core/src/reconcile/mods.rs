//! Mod, group and compatibility rules of a pass

use std::collections::BTreeSet;

use super::{Entity, Pass, Section};
use crate::catalog::{ExclusionCategory, Group, Mod, ModId, ModPatch, ModStatus, Stability};
use crate::collect::{CollectedGroup, CollectedMod};
use crate::error::{CatalogError, ErrorKind, Result, Violation};
use crate::ids::{self, IdKind};

/// Patch and change phrases computed for one collected record
#[derive(Debug, Default)]
struct ModDiff {
    patch: ModPatch,
    phrases: Vec<String>,
    /// Required ids dropped from the mod's list
    dropped_required: Vec<ModId>,
    /// Required ids that are neither mods nor groups
    new_assets: Vec<ModId>,
}

impl ModDiff {
    fn phrase(&mut self, phrase: impl Into<String>) {
        self.phrases.push(phrase.into());
    }
}

/// Merge a collected list into a stored one
///
/// Frozen items keep their current presence. Returns (merged, added, removed).
fn merge_list<T: Copy + PartialEq>(
    current: &[T],
    collected: &[T],
    frozen: impl Fn(T) -> bool,
) -> (Vec<T>, Vec<T>, Vec<T>) {
    let mut merged = Vec::with_capacity(collected.len());
    let mut removed = Vec::new();
    for item in current {
        if merged.contains(item) {
            continue;
        }
        if collected.contains(item) || frozen(*item) {
            merged.push(*item);
        } else {
            removed.push(*item);
        }
    }

    let mut added = Vec::new();
    for item in collected {
        if !merged.contains(item) && !frozen(*item) {
            merged.push(*item);
            added.push(*item);
        }
    }
    (merged, added, removed)
}

impl<'a> Pass<'a> {
    /// Add collected groups, returning proposals to retry once mods are in
    pub(super) fn add_groups(
        &mut self,
        proposals: &[&'a CollectedGroup],
        defer_unknown: bool,
    ) -> Vec<&'a CollectedGroup> {
        let mut deferred = Vec::new();
        for proposal in proposals {
            match self.add_group(proposal) {
                Ok(()) => {}
                Err(CatalogError::Invariant(Violation::UnknownMod { .. })) if defer_unknown => {
                    deferred.push(*proposal);
                }
                Err(e) => self.skip_record(&format!("group '{}'", proposal.name), &e),
            }
        }
        deferred
    }

    fn add_group(&mut self, proposal: &CollectedGroup) -> Result<()> {
        let wanted: BTreeSet<ModId> = proposal.members.iter().copied().collect();
        if let Some(existing) = self
            .catalog
            .groups()
            .iter()
            .find(|g| g.members.iter().copied().collect::<BTreeSet<_>>() == wanted)
        {
            tracing::debug!(
                "Group '{}' matches existing group {}, skipping",
                proposal.name,
                existing.id
            );
            return Ok(());
        }

        if let Some(unknown) = proposal
            .members
            .iter()
            .find(|id| !ids::is_group_id(**id) && !self.catalog.contains_mod(**id))
        {
            return Err(Violation::UnknownMod { id: *unknown }.into());
        }

        let members = self.catalog.check_group_members(&proposal.members)?;
        let id = self.catalog.allocate_group_id()?;
        let rewritten = self
            .catalog
            .add_group(Group::new(id, proposal.name.trim(), members))?;

        let subject = self.subject(id);
        self.log.added(Entity::Group, subject);
        for mod_id in rewritten {
            self.note_mod(
                Section::Updated,
                mod_id,
                vec![format!("required mods now use group {id}")],
            );
        }
        Ok(())
    }

    /// Merge one collected mod record
    pub(super) fn reconcile_mod(&mut self, record: &CollectedMod) {
        let id = match self.resolve_id(record) {
            Ok(id) => id,
            Err(e) => {
                self.skip_record(&format!("mod '{}'", record.name), &e);
                return;
            }
        };
        self.observed.insert(id);

        if !self.catalog.contains_mod(id) {
            self.add_new_mod(id, record);
            return;
        }

        let diff = match self.catalog.mod_by_id(id) {
            Some(current) => self.diff(current, record),
            None => return,
        };
        if diff.phrases.is_empty() && diff.new_assets.is_empty() {
            return;
        }
        self.apply_diff(id, diff, Section::Updated);
    }

    fn add_new_mod(&mut self, id: ModId, record: &CollectedMod) {
        if let Err(e) = self.catalog.add_mod(Mod::new(id, record.name.trim())) {
            self.skip_record(&format!("mod {id}"), &e.into());
            return;
        }
        if self.catalog.remove_required_asset(id) {
            self.log
                .removed(Entity::RequiredAsset, id.to_string(), "now a known mod");
        }

        let diff = match self.catalog.mod_by_id(id) {
            Some(fresh) => self.diff(fresh, record),
            None => return,
        };
        let subject = self.subject(id);
        self.log.added(Entity::Mod, subject);
        self.mod_notes
            .entry(id)
            .or_default()
            .push("added".to_string());
        self.apply_diff(id, ModDiff { phrases: Vec::new(), ..diff }, Section::Added);
    }

    fn apply_diff(&mut self, id: ModId, diff: ModDiff, section: Section) {
        for asset in &diff.new_assets {
            if self.catalog.add_required_asset(*asset) {
                tracing::debug!("Required id {} is not a mod, recording it as an asset", asset);
                self.log.added(Entity::RequiredAsset, asset.to_string());
            }
        }

        if !diff.patch.is_empty() {
            if let Err(e) = self.catalog.apply_patch(id, &diff.patch) {
                self.skip_record(&format!("mod {id}"), &e.into());
                return;
            }
        }
        if !diff.phrases.is_empty() {
            self.note_mod(section, id, diff.phrases);
        }

        for dropped in diff.dropped_required {
            if self.catalog.needed_for(dropped).is_empty() {
                tracing::info!("{} is no longer required by any mod", dropped);
                let entity = if ids::is_group_id(dropped) {
                    Entity::Group
                } else {
                    Entity::Mod
                };
                let subject = self.subject(dropped);
                self.log
                    .updated(entity, subject, "no longer required by any mod");
            }
        }
    }

    /// Pick the catalog id for a collected record
    fn resolve_id(&mut self, record: &CollectedMod) -> Result<ModId> {
        if let Some(id) = record.id {
            if !ids::is_mod_id(id) {
                return Err(CatalogError::invalid(format!(
                    "id {id} of '{}' is not a mod id",
                    record.name
                )));
            }
            return Ok(id);
        }

        let name = record.name.trim();
        if name.is_empty() {
            return Err(CatalogError::invalid("record has neither an id nor a name"));
        }

        if record.builtin {
            if let Some(id) = ids::builtin_id(name) {
                return Ok(id);
            }
            if let Some(existing) = self
                .catalog
                .mods_of_kind(IdKind::Builtin)
                .find(|m| m.name == name)
            {
                return Ok(existing.id);
            }
            return self.catalog.allocate_unknown_builtin_id();
        }

        if let Some(existing) = self
            .catalog
            .mods_of_kind(IdKind::Local)
            .find(|m| m.name == name)
        {
            return Ok(existing.id);
        }
        self.catalog.allocate_local_id()
    }

    /// Field-by-field comparison of a stored mod with a collected record
    fn diff(&self, current: &Mod, record: &CollectedMod) -> ModDiff {
        let mut diff = ModDiff::default();

        let name = record.name.trim();
        if !name.is_empty() && name != current.name {
            diff.patch.name = Some(name.to_string());
            diff.phrase("name changed");
        }

        self.diff_author(current, record, &mut diff);

        if let Some(updated) = record.updated {
            if current.updated.map_or(true, |stored| updated > stored) {
                diff.patch.updated = Some(Some(updated));
                diff.phrase("new update");
            }
        }

        if record.details_checked {
            self.diff_details(current, record, &mut diff);
        }

        self.diff_statuses(current, record, &mut diff);
        diff
    }

    fn diff_author(&self, current: &Mod, record: &CollectedMod, diff: &mut ModDiff) {
        if record.author_id != 0 && record.author_id != current.author_id {
            diff.patch.author_id = Some(record.author_id);
            diff.phrase("author id changed");
        }

        let handle = record.author_handle.trim();
        if !handle.is_empty() && handle != current.author_handle {
            diff.patch.author_handle = Some(handle.to_string());
            diff.phrase("author handle changed");
        } else if handle.is_empty()
            && !current.author_handle.is_empty()
            && record.details_checked
            && self.config.clear_missing_author_handles
            && (record.author_id != 0 || current.author_id != 0)
        {
            diff.patch.author_handle = Some(String::new());
            diff.phrase("author handle removed");
        }
    }

    /// Fields only a detail-page record is trusted for
    fn diff_details(&self, current: &Mod, record: &CollectedMod, diff: &mut ModDiff) {
        if let Some(published) = record.published {
            if current.published.map_or(true, |stored| published > stored) {
                diff.patch.published = Some(Some(published));
                diff.phrase("published date set");
            }
        }

        let source_url = record.source_url.trim();
        if !source_url.is_empty()
            && source_url != current.source_url
            && !current.is_excluded(ExclusionCategory::SourceUrl, None)
        {
            diff.patch.source_url = Some(source_url.to_string());
            diff.phrase(if current.source_url.is_empty() {
                "source URL added"
            } else {
                "source URL changed"
            });
        }

        let app_version = record.compatible_app_version.trim();
        if !app_version.is_empty()
            && app_version != current.compatible_app_version
            && !current.is_excluded(ExclusionCategory::CompatibleAppVersion, None)
        {
            diff.patch.compatible_app_version = Some(app_version.to_string());
            diff.phrase(format!("compatible app version {app_version}"));
        }

        let (dlcs, added, removed) =
            merge_list(&current.required_dlcs, &record.required_dlcs, |dlc| {
                current.is_excluded(ExclusionCategory::RequiredDlc, Some(u64::from(dlc)))
            });
        if dlcs != current.required_dlcs {
            diff.patch.required_dlcs = Some(dlcs);
            for dlc in added {
                diff.phrase(format!("required DLC {dlc} added"));
            }
            for dlc in removed {
                diff.phrase(format!("required DLC {dlc} removed"));
            }
        }

        self.diff_required_mods(current, record, diff);

        let tagged = current.stability == Stability::IncompatibleAccordingToSource;
        if record.incompatible_tag && !tagged {
            diff.patch.stability = Some(Stability::IncompatibleAccordingToSource);
            diff.patch.stability_note = Some(String::new());
            diff.phrase("stability IncompatibleAccordingToSource");
        } else if !record.incompatible_tag && tagged {
            diff.patch.stability = Some(Stability::NotReviewed);
            diff.patch.stability_note = Some(String::new());
            diff.phrase("incompatible tag removed");
        }
    }

    fn diff_required_mods(&self, current: &Mod, record: &CollectedMod, diff: &mut ModDiff) {
        let mut wanted = Vec::new();
        for required in self.catalog.substitute_required(&record.required_mods) {
            if required == current.id {
                continue;
            }
            let known = self.catalog.contains_mod(required)
                || self.catalog.group(required).is_some()
                || self.collected.mentions(required);
            if known {
                wanted.push(required);
            } else if !self.catalog.is_required_asset(required)
                && !diff.new_assets.contains(&required)
            {
                diff.new_assets.push(required);
            }
        }

        let stored = self.catalog.substitute_required(&current.required_mods);
        let (required, added, removed) = merge_list(&stored, &wanted, |id| {
            current.is_excluded(ExclusionCategory::RequiredMod, Some(id))
        });
        if required != current.required_mods {
            diff.patch.required_mods = Some(required);
            for id in added {
                diff.phrase(format!("required mod {id} added"));
            }
            for id in &removed {
                diff.phrase(format!("required mod {id} removed"));
            }
            diff.dropped_required = removed;
        }
    }

    fn diff_statuses(&self, current: &Mod, record: &CollectedMod, diff: &mut ModDiff) {
        for status in ModStatus::ALL.into_iter().filter(|s| s.is_auto_managed()) {
            if status.needs_details() && !record.details_checked {
                continue;
            }
            if status
                .exclusion_category()
                .is_some_and(|category| current.is_excluded(category, None))
            {
                continue;
            }

            match (record.has_status(status), current.has_status(status)) {
                (true, false) => {
                    diff.patch.add_statuses.push(status);
                    diff.phrase(format!("status {status} added"));
                }
                (false, true) => {
                    diff.patch.remove_statuses.push(status);
                    diff.phrase(format!("status {status} removed"));
                }
                _ => {}
            }
        }

        if current.has_status(ModStatus::RemovedFromSource) {
            diff.patch.remove_statuses.push(ModStatus::RemovedFromSource);
            diff.phrase("back in source");
        }

        if current.has_status(ModStatus::SourceUnavailable)
            && record.details_checked
            && !record.source_url.trim().is_empty()
            && !current.is_excluded(ExclusionCategory::SourceUnavailable, None)
        {
            diff.patch.remove_statuses.push(ModStatus::SourceUnavailable);
            diff.phrase("source available again");
        }
    }

    /// Real mods missing from the collected set
    pub(super) fn mark_absent_mods(&mut self) {
        let absent: Vec<ModId> = self
            .catalog
            .mods_of_kind(IdKind::Real)
            .filter(|m| !self.observed.contains(&m.id))
            .filter(|m| !m.has_status(ModStatus::RemovedFromSource))
            .map(|m| m.id)
            .collect();

        for id in absent {
            let confirmed = self.collected.confirmed_removed.contains(&id);
            if !confirmed {
                let unlisted = self
                    .catalog
                    .mod_by_id(id)
                    .is_some_and(|m| m.has_status(ModStatus::UnlistedInSource));
                if unlisted {
                    tracing::debug!("Mod {} is absent but unlisted, leaving it as is", id);
                    continue;
                }
                tracing::debug!(
                    "Mod {} is absent without a removal report, marking it removed provisionally",
                    id
                );
            }

            let patch = ModPatch::new().add_status(ModStatus::RemovedFromSource);
            match self.catalog.apply_patch(id, &patch) {
                Ok(_) => self.note_mod(
                    Section::Removed,
                    id,
                    vec!["removed from source".to_string()],
                ),
                Err(e) => self.skip_record(&format!("mod {id}"), &e.into()),
            }
        }
    }

    pub(super) fn reconcile_compatibilities(&mut self) {
        let collected = self.collected;

        for compat in &collected.compatibilities {
            let subject = format!("{} -> {}", compat.first, compat.second);

            let existing_note = self
                .catalog
                .compatibility(compat.first, compat.second)
                .map(|c| c.note.clone());
            let result = match existing_note {
                Some(note) => {
                    let note = if compat.note.is_empty() {
                        note
                    } else {
                        compat.note.clone()
                    };
                    self.catalog
                        .update_compatibility(compat.first, compat.second, compat.status, &note)
                        .map(|changed| {
                            if changed {
                                self.log.updated(
                                    Entity::Compatibility,
                                    subject.clone(),
                                    compat.status.to_string(),
                                );
                            }
                        })
                }
                None => self.catalog.add_compatibility(compat.clone()).map(|()| {
                    self.log.record(
                        Section::Added,
                        Entity::Compatibility,
                        subject.clone(),
                        Some(compat.status.to_string()),
                    );
                }),
            };

            if let Err(e) = result {
                self.skip_record(&format!("compatibility {subject}"), &e.into());
            }
        }
    }

    /// Log a rejected record at the level its error kind calls for
    pub(super) fn skip_record(&self, what: &str, error: &CatalogError) {
        match error.kind() {
            ErrorKind::ResourceExhausted => {
                tracing::error!("Skipping {}: {}", what, error)
            }
            _ => tracing::warn!("Skipping {}: {}", what, error),
        }
    }
}
