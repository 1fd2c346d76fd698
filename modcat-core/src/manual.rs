//! Manual overrides entered by catalog maintainers
//!
//! A row names a category, a command, a target id and free-form payload.
//! Rows marked `is_exclusion` additionally freeze the edited field against
//! later reconciliation passes.
//!
//! | category      | command                 | payload                       |
//! |---------------|-------------------------|-------------------------------|
//! | mod           | add                     | name (target 0 allocates)     |
//! | mod           | set_stability           | stability, note...            |
//! | mod           | set_note                | note...                       |
//! | mod           | set_source_url          | url                           |
//! | mod           | set_app_version         | version                       |
//! | mod           | add/remove_required_mod | mod or group id               |
//! | mod           | add/remove_required_dlc | dlc id                        |
//! | mod           | add/remove_successor    | mod id                        |
//! | mod           | add/remove_alternative  | mod id                        |
//! | mod           | add/remove_recommendation | mod id                      |
//! | mod           | add/remove_status       | status                        |
//! | mod           | add/remove_exclusion    | category, sub item            |
//! | mod           | review                  |                               |
//! | author        | add                     | name, handle                  |
//! | author        | rename                  | name...                       |
//! | author        | set_handle / set_id     | handle / id                   |
//! | author        | retire / unretire       |                               |
//! | group         | add                     | name, member ids...           |
//! | group         | add/remove_member       | mod id                        |
//! | group         | remove                  |                               |
//! | compatibility | add / update            | second id, status, note...    |
//! | compatibility | remove                  | second id                     |
//! | catalog       | set_note / set_header / set_footer / set_app_version | text |
//! | catalog       | add/remove_required_asset |                             |
//! | catalog       | retire_orphaned_authors |                               |
//!
//! Author rows target an author id; with target 0 the first payload item is
//! the author handle instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use crate::catalog::{
    Author, AuthorKey, AuthorPatch, Catalog, Compatibility, CompatibilityStatus, DlcId, Exclusion,
    ExclusionCategory, Group, Mod, ModId, ModPatch, ModStatus, Stability,
};
use crate::error::{CatalogError, Result};
use crate::reconcile::{ChangeLog, Entity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualCategory {
    Mod,
    Author,
    Group,
    Compatibility,
    Catalog,
}

/// One parsed maintainer instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualRow {
    pub category: ManualCategory,
    pub command: String,
    #[serde(default)]
    pub is_exclusion: bool,
    #[serde(default)]
    pub target: u64,
    #[serde(default)]
    pub payload: Vec<String>,
}

impl ManualRow {
    pub fn new(category: ManualCategory, command: impl Into<String>, target: u64) -> Self {
        Self {
            category,
            command: command.into(),
            is_exclusion: false,
            target,
            payload: Vec::new(),
        }
    }

    pub fn arg(mut self, value: impl ToString) -> Self {
        self.payload.push(value.to_string());
        self
    }

    pub fn exclusion(mut self) -> Self {
        self.is_exclusion = true;
        self
    }

    pub fn from_yaml(content: &str) -> Result<Vec<ManualRow>> {
        serde_yaml_ng::from_str(content).map_err(|source| CatalogError::Parse {
            what: "manual rows".to_string(),
            source,
        })
    }

    pub fn load_all(path: &Path) -> Result<Vec<ManualRow>> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    fn arg_at(&self, index: usize, what: &str) -> Result<&str> {
        self.payload
            .get(index)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CatalogError::invalid(format!("'{}' is missing its {}", self.command, what))
            })
    }

    fn parse_at<T>(&self, index: usize, what: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.arg_at(index, what)?;
        raw.parse()
            .map_err(|e| CatalogError::invalid(format!("bad {what} '{raw}': {e}")))
    }

    /// Payload from `index` on, joined into one text
    fn text_from(&self, index: usize) -> String {
        self.payload
            .get(index..)
            .map(|rest| rest.join(" "))
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn unknown_command(&self) -> CatalogError {
        CatalogError::invalid(format!(
            "unknown {:?} command '{}'",
            self.category, self.command
        ))
    }
}

/// Outcome of applying a batch of rows
#[derive(Debug, Default)]
pub struct ManualReport {
    pub applied: usize,
    /// Row index and the reason it was skipped
    pub failed: Vec<(usize, CatalogError)>,
}

/// Apply one row; `now` dates change notes and reviews
pub fn apply_manual_row(
    catalog: &mut Catalog,
    row: &ManualRow,
    log: &mut ChangeLog,
    now: DateTime<Utc>,
) -> Result<()> {
    match row.category {
        ManualCategory::Mod => apply_mod_row(catalog, row, log, now),
        ManualCategory::Author => apply_author_row(catalog, row, log, now),
        ManualCategory::Group => apply_group_row(catalog, row, log),
        ManualCategory::Compatibility => apply_compatibility_row(catalog, row, log),
        ManualCategory::Catalog => apply_catalog_row(catalog, row, log),
    }
}

/// Apply rows in order; a failing row is logged and skipped
pub fn apply_manual_rows(
    catalog: &mut Catalog,
    rows: &[ManualRow],
    log: &mut ChangeLog,
    now: DateTime<Utc>,
) -> ManualReport {
    let mut report = ManualReport::default();
    for (index, row) in rows.iter().enumerate() {
        match apply_manual_row(catalog, row, log, now) {
            Ok(()) => report.applied += 1,
            Err(e) => {
                tracing::warn!(
                    "Skipping manual row {} ({:?} {}): {}",
                    index + 1,
                    row.category,
                    row.command,
                    e
                );
                report.failed.push((index, e));
            }
        }
    }
    report
}

fn toggled(list: &[ModId], id: ModId, present: bool) -> Vec<ModId> {
    let mut list: Vec<ModId> = list.iter().copied().filter(|item| *item != id).collect();
    if present {
        list.push(id);
    }
    list
}

fn dated(now: DateTime<Utc>, phrase: &str) -> String {
    format!("{}: {}", now.format("%Y-%m-%d"), phrase)
}

fn apply_mod_row(
    catalog: &mut Catalog,
    row: &ManualRow,
    log: &mut ChangeLog,
    now: DateTime<Utc>,
) -> Result<()> {
    let command = row.command.as_str();

    if command == "add" {
        let name = row.text_from(0);
        if name.is_empty() {
            return Err(CatalogError::invalid("'add' is missing the mod name"));
        }
        let id = match row.target {
            0 => catalog.allocate_local_id()?,
            id => id,
        };
        catalog.add_mod(Mod::new(id, name.clone()))?;
        log.added(Entity::Mod, format!("{id} {name}"));
        return Ok(());
    }

    let id = row.target;
    let current = catalog.require_mod(id)?.clone();
    let subject = format!("{id} {}", current.name);

    if let Some(add) = match command {
        "add_exclusion" => Some(true),
        "remove_exclusion" => Some(false),
        _ => None,
    } {
        let category: ExclusionCategory = row.parse_at(0, "exclusion category")?;
        let sub_item = if category.has_sub_item() {
            Some(row.parse_at::<u64>(1, "sub item")?)
        } else {
            None
        };
        let exclusion = Exclusion::new(id, category, sub_item);
        let touched = if add {
            catalog.add_exclusion(exclusion)?
        } else {
            catalog.remove_exclusion(exclusion)?
        };
        if !touched.is_empty() {
            let verb = if add { "added" } else { "removed" };
            log.updated(Entity::Mod, subject, format!("exclusion {category} {verb}"));
        }
        return Ok(());
    }

    let (patch, phrase, exclusion) = mod_edit(catalog, row, &current, now)?;
    if row.is_exclusion && exclusion.is_none() {
        return Err(CatalogError::invalid(format!(
            "'{command}' cannot be marked as an exclusion"
        )));
    }

    let changed = catalog.apply_patch(id, &patch)?;
    if !changed.is_empty() {
        catalog.apply_patch(id, &ModPatch::new().change_note(dated(now, &phrase)))?;
        log.updated(Entity::Mod, subject.clone(), phrase);
    }

    if row.is_exclusion {
        if let Some((category, sub_item)) = exclusion {
            let added = catalog.add_exclusion(Exclusion::new(id, category, sub_item))?;
            if !added.is_empty() {
                log.updated(Entity::Mod, subject, format!("exclusion {category} added"));
            }
        }
    }
    Ok(())
}

type MaybeExclusion = Option<(ExclusionCategory, Option<u64>)>;

/// Patch, change phrase and freezable field for one mod command
fn mod_edit(
    catalog: &Catalog,
    row: &ManualRow,
    current: &Mod,
    now: DateTime<Utc>,
) -> Result<(ModPatch, String, MaybeExclusion)> {
    let command = row.command.as_str();
    let edit = match command {
        "set_stability" => {
            let stability: Stability = row.parse_at(0, "stability")?;
            (
                ModPatch::new().stability(stability, row.text_from(1)),
                format!("stability {stability}"),
                None,
            )
        }
        "set_note" => (
            ModPatch::new().note(row.text_from(0)),
            "note changed".to_string(),
            None,
        ),
        "set_source_url" => (
            ModPatch::new().source_url(row.arg_at(0, "source URL")?),
            "source URL changed".to_string(),
            Some((ExclusionCategory::SourceUrl, None)),
        ),
        "set_app_version" => {
            let version = row.arg_at(0, "app version")?;
            (
                ModPatch::new().compatible_app_version(version),
                format!("compatible app version {version}"),
                Some((ExclusionCategory::CompatibleAppVersion, None)),
            )
        }
        "add_required_mod" | "remove_required_mod" => {
            let present = command.starts_with("add");
            let required: ModId = row.parse_at(0, "required mod id")?;
            let required = catalog
                .substitute_required(&[required])
                .first()
                .copied()
                .unwrap_or(required);
            let verb = if present { "added" } else { "removed" };
            (
                ModPatch::new().required_mods(toggled(&current.required_mods, required, present)),
                format!("required mod {required} {verb}"),
                Some((ExclusionCategory::RequiredMod, Some(required))),
            )
        }
        "add_required_dlc" | "remove_required_dlc" => {
            let present = command.starts_with("add");
            let dlc: DlcId = row.parse_at(0, "DLC id")?;
            let mut dlcs: Vec<DlcId> = current
                .required_dlcs
                .iter()
                .copied()
                .filter(|d| *d != dlc)
                .collect();
            if present {
                dlcs.push(dlc);
            }
            let verb = if present { "added" } else { "removed" };
            (
                ModPatch::new().required_dlcs(dlcs),
                format!("required DLC {dlc} {verb}"),
                Some((ExclusionCategory::RequiredDlc, Some(u64::from(dlc)))),
            )
        }
        "add_successor" | "remove_successor" | "add_alternative" | "remove_alternative"
        | "add_recommendation" | "remove_recommendation" => {
            let present = command.starts_with("add");
            let other: ModId = row.parse_at(0, "mod id")?;
            let (kind, patch) = match command.split_once('_').map(|(_, kind)| kind) {
                Some("successor") => (
                    "successor",
                    ModPatch::new().successors(toggled(&current.successors, other, present)),
                ),
                Some("alternative") => (
                    "alternative",
                    ModPatch::new().alternatives(toggled(&current.alternatives, other, present)),
                ),
                _ => (
                    "recommendation",
                    ModPatch::new()
                        .recommendations(toggled(&current.recommendations, other, present)),
                ),
            };
            let verb = if present { "added" } else { "removed" };
            (patch, format!("{kind} {other} {verb}"), None)
        }
        "add_status" | "remove_status" => {
            let status: ModStatus = row.parse_at(0, "status")?;
            let (patch, verb) = if command == "add_status" {
                (ModPatch::new().add_status(status), "added")
            } else {
                (ModPatch::new().remove_status(status), "removed")
            };
            (
                patch,
                format!("status {status} {verb}"),
                status.exclusion_category().map(|category| (category, None)),
            )
        }
        "review" => (
            ModPatch::new().review_date(now),
            "reviewed".to_string(),
            None,
        ),
        _ => return Err(row.unknown_command()),
    };
    Ok(edit)
}

fn apply_author_row(
    catalog: &mut Catalog,
    row: &ManualRow,
    log: &mut ChangeLog,
    now: DateTime<Utc>,
) -> Result<()> {
    if row.command == "add" {
        let name = row.arg_at(0, "author name")?;
        let handle = row.payload.get(1).map(|h| h.trim()).unwrap_or_default();
        let author = Author::new(row.target, handle, name);
        let label = author.label();
        catalog.add_author(author)?;
        log.added(Entity::Author, label);
        return Ok(());
    }

    let (key, offset) = match row.target {
        0 => (AuthorKey::Handle(row.arg_at(0, "author handle")?.to_string()), 1),
        id => (AuthorKey::Id(id), 0),
    };
    let label = catalog
        .author(&key)
        .map(|a| a.label())
        .ok_or_else(|| crate::error::Violation::UnknownAuthor {
            key: key.to_string(),
        })?;

    let (patch, phrase) = match row.command.as_str() {
        "rename" => {
            let name = row.text_from(offset);
            if name.is_empty() {
                return Err(CatalogError::invalid("'rename' is missing the new name"));
            }
            (AuthorPatch::new().name(name), "name changed")
        }
        "set_handle" => (
            AuthorPatch::new().handle(row.arg_at(offset, "handle")?),
            "handle changed",
        ),
        "set_id" => (
            AuthorPatch::new().id(row.parse_at(offset, "author id")?),
            "id changed",
        ),
        "retire" => {
            let patch = AuthorPatch::new().retired(true);
            if row.is_exclusion {
                (patch.exclusion_for_retired(true), "retired permanently")
            } else {
                (patch, "retired")
            }
        }
        "unretire" => (
            AuthorPatch::new().retired(false).exclusion_for_retired(false),
            "no longer retired",
        ),
        _ => return Err(row.unknown_command()),
    };

    let changed = catalog.apply_author_patch(&key, &patch)?;
    if !changed.is_empty() {
        let key = catalog
            .find_author(patch.id.unwrap_or(0), patch.handle.as_deref().unwrap_or(""))
            .and_then(|a| a.key())
            .unwrap_or(key);
        catalog.apply_author_patch(&key, &AuthorPatch::new().change_note(dated(now, phrase)))?;
        log.updated(Entity::Author, label, phrase);
    }
    Ok(())
}

fn apply_group_row(catalog: &mut Catalog, row: &ManualRow, log: &mut ChangeLog) -> Result<()> {
    match row.command.as_str() {
        "add" => {
            let name = row.arg_at(0, "group name")?.to_string();
            let members = (1..row.payload.len())
                .map(|index| row.parse_at::<ModId>(index, "member id"))
                .collect::<Result<Vec<_>>>()?;
            let id = match row.target {
                0 => catalog.allocate_group_id()?,
                id => id,
            };
            let rewritten = catalog.add_group(Group::new(id, name.clone(), members))?;
            log.added(Entity::Group, format!("{id} {name}"));
            for mod_id in rewritten {
                let subject = catalog
                    .mod_by_id(mod_id)
                    .map(|m| format!("{} {}", m.id, m.name))
                    .unwrap_or_else(|| mod_id.to_string());
                log.updated(
                    Entity::Mod,
                    subject,
                    format!("required mods now use group {id}"),
                );
            }
        }
        "add_member" | "remove_member" => {
            let member: ModId = row.parse_at(0, "member id")?;
            let group_name = catalog
                .group(row.target)
                .map(|g| g.name.clone())
                .unwrap_or_default();
            let subject = format!("{} {}", row.target, group_name);
            if row.command == "add_member" {
                catalog.add_group_member(row.target, member)?;
                log.updated(Entity::Group, subject, format!("member {member} added"));
            } else {
                catalog.remove_group_member(row.target, member)?;
                log.updated(Entity::Group, subject, format!("member {member} removed"));
            }
        }
        "remove" => {
            let removed = catalog.remove_group(row.target)?;
            log.removed(
                Entity::Group,
                format!("{} {}", removed.id, removed.name),
                "removed",
            );
        }
        _ => return Err(row.unknown_command()),
    }
    Ok(())
}

fn apply_compatibility_row(
    catalog: &mut Catalog,
    row: &ManualRow,
    log: &mut ChangeLog,
) -> Result<()> {
    let first = row.target;
    let second: ModId = row.parse_at(0, "second mod id")?;
    let subject = format!("{first} -> {second}");

    match row.command.as_str() {
        "add" => {
            let status: CompatibilityStatus = row.parse_at(1, "compatibility status")?;
            catalog.add_compatibility(Compatibility::new(first, second, status, row.text_from(2)))?;
            log.record(
                crate::reconcile::Section::Added,
                Entity::Compatibility,
                subject,
                Some(status.to_string()),
            );
        }
        "update" => {
            let status: CompatibilityStatus = row.parse_at(1, "compatibility status")?;
            if catalog.update_compatibility(first, second, status, &row.text_from(2))? {
                log.updated(Entity::Compatibility, subject, status.to_string());
            }
        }
        "remove" => {
            let removed = catalog.remove_compatibility(first, second)?;
            log.removed(Entity::Compatibility, subject, removed.status.to_string());
        }
        _ => return Err(row.unknown_command()),
    }
    Ok(())
}

fn apply_catalog_row(catalog: &mut Catalog, row: &ManualRow, log: &mut ChangeLog) -> Result<()> {
    let command = row.command.as_str();
    let field = match command {
        "set_note" => Some((&mut catalog.note, "note")),
        "set_header" => Some((&mut catalog.header_text, "header")),
        "set_footer" => Some((&mut catalog.footer_text, "footer")),
        "set_app_version" => Some((&mut catalog.compatible_app_version, "app version")),
        _ => None,
    };
    if let Some((field, name)) = field {
        let text = row.text_from(0);
        if *field != text {
            *field = text;
            log.updated(Entity::Catalog, name, "changed");
        }
        return Ok(());
    }

    match command {
        "add_required_asset" => {
            if row.target == 0 {
                return Err(CatalogError::invalid("'add_required_asset' needs a target id"));
            }
            if catalog.add_required_asset(row.target) {
                log.added(Entity::RequiredAsset, row.target.to_string());
            }
        }
        "remove_required_asset" => {
            if catalog.remove_required_asset(row.target) {
                log.removed(Entity::RequiredAsset, row.target.to_string(), "removed");
            }
        }
        "retire_orphaned_authors" => {
            for key in catalog.authors_without_visible_mods() {
                let Some(author) = catalog.author(&key) else {
                    continue;
                };
                if author.retired {
                    continue;
                }
                let label = author.label();
                catalog.apply_author_patch(&key, &AuthorPatch::new().retired(true))?;
                log.removed(Entity::Author, label, "retired");
            }
        }
        _ => return Err(row.unknown_command()),
    }
    Ok(())
}
