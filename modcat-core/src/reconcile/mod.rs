//! Reconciliation engine
//!
//! Merges a [`CollectedSet`] into the catalog. One call is one pass:
//!
//! 1. collected groups are added (proposals naming unknown mods wait until
//!    the mods are in)
//! 2. each collected mod is resolved to an id, then added or diffed
//! 3. real mods missing from the set are marked removed from source
//! 4. collected compatibilities are added or updated
//! 5. authors are touched, created or retired
//!
//! Exclusions freeze fields against all of the above. Failures are per
//! record: the offending record is logged and skipped, the pass goes on.
//! The catalog version moves if and only if the change log is non-empty.

mod authors;
mod changelog;
mod mods;

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::catalog::{AuthorPatch, Catalog, ModId, ModPatch};
use crate::collect::CollectedSet;
use crate::config::ReconcileConfig;

pub use changelog::{ChangeLine, ChangeLog, Entity, Section};

/// Result of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing changed; version and timestamp are untouched
    NoOp,
    Updated {
        version: u32,
        timestamp: DateTime<Utc>,
        change_log: ChangeLog,
    },
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, ReconcileOutcome::NoOp)
    }

    pub fn change_log(&self) -> Option<&ChangeLog> {
        match self {
            ReconcileOutcome::NoOp => None,
            ReconcileOutcome::Updated { change_log, .. } => Some(change_log),
        }
    }

    /// Change-log block for the new version
    pub fn render(&self) -> Option<String> {
        match self {
            ReconcileOutcome::NoOp => None,
            ReconcileOutcome::Updated {
                version,
                timestamp,
                change_log,
            } => Some(change_log.render(*version, *timestamp)),
        }
    }
}

/// Run one reconciliation pass over `catalog`
pub fn reconcile(
    catalog: &mut Catalog,
    collected: &CollectedSet,
    config: &ReconcileConfig,
    now: DateTime<Utc>,
) -> ReconcileOutcome {
    tracing::info!(
        "Reconciling catalog version {} against {} collected mods",
        catalog.version(),
        collected.mods.len()
    );

    let mut pass = Pass {
        catalog,
        collected,
        config,
        now,
        log: ChangeLog::new(),
        observed: BTreeSet::new(),
        mod_notes: BTreeMap::new(),
        touched_authors: BTreeSet::new(),
        author_notes: BTreeMap::new(),
    };
    pass.run();
    pass.finish()
}

/// State of one pass
struct Pass<'a> {
    catalog: &'a mut Catalog,
    collected: &'a CollectedSet,
    config: &'a ReconcileConfig,
    now: DateTime<Utc>,
    log: ChangeLog,

    /// Mod ids positively seen in this pass
    observed: BTreeSet<ModId>,

    /// Change phrases per mod, written as one dated note at the end
    mod_notes: BTreeMap<ModId, Vec<String>>,

    /// Positions of authors referenced in this pass
    touched_authors: BTreeSet<usize>,
    author_notes: BTreeMap<usize, Vec<String>>,
}

impl<'a> Pass<'a> {
    fn run(&mut self) {
        let collected = self.collected;

        let proposals: Vec<_> = collected.groups.iter().collect();
        let deferred = self.add_groups(&proposals, true);

        for record in &collected.mods {
            self.reconcile_mod(record);
        }

        self.add_groups(&deferred, false);
        self.mark_absent_mods();
        self.reconcile_compatibilities();
        self.reconcile_authors();
    }

    fn finish(mut self) -> ReconcileOutcome {
        if self.log.is_empty() {
            tracing::info!(
                "No changes, catalog stays at version {}",
                self.catalog.version()
            );
            return ReconcileOutcome::NoOp;
        }

        let date = self.now.format("%Y-%m-%d").to_string();

        for (id, phrases) in std::mem::take(&mut self.mod_notes) {
            let patch = ModPatch::new()
                .auto_review_date(self.now)
                .change_note(format!("{date}: {}", phrases.join(", ")));
            if let Err(e) = self.catalog.apply_patch(id, &patch) {
                tracing::warn!("Could not add change note to mod {}: {}", id, e);
            }
        }

        for (pos, phrases) in std::mem::take(&mut self.author_notes) {
            let Some(key) = self.catalog.authors().get(pos).and_then(|a| a.key()) else {
                continue;
            };
            let patch = AuthorPatch::new().change_note(format!("{date}: {}", phrases.join(", ")));
            if let Err(e) = self.catalog.apply_author_patch(&key, &patch) {
                tracing::warn!("Could not add change note to author {}: {}", key, e);
            }
        }

        self.catalog.commit_version(self.now);
        tracing::info!(
            "Catalog updated to version {} ({} change log lines)",
            self.catalog.version(),
            self.log.len()
        );

        ReconcileOutcome::Updated {
            version: self.catalog.version(),
            timestamp: self.catalog.update_timestamp(),
            change_log: self.log,
        }
    }

    /// Change-log subject for a mod or group id
    fn subject(&self, id: ModId) -> String {
        let name = self
            .catalog
            .mod_by_id(id)
            .map(|m| m.name.as_str())
            .or_else(|| self.catalog.group(id).map(|g| g.name.as_str()))
            .unwrap_or_default();
        if name.is_empty() {
            id.to_string()
        } else {
            format!("{id} {name}")
        }
    }

    fn note_mod(&mut self, section: Section, id: ModId, phrases: Vec<String>) {
        let subject = self.subject(id);
        for phrase in &phrases {
            self.log
                .record(section, Entity::Mod, subject.clone(), Some(phrase.clone()));
        }
        self.mod_notes.entry(id).or_default().extend(phrases);
    }

    fn note_author(&mut self, section: Section, pos: usize, phrases: Vec<String>) {
        let Some(label) = self.catalog.authors().get(pos).map(|a| a.label()) else {
            return;
        };
        for phrase in &phrases {
            self.log
                .record(section, Entity::Author, label.clone(), Some(phrase.clone()));
        }
        self.author_notes.entry(pos).or_default().extend(phrases);
    }
}
