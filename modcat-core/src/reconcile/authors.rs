//! Author rules of a pass

use chrono::{DateTime, Utc};

use super::{Entity, Pass, Section};
use crate::catalog::{Author, AuthorKey, AuthorPatch};

/// One author reference seen in this pass
struct AuthorRef<'r> {
    id: u64,
    handle: &'r str,
    /// Only explicit author records carry a name
    name: Option<&'r str>,
    seen: Option<DateTime<Utc>>,
}

impl Pass<'_> {
    pub(super) fn reconcile_authors(&mut self) {
        let collected = self.collected;

        for author in &collected.authors {
            self.touch_author(AuthorRef {
                id: author.id,
                handle: &author.handle,
                name: Some(&author.name),
                seen: author.last_seen,
            });
        }

        // Authors of every mod observed in this pass, as stored after the update
        let references: Vec<(u64, String, Option<DateTime<Utc>>)> = self
            .observed
            .iter()
            .filter_map(|id| self.catalog.mod_by_id(*id))
            .filter(|m| m.author_key().is_some())
            .map(|m| (m.author_id, m.author_handle.clone(), m.updated))
            .collect();
        for (id, handle, seen) in &references {
            self.touch_author(AuthorRef {
                id: *id,
                handle,
                name: None,
                seen: *seen,
            });
        }

        if self.config.retire_untouched_authors {
            self.retire_untouched_authors();
        }
    }

    fn touch_author(&mut self, reference: AuthorRef<'_>) {
        let handle = reference.handle.trim();
        let name = reference.name.map(str::trim).filter(|n| !n.is_empty());

        let Some(pos) = self.catalog.find_author_position(reference.id, handle) else {
            self.add_author(reference.id, handle, name, reference.seen);
            return;
        };
        self.touched_authors.insert(pos);

        let Some(current) = self.catalog.authors().get(pos) else {
            return;
        };
        let Some(key) = current.key() else {
            return;
        };

        let mut patch = AuthorPatch::new();
        let mut phrases = Vec::new();

        if reference.id != 0 && reference.id != current.id {
            patch = patch.id(reference.id);
            phrases.push(if current.id == 0 {
                "id added".to_string()
            } else {
                "id changed".to_string()
            });
        }
        if !handle.is_empty() && handle != current.handle {
            patch = patch.handle(handle);
            phrases.push("handle changed".to_string());
        } else if handle.is_empty()
            && !current.handle.is_empty()
            && name.is_some()
            && current.id != 0
            && self.config.clear_missing_author_handles
        {
            patch = patch.handle("");
            phrases.push("handle removed".to_string());
        }
        if let Some(name) = name {
            if name != current.name {
                patch = patch.name(name);
                phrases.push("name changed".to_string());
            }
        }
        if let Some(seen) = reference.seen {
            if current.last_seen.map_or(true, |stored| seen > stored) {
                patch = patch.last_seen(seen);
                phrases.push(format!("last seen {}", seen.format("%Y-%m-%d")));
            }
        }
        if current.retired && !current.exclusion_for_retired {
            patch = patch.retired(false);
            phrases.push("no longer retired".to_string());
        }

        if phrases.is_empty() {
            return;
        }
        match self.catalog.apply_author_patch(&key, &patch) {
            Ok(_) => self.note_author(Section::Updated, pos, phrases),
            Err(e) => self.skip_record(&format!("author {key}"), &e.into()),
        }
    }

    fn add_author(
        &mut self,
        id: u64,
        handle: &str,
        name: Option<&str>,
        seen: Option<DateTime<Utc>>,
    ) {
        let name = match name {
            Some(name) => name.to_string(),
            None if !handle.is_empty() => handle.to_string(),
            None => id.to_string(),
        };
        let mut author = Author::new(id, handle, name);
        author.last_seen = seen;

        let label = author.label();
        match self.catalog.add_author(author) {
            Ok(()) => {
                let pos = self.catalog.authors().len() - 1;
                self.touched_authors.insert(pos);
                self.log.added(Entity::Author, label);
                self.author_notes
                    .entry(pos)
                    .or_default()
                    .push("added".to_string());
            }
            Err(e) => self.skip_record(&format!("author '{label}'"), &e.into()),
        }
    }

    /// Retire every author no mod referenced in this pass
    fn retire_untouched_authors(&mut self) {
        let untouched: Vec<(usize, AuthorKey)> = self
            .catalog
            .authors()
            .iter()
            .enumerate()
            .filter(|(pos, author)| !self.touched_authors.contains(pos) && !author.retired)
            .filter_map(|(pos, author)| author.key().map(|key| (pos, key)))
            .collect();

        for (pos, key) in untouched {
            match self
                .catalog
                .apply_author_patch(&key, &AuthorPatch::new().retired(true))
            {
                Ok(_) => self.note_author(Section::Removed, pos, vec!["retired".to_string()]),
                Err(e) => self.skip_record(&format!("author {key}"), &e.into()),
            }
        }
    }
}
