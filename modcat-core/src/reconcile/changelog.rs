//! Change log of one catalog version
//!
//! Lines are grouped into Added / Updated / Removed. Within a section, mods
//! come first and authors last; everything else keeps insertion order.
//!
//! ```text
//! Catalog version 13, 2026-10-19 12:00:00 UTC
//! Added:
//!   New mod 2000001 Traffic Helper
//! Updated:
//!   Mod 2000002 Road Tool: new update, source URL changed
//! Removed:
//!   Author Someone: retired
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Added,
    Updated,
    Removed,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Added, Section::Updated, Section::Removed];

    fn heading(self) -> &'static str {
        match self {
            Section::Added => "Added:",
            Section::Updated => "Updated:",
            Section::Removed => "Removed:",
        }
    }
}

/// What a change-log line is about; declaration order is print order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Entity {
    Mod,
    Group,
    Compatibility,
    RequiredAsset,
    Catalog,
    Author,
}

impl Entity {
    fn label(self, section: Section) -> &'static str {
        match (section, self) {
            (Section::Added, Entity::Mod) => "New mod",
            (Section::Added, Entity::Group) => "New group",
            (Section::Added, Entity::Compatibility) => "New compatibility",
            (Section::Added, Entity::RequiredAsset) => "New required asset",
            (Section::Added, Entity::Author) => "New author",
            (_, Entity::Mod) => "Mod",
            (_, Entity::Group) => "Group",
            (_, Entity::Compatibility) => "Compatibility",
            (_, Entity::RequiredAsset) => "Required asset",
            (_, Entity::Catalog) => "Catalog",
            (_, Entity::Author) => "Author",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeLine {
    pub section: Section,
    pub entity: Entity,
    pub subject: String,
    pub phrases: Vec<String>,
}

impl ChangeLine {
    pub fn text(&self) -> String {
        let label = self.entity.label(self.section);
        if self.phrases.is_empty() {
            format!("{} {}", label, self.subject)
        } else {
            format!("{} {}: {}", label, self.subject, self.phrases.join(", "))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLog {
    lines: Vec<ChangeLine>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Add a phrase, merging into an existing line for the same subject
    pub fn record(
        &mut self,
        section: Section,
        entity: Entity,
        subject: impl Into<String>,
        phrase: Option<String>,
    ) {
        let subject = subject.into();
        let existing = self
            .lines
            .iter_mut()
            .find(|l| l.section == section && l.entity == entity && l.subject == subject);

        match existing {
            Some(line) => line.phrases.extend(phrase),
            None => self.lines.push(ChangeLine {
                section,
                entity,
                subject,
                phrases: phrase.into_iter().collect(),
            }),
        }
    }

    pub fn added(&mut self, entity: Entity, subject: impl Into<String>) {
        self.record(Section::Added, entity, subject, None);
    }

    pub fn updated(&mut self, entity: Entity, subject: impl Into<String>, phrase: impl Into<String>) {
        self.record(Section::Updated, entity, subject, Some(phrase.into()));
    }

    pub fn removed(&mut self, entity: Entity, subject: impl Into<String>, phrase: impl Into<String>) {
        self.record(Section::Removed, entity, subject, Some(phrase.into()));
    }

    /// Lines of one section in print order
    pub fn lines(&self, section: Section) -> Vec<&ChangeLine> {
        let mut lines: Vec<&ChangeLine> =
            self.lines.iter().filter(|l| l.section == section).collect();
        lines.sort_by_key(|l| l.entity);
        lines
    }

    /// Whether any rendered line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.text().contains(needle))
    }

    pub fn render(&self, version: u32, timestamp: DateTime<Utc>) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Catalog version {}, {}",
            version,
            timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for section in Section::ALL {
            let _ = writeln!(out, "{}", section.heading());
            for line in self.lines(section) {
                let _ = writeln!(out, "  {}", line.text());
            }
        }
        out
    }

    /// Append a rendered block to the change-log file, newest last
    pub fn append_to_file(&self, path: &Path, version: u32, timestamp: DateTime<Utc>) -> Result<()> {
        let io_err = |source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        let block = self.render(version, timestamp);
        writeln!(file, "{block}").map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_phrases_merge_per_subject() {
        let mut log = ChangeLog::new();
        log.updated(Entity::Mod, "2000001 A", "new update");
        log.updated(Entity::Mod, "2000001 A", "source URL changed");
        log.updated(Entity::Mod, "2000002 B", "name changed");

        assert_eq!(log.len(), 2);
        assert_eq!(
            log.lines(Section::Updated)[0].text(),
            "Mod 2000001 A: new update, source URL changed"
        );
    }

    #[test]
    fn test_render_orders_mods_before_authors() {
        let mut log = ChangeLog::new();
        log.removed(Entity::Author, "Someone", "retired");
        log.added(Entity::Mod, "123 Foo");
        log.removed(Entity::Mod, "2000001 A", "removed from source");

        let expected = "\
Catalog version 2, 2026-10-19 12:00:00 UTC
Added:
  New mod 123 Foo
Updated:
Removed:
  Mod 2000001 A: removed from source
  Author Someone: retired
";
        assert_eq!(log.render(2, timestamp()), expected);
        assert!(log.contains("New mod 123 Foo"));
    }

    #[test]
    fn test_append_keeps_previous_blocks() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("changelog.txt");

        let mut log = ChangeLog::new();
        log.added(Entity::Mod, "123 Foo");
        log.append_to_file(&path, 1, timestamp()).unwrap();
        log.append_to_file(&path, 2, timestamp()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let first = content.find("Catalog version 1").unwrap();
        let second = content.find("Catalog version 2").unwrap();
        assert!(first < second);
    }
}
