//! Derived lookup indices
//!
//! Nothing in here is persisted. The index is rebuilt from the entity lists
//! whenever a catalog is loaded, and kept in step by every mutating catalog
//! operation afterwards.

use std::collections::{BTreeSet, HashMap};

use super::entities::{Author, Compatibility, Group, Mod};
use super::types::ModId;
use crate::error::Violation;
use crate::ids::{self, IdentityResolver};

#[derive(Debug, Clone, Default)]
pub(crate) struct CatalogIndex {
    /// Mod id → position in the mod list
    pub mods: HashMap<ModId, usize>,

    /// Group id → position in the group list
    pub groups: HashMap<ModId, usize>,

    /// Mod id → id of the group it belongs to
    pub member_of: HashMap<ModId, ModId>,

    /// Author id → position in the author list
    pub authors_by_id: HashMap<u64, usize>,

    /// Author handle → position in the author list
    pub authors_by_handle: HashMap<String, usize>,

    /// Mod id → positions of every compatibility mentioning it
    pub compat_by_mod: HashMap<ModId, Vec<usize>>,

    /// Ordered (first, second) → position
    pub compat_pairs: HashMap<(ModId, ModId), usize>,

    /// Required id (mod or group) → mods that require it
    pub needed_for: HashMap<ModId, BTreeSet<ModId>>,

    /// Id allocator seeded from the ids in use
    pub ids: IdentityResolver,
}

impl CatalogIndex {
    /// Build every index from scratch
    ///
    /// Entries that break an invariant are left out of the index and
    /// reported, so a damaged catalog still loads.
    pub fn build(
        mods: &[Mod],
        groups: &[Group],
        compatibilities: &[Compatibility],
        authors: &[Author],
    ) -> (Self, Vec<Violation>) {
        let mut index = CatalogIndex::default();
        let mut violations = Vec::new();

        for (pos, m) in mods.iter().enumerate() {
            if !ids::is_mod_id(m.id) {
                violations.push(Violation::InvalidModId { id: m.id });
                continue;
            }
            if index.mods.contains_key(&m.id) {
                violations.push(Violation::DuplicateMod { id: m.id });
                continue;
            }
            index.mods.insert(m.id, pos);
            index.ids.observe(m.id);
            for required in &m.required_mods {
                index.add_needed_for(*required, m.id);
            }
        }

        for (pos, group) in groups.iter().enumerate() {
            if !ids::is_group_id(group.id) {
                violations.push(Violation::InvalidGroupId { id: group.id });
                continue;
            }
            if index.groups.contains_key(&group.id) {
                violations.push(Violation::DuplicateGroup { id: group.id });
                continue;
            }
            index.groups.insert(group.id, pos);
            index.ids.observe(group.id);
            for member in &group.members {
                if ids::is_group_id(*member) {
                    violations.push(Violation::NestedGroup { member: *member });
                    continue;
                }
                if let Some(existing) = index.member_of.insert(*member, group.id) {
                    if existing != group.id {
                        violations.push(Violation::AlreadyGrouped {
                            member: *member,
                            group: existing,
                        });
                        index.member_of.insert(*member, existing);
                    }
                }
            }
        }

        for (pos, compat) in compatibilities.iter().enumerate() {
            if compat.first == compat.second {
                violations.push(Violation::SelfPair { id: compat.first });
                continue;
            }
            if index.compat_pairs.contains_key(&(compat.first, compat.second)) {
                violations.push(Violation::DuplicatePair {
                    first: compat.first,
                    second: compat.second,
                });
                continue;
            }
            index.compat_pairs.insert((compat.first, compat.second), pos);
            index.compat_by_mod.entry(compat.first).or_default().push(pos);
            index.compat_by_mod.entry(compat.second).or_default().push(pos);
        }

        for (pos, author) in authors.iter().enumerate() {
            if author.key().is_none() {
                violations.push(Violation::AuthorWithoutIdentity);
                continue;
            }
            if author.id != 0 {
                if index.authors_by_id.contains_key(&author.id) {
                    violations.push(Violation::DuplicateAuthor {
                        key: author.id.to_string(),
                    });
                } else {
                    index.authors_by_id.insert(author.id, pos);
                }
            }
            if !author.handle.is_empty() {
                if index.authors_by_handle.contains_key(&author.handle) {
                    violations.push(Violation::DuplicateAuthor {
                        key: author.handle.clone(),
                    });
                } else {
                    index.authors_by_handle.insert(author.handle.clone(), pos);
                }
            }
        }

        (index, violations)
    }

    pub fn add_needed_for(&mut self, required: ModId, by: ModId) {
        self.needed_for.entry(required).or_default().insert(by);
    }

    pub fn remove_needed_for(&mut self, required: ModId, by: ModId) {
        if let Some(set) = self.needed_for.get_mut(&required) {
            set.remove(&by);
            if set.is_empty() {
                self.needed_for.remove(&required);
            }
        }
    }

    pub fn rebuild_compatibilities(&mut self, compatibilities: &[Compatibility]) {
        self.compat_by_mod.clear();
        self.compat_pairs.clear();
        for (pos, compat) in compatibilities.iter().enumerate() {
            self.compat_pairs.insert((compat.first, compat.second), pos);
            self.compat_by_mod.entry(compat.first).or_default().push(pos);
            self.compat_by_mod.entry(compat.second).or_default().push(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CompatibilityStatus;

    #[test]
    fn test_build_reports_violations() {
        let mods = vec![
            Mod::new(2_000_001, "A"),
            Mod::new(2_000_001, "A again"),
            Mod::new(1_500, "Group-band mod"),
        ];
        let groups = vec![Group::new(1_001, "G", vec![2_000_001, 1_002])];
        let compat = vec![Compatibility::new(
            2_000_001,
            2_000_001,
            CompatibilityStatus::MinorIssues,
            "",
        )];
        let authors = vec![Author::new(0, "", "Nobody")];

        let (index, violations) = CatalogIndex::build(&mods, &groups, &compat, &authors);

        assert!(violations.contains(&Violation::DuplicateMod { id: 2_000_001 }));
        assert!(violations.contains(&Violation::InvalidModId { id: 1_500 }));
        assert!(violations.contains(&Violation::NestedGroup { member: 1_002 }));
        assert!(violations.contains(&Violation::SelfPair { id: 2_000_001 }));
        assert!(violations.contains(&Violation::AuthorWithoutIdentity));
        assert_eq!(index.member_of.get(&2_000_001), Some(&1_001));
        assert!(index.compat_pairs.is_empty());
    }

    #[test]
    fn test_needed_for_bookkeeping() {
        let mut m = Mod::new(2_000_001, "A");
        m.required_mods = vec![2_000_002, 1_001];
        let (mut index, violations) = CatalogIndex::build(&[m], &[], &[], &[]);
        assert!(violations.is_empty());
        assert!(index.needed_for[&1_001].contains(&2_000_001));

        index.remove_needed_for(1_001, 2_000_001);
        assert!(!index.needed_for.contains_key(&1_001));
    }
}
