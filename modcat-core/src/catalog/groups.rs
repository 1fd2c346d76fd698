//! Group membership and required-mod substitution
//!
//! A group stands in for any one of its members in a required list. Once a
//! group exists, required lists across the catalog name the group id
//! instead of individual members.

use std::collections::BTreeSet;

use super::entities::{ExclusionKey, Group, ModPatch};
use super::store::Catalog;
use super::types::{ExclusionCategory, ModId};
use crate::error::Violation;
use crate::ids;

impl Catalog {
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, id: ModId) -> Option<&Group> {
        self.index.groups.get(&id).map(|pos| &self.groups[*pos])
    }

    /// The group a mod belongs to, if any
    pub fn group_of(&self, mod_id: ModId) -> Option<&Group> {
        self.index
            .member_of
            .get(&mod_id)
            .and_then(|group_id| self.group(*group_id))
    }

    pub fn is_member(&self, mod_id: ModId) -> bool {
        self.index.member_of.contains_key(&mod_id)
    }

    /// Replace group members by their group id, dropping duplicates
    ///
    /// Order follows the first occurrence of each resulting id.
    pub fn substitute_required(&self, required: &[ModId]) -> Vec<ModId> {
        let mut substituted = Vec::with_capacity(required.len());
        for id in required {
            let id = self.index.member_of.get(id).copied().unwrap_or(*id);
            if !substituted.contains(&id) {
                substituted.push(id);
            }
        }
        substituted
    }

    /// Add a group and rewrite required lists catalog-wide
    ///
    /// Returns the ids of mods whose required list was rewritten.
    pub fn add_group(&mut self, group: Group) -> Result<Vec<ModId>, Violation> {
        if !ids::is_group_id(group.id) {
            return Err(Violation::InvalidGroupId { id: group.id });
        }
        if self.index.groups.contains_key(&group.id) {
            return Err(Violation::DuplicateGroup { id: group.id });
        }

        let members = self.check_group_members(&group.members)?;

        let group_id = group.id;
        self.index.groups.insert(group_id, self.groups.len());
        self.index.ids.observe(group_id);
        for member in &members {
            self.index.member_of.insert(*member, group_id);
        }
        self.groups.push(Group {
            id: group_id,
            name: group.name,
            members,
        });

        self.expand_member_exclusions(group_id);
        Ok(self.rewrite_required_lists())
    }

    /// Add one more mod to an existing group
    pub fn add_group_member(
        &mut self,
        group_id: ModId,
        member: ModId,
    ) -> Result<Vec<ModId>, Violation> {
        let pos = *self
            .index
            .groups
            .get(&group_id)
            .ok_or(Violation::UnknownGroup { id: group_id })?;
        self.check_new_member(member)?;

        self.groups[pos].members.push(member);
        self.index.member_of.insert(member, group_id);

        self.expand_member_exclusions(group_id);
        Ok(self.rewrite_required_lists())
    }

    /// Remove a mod from a group; a group never drops below two members
    pub fn remove_group_member(&mut self, group_id: ModId, member: ModId) -> Result<(), Violation> {
        let pos = *self
            .index
            .groups
            .get(&group_id)
            .ok_or(Violation::UnknownGroup { id: group_id })?;

        let group = &mut self.groups[pos];
        if !group.contains(member) {
            return Err(Violation::NotAMember {
                member,
                group: group_id,
            });
        }
        if group.members.len() <= 2 {
            return Err(Violation::GroupTooSmall {
                count: group.members.len() - 1,
            });
        }

        group.members.retain(|m| *m != member);
        self.index.member_of.remove(&member);
        Ok(())
    }

    /// Remove a group that no required list names any more
    pub fn remove_group(&mut self, group_id: ModId) -> Result<Group, Violation> {
        let pos = *self
            .index
            .groups
            .get(&group_id)
            .ok_or(Violation::UnknownGroup { id: group_id })?;

        let count = self.index.needed_for.get(&group_id).map_or(0, |set| set.len());
        if count > 0 {
            return Err(Violation::GroupStillRequired {
                id: group_id,
                count,
            });
        }

        let removed = self.groups.remove(pos);
        self.index.groups = self
            .groups
            .iter()
            .enumerate()
            .map(|(pos, group)| (group.id, pos))
            .collect();
        for member in &removed.members {
            self.index.member_of.remove(member);
        }
        Ok(removed)
    }

    /// Deduplicated member list of a would-be group, or why it cannot exist
    pub(crate) fn check_group_members(&self, members: &[ModId]) -> Result<Vec<ModId>, Violation> {
        let mut unique: Vec<ModId> = Vec::with_capacity(members.len());
        for member in members {
            if !unique.contains(member) {
                unique.push(*member);
            }
        }
        if unique.len() < 2 {
            return Err(Violation::GroupTooSmall {
                count: unique.len(),
            });
        }
        for member in &unique {
            self.check_new_member(*member)?;
        }
        Ok(unique)
    }

    fn check_new_member(&self, member: ModId) -> Result<(), Violation> {
        if ids::is_group_id(member) {
            return Err(Violation::NestedGroup { member });
        }
        if let Some(existing) = self.index.member_of.get(&member) {
            return Err(Violation::AlreadyGrouped {
                member,
                group: *existing,
            });
        }
        if !self.contains_mod(member) {
            return Err(Violation::UnknownMod { id: member });
        }
        Ok(())
    }

    /// Substitute group ids into every required list that names a member
    fn rewrite_required_lists(&mut self) -> Vec<ModId> {
        let mut rewritten = Vec::new();

        for pos in 0..self.mods.len() {
            let required = &self.mods[pos].required_mods;
            if !required.iter().any(|id| self.index.member_of.contains_key(id)) {
                continue;
            }
            let substituted = self.substitute_required(required);
            let id = self.mods[pos].id;
            if self
                .apply_patch(id, &ModPatch::new().required_mods(substituted))
                .is_ok_and(|changed| !changed.is_empty())
            {
                rewritten.push(id);
            }
        }

        rewritten
    }

    /// Required-mod exclusions naming any member now cover the whole group
    fn expand_member_exclusions(&mut self, group_id: ModId) {
        let Some(group) = self.group(group_id) else {
            return;
        };
        let mut covered: BTreeSet<ModId> = group.members.iter().copied().collect();
        covered.insert(group_id);

        for m in &mut self.mods {
            let touches_group = m.exclusions.iter().any(|key| {
                key.category == ExclusionCategory::RequiredMod
                    && key.sub_item.is_some_and(|sub| covered.contains(&sub))
            });
            if touches_group {
                for id in &covered {
                    m.exclusions.insert(ExclusionKey {
                        category: ExclusionCategory::RequiredMod,
                        sub_item: Some(*id),
                    });
                }
            }
        }
    }
}
