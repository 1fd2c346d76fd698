//! Exclusion guard
//!
//! An exclusion records that a maintainer set a field by hand, so the
//! reconciliation pass must leave it alone. Exclusions are stored on the
//! target mod; the catalog exposes them as a flat list.

use std::collections::BTreeSet;

use super::entities::{Exclusion, ExclusionKey};
use super::store::Catalog;
use super::types::{ExclusionCategory, ModId};
use crate::error::Violation;

impl Catalog {
    /// Every exclusion in the catalog, ordered by mod id
    pub fn exclusions(&self) -> Vec<Exclusion> {
        let mut all: Vec<Exclusion> = self
            .mods
            .iter()
            .flat_map(|m| {
                m.exclusions
                    .iter()
                    .map(move |key| Exclusion::new(m.id, key.category, key.sub_item))
            })
            .collect();
        all.sort();
        all
    }

    pub fn is_excluded(
        &self,
        mod_id: ModId,
        category: ExclusionCategory,
        sub_item: Option<u64>,
    ) -> bool {
        self.mod_by_id(mod_id)
            .is_some_and(|m| m.is_excluded(category, sub_item))
    }

    /// Record an exclusion, expanding group references
    ///
    /// Returns the exclusions that were newly added.
    pub fn add_exclusion(&mut self, exclusion: Exclusion) -> Result<Vec<Exclusion>, Violation> {
        let pos = *self.index.mods.get(&exclusion.mod_id).ok_or(Violation::UnknownMod {
            id: exclusion.mod_id,
        })?;

        let keys = self.expand(&exclusion);
        let target = &mut self.mods[pos];
        let added = keys
            .into_iter()
            .filter(|key| target.exclusions.insert(*key))
            .map(|key| Exclusion::new(exclusion.mod_id, key.category, key.sub_item))
            .collect();
        Ok(added)
    }

    /// Drop an exclusion, expanding group references the same way as adding
    ///
    /// Returns the exclusions that were actually removed.
    pub fn remove_exclusion(&mut self, exclusion: Exclusion) -> Result<Vec<Exclusion>, Violation> {
        let pos = *self.index.mods.get(&exclusion.mod_id).ok_or(Violation::UnknownMod {
            id: exclusion.mod_id,
        })?;

        let keys = self.expand(&exclusion);
        let target = &mut self.mods[pos];
        let removed = keys
            .into_iter()
            .filter(|key| target.exclusions.remove(key))
            .map(|key| Exclusion::new(exclusion.mod_id, key.category, key.sub_item))
            .collect();
        Ok(removed)
    }

    /// A sub-item naming a group or a group member covers the whole group
    fn expand(&self, exclusion: &Exclusion) -> BTreeSet<ExclusionKey> {
        let category = exclusion.category;
        let sub_item = if category.has_sub_item() {
            exclusion.sub_item
        } else {
            None
        };

        let mut keys = BTreeSet::new();
        keys.insert(ExclusionKey { category, sub_item });

        if category != ExclusionCategory::RequiredMod {
            return keys;
        }
        let Some(sub) = sub_item else {
            return keys;
        };
        let group = self.group(sub).or_else(|| self.group_of(sub));
        if let Some(group) = group {
            keys.insert(ExclusionKey {
                category,
                sub_item: Some(group.id),
            });
            for member in &group.members {
                keys.insert(ExclusionKey {
                    category,
                    sub_item: Some(*member),
                });
            }
        }
        keys
    }
}
