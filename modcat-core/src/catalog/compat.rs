//! Compatibility ledger
//!
//! Statements are stored once, directed from `first` to `second`. Lookups
//! from the side of `second` return the mirrored status, so callers never
//! need to reverse a status themselves.

use serde::Serialize;

use super::entities::Compatibility;
use super::store::Catalog;
use super::types::{CompatibilityStatus, ModId};
use crate::error::Violation;

/// A compatibility as seen from one mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompatibilityView {
    pub other: ModId,
    pub status: CompatibilityStatus,
    pub note: String,
    /// True when the stored statement runs from `other` to this mod
    pub mirrored: bool,
}

impl Catalog {
    pub fn compatibilities(&self) -> &[Compatibility] {
        &self.compatibilities
    }

    /// The stored statement for an ordered pair
    pub fn compatibility(&self, first: ModId, second: ModId) -> Option<&Compatibility> {
        self.index
            .compat_pairs
            .get(&(first, second))
            .map(|pos| &self.compatibilities[*pos])
    }

    /// Add a directed statement
    ///
    /// A reversed statement for the same pair is only accepted when both
    /// statuses allow per-side statements.
    pub fn add_compatibility(&mut self, compat: Compatibility) -> Result<(), Violation> {
        if compat.first == compat.second {
            return Err(Violation::SelfPair { id: compat.first });
        }
        for id in [compat.first, compat.second] {
            if !self.contains_mod(id) {
                return Err(Violation::UnknownMod { id });
            }
        }
        if self.compatibility(compat.first, compat.second).is_some() {
            return Err(Violation::DuplicatePair {
                first: compat.first,
                second: compat.second,
            });
        }
        self.check_mirror(compat.first, compat.second, compat.status)?;

        let pos = self.compatibilities.len();
        self.index
            .compat_pairs
            .insert((compat.first, compat.second), pos);
        self.index
            .compat_by_mod
            .entry(compat.first)
            .or_default()
            .push(pos);
        self.index
            .compat_by_mod
            .entry(compat.second)
            .or_default()
            .push(pos);
        self.compatibilities.push(compat);
        Ok(())
    }

    /// Change status and note of an existing statement
    ///
    /// Returns whether anything changed.
    pub fn update_compatibility(
        &mut self,
        first: ModId,
        second: ModId,
        status: CompatibilityStatus,
        note: &str,
    ) -> Result<bool, Violation> {
        let pos = *self
            .index
            .compat_pairs
            .get(&(first, second))
            .ok_or(Violation::UnknownPair { first, second })?;

        let current = &self.compatibilities[pos];
        if current.status == status && current.note == note {
            return Ok(false);
        }
        if current.status != status {
            self.check_mirror(first, second, status)?;
        }

        let compat = &mut self.compatibilities[pos];
        compat.status = status;
        compat.note = note.to_string();
        Ok(true)
    }

    pub fn remove_compatibility(
        &mut self,
        first: ModId,
        second: ModId,
    ) -> Result<Compatibility, Violation> {
        let pos = *self
            .index
            .compat_pairs
            .get(&(first, second))
            .ok_or(Violation::UnknownPair { first, second })?;

        let removed = self.compatibilities.remove(pos);
        self.index.rebuild_compatibilities(&self.compatibilities);
        Ok(removed)
    }

    /// Every statement involving `mod_id`, from its perspective
    pub fn for_mod(&self, mod_id: ModId) -> Vec<CompatibilityView> {
        let Some(positions) = self.index.compat_by_mod.get(&mod_id) else {
            return Vec::new();
        };

        positions
            .iter()
            .map(|pos| &self.compatibilities[*pos])
            .map(|compat| {
                if compat.first == mod_id {
                    CompatibilityView {
                        other: compat.second,
                        status: compat.status,
                        note: compat.note.clone(),
                        mirrored: false,
                    }
                } else {
                    CompatibilityView {
                        other: compat.first,
                        status: compat.status.mirrored(),
                        note: compat.note.clone(),
                        mirrored: true,
                    }
                }
            })
            .collect()
    }

    /// Union of the member views of a group
    ///
    /// Statements between two members of the group itself are left out.
    pub fn for_group(&self, group_id: ModId) -> Vec<CompatibilityView> {
        let Some(group) = self.group(group_id) else {
            return Vec::new();
        };

        let mut views: Vec<CompatibilityView> = Vec::new();
        for member in &group.members {
            for view in self.for_mod(*member) {
                if group.contains(view.other) {
                    continue;
                }
                if views
                    .iter()
                    .any(|v| v.other == view.other && v.status == view.status)
                {
                    continue;
                }
                views.push(view);
            }
        }
        views
    }

    fn check_mirror(
        &self,
        first: ModId,
        second: ModId,
        status: CompatibilityStatus,
    ) -> Result<(), Violation> {
        if let Some(reverse) = self.compatibility(second, first) {
            if !(status.allows_mirrored_pair() && reverse.status.allows_mirrored_pair()) {
                return Err(Violation::MirroredPair {
                    first,
                    second,
                    status,
                });
            }
        }
        Ok(())
    }
}
