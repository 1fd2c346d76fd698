//! Identifier ranges
//!
//! Every mod and group id falls into exactly one band. This module is the
//! only place that knows the band boundaries; everything else asks
//! [`classify`] or allocates through an [`IdentityResolver`].
//!
//! ```text
//! 0                       unknown
//! 1 ..= 99                builtin components (fixed table)
//! 100 ..= 999             builtin components not in the table
//! 1_000 ..= 9_999         groups
//! 10_000 ..= 999_999      local mods without a source id
//! > 999_999               real ids assigned by the source
//! ```

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::catalog::ModId;
use crate::error::{CatalogError, Result};

pub const LOWEST_BUILTIN_ID: ModId = 1;
pub const HIGHEST_BUILTIN_TABLE_ID: ModId = 99;
pub const LOWEST_UNKNOWN_BUILTIN_ID: ModId = 100;
pub const HIGHEST_BUILTIN_ID: ModId = 999;
pub const LOWEST_GROUP_ID: ModId = 1_000;
pub const HIGHEST_GROUP_ID: ModId = 9_999;
pub const LOWEST_LOCAL_ID: ModId = 10_000;
pub const HIGHEST_LOCAL_ID: ModId = 999_999;

/// Everything above this came from the source
pub const HIGHEST_FAKE_ID: ModId = HIGHEST_LOCAL_ID;

/// Components that ship with the application, keyed by display name
static BUILTIN_MODS: Lazy<HashMap<&'static str, ModId>> = Lazy::new(|| {
    HashMap::from([
        ("Hard Mode", 1),
        ("Unlimited Money", 2),
        ("Unlimited Oil And Ore", 3),
        ("Unlimited Soil", 4),
        ("Unlock All", 5),
    ])
});

/// Which band an identifier belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Real,
    Group,
    Local,
    Builtin,
    Unknown,
}

/// Classify an identifier by band
pub fn classify(id: ModId) -> IdKind {
    match id {
        0 => IdKind::Unknown,
        LOWEST_BUILTIN_ID..=HIGHEST_BUILTIN_ID => IdKind::Builtin,
        LOWEST_GROUP_ID..=HIGHEST_GROUP_ID => IdKind::Group,
        LOWEST_LOCAL_ID..=HIGHEST_LOCAL_ID => IdKind::Local,
        _ => IdKind::Real,
    }
}

/// True for ids a mod may carry (everything except groups and 0)
pub fn is_mod_id(id: ModId) -> bool {
    !matches!(classify(id), IdKind::Group | IdKind::Unknown)
}

pub fn is_group_id(id: ModId) -> bool {
    classify(id) == IdKind::Group
}

/// Look up a builtin component in the fixed table
pub fn builtin_id(name: &str) -> Option<ModId> {
    BUILTIN_MODS.get(name.trim()).copied()
}

/// Allocates fake ids for local mods, unrecognised builtins and new groups
///
/// Counters only move forward. They are seeded from the ids already present
/// in a catalog, so a freshly loaded catalog never hands out an id twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityResolver {
    next_local: ModId,
    next_unknown_builtin: ModId,
    next_group: ModId,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self {
            next_local: LOWEST_LOCAL_ID,
            next_unknown_builtin: LOWEST_UNKNOWN_BUILTIN_ID,
            next_group: LOWEST_GROUP_ID,
        }
    }
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver whose counters lie past every id in `existing`
    pub fn seeded<I: IntoIterator<Item = ModId>>(existing: I) -> Self {
        let mut resolver = Self::new();
        for id in existing {
            resolver.observe(id);
        }
        resolver
    }

    /// Move the matching counter past an id that is already in use
    pub fn observe(&mut self, id: ModId) {
        match classify(id) {
            IdKind::Local => self.next_local = self.next_local.max(id + 1),
            IdKind::Group => self.next_group = self.next_group.max(id + 1),
            IdKind::Builtin if id >= LOWEST_UNKNOWN_BUILTIN_ID => {
                self.next_unknown_builtin = self.next_unknown_builtin.max(id + 1)
            }
            _ => {}
        }
    }

    pub fn allocate_local(&mut self) -> Result<ModId> {
        Self::take(&mut self.next_local, HIGHEST_LOCAL_ID, "local mod")
    }

    pub fn allocate_unknown_builtin(&mut self) -> Result<ModId> {
        Self::take(
            &mut self.next_unknown_builtin,
            HIGHEST_BUILTIN_ID,
            "builtin mod",
        )
    }

    pub fn allocate_group(&mut self) -> Result<ModId> {
        Self::take(&mut self.next_group, HIGHEST_GROUP_ID, "group")
    }

    fn take(counter: &mut ModId, highest: ModId, band: &'static str) -> Result<ModId> {
        if *counter > highest {
            return Err(CatalogError::ResourceExhausted { band });
        }
        let id = *counter;
        *counter += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_classify_band_edges() {
        assert_eq!(classify(0), IdKind::Unknown);
        assert_eq!(classify(1), IdKind::Builtin);
        assert_eq!(classify(999), IdKind::Builtin);
        assert_eq!(classify(1_000), IdKind::Group);
        assert_eq!(classify(9_999), IdKind::Group);
        assert_eq!(classify(10_000), IdKind::Local);
        assert_eq!(classify(HIGHEST_FAKE_ID), IdKind::Local);
        assert_eq!(classify(HIGHEST_FAKE_ID + 1), IdKind::Real);
        assert_eq!(classify(2_345_678_901), IdKind::Real);
    }

    #[test]
    fn test_builtin_table() {
        assert_eq!(builtin_id("Unlimited Money"), Some(2));
        assert_eq!(builtin_id("  Unlock All "), Some(5));
        assert_eq!(builtin_id("Not A Builtin"), None);
        for id in BUILTIN_MODS.values() {
            assert!(*id <= HIGHEST_BUILTIN_TABLE_ID);
        }
    }

    #[test]
    fn test_allocation_is_monotonic() {
        let mut resolver = IdentityResolver::new();
        assert_eq!(resolver.allocate_local().unwrap(), LOWEST_LOCAL_ID);
        assert_eq!(resolver.allocate_local().unwrap(), LOWEST_LOCAL_ID + 1);
        assert_eq!(resolver.allocate_group().unwrap(), LOWEST_GROUP_ID);
        assert_eq!(
            resolver.allocate_unknown_builtin().unwrap(),
            LOWEST_UNKNOWN_BUILTIN_ID
        );
    }

    #[test]
    fn test_seeded_skips_existing_ids() {
        let mut resolver = IdentityResolver::seeded([10_500, 1_200, 150, 3, 5_000_000]);
        assert_eq!(resolver.allocate_local().unwrap(), 10_501);
        assert_eq!(resolver.allocate_group().unwrap(), 1_201);
        assert_eq!(resolver.allocate_unknown_builtin().unwrap(), 151);
    }

    #[test]
    fn test_exhausted_band() {
        let mut resolver = IdentityResolver::seeded([HIGHEST_GROUP_ID]);
        let err = resolver.allocate_group().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);

        // Other bands are unaffected
        assert!(resolver.allocate_local().is_ok());
    }
}
