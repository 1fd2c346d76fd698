//! Mod catalog - entities, indices and invariant-checked mutations
//!
//! # Overview
//!
//! A [`Catalog`] holds every known mod, author, group and compatibility
//! statement. It is the single owner of its data: relations are stored as
//! ids and resolved through derived indices that are rebuilt on load and
//! kept in step by every mutating call.
//!
//! # Architecture
//!
//! ```text
//! catalog.yaml
//!     │  (persist)
//!     ▼
//! Catalog ──── entity lists ── mods / groups / compatibilities / authors
//!     │
//!     └─────── CatalogIndex ── id → position, member → group,
//!                              needed-for, id allocation
//! ```
//!
//! Group, compatibility and exclusion rules live in their own submodules
//! as further `impl Catalog` blocks.

mod compat;
mod entities;
mod exclusions;
mod groups;
mod index;
mod persist;
mod store;
mod types;

pub use compat::CompatibilityView;
pub use entities::{
    Author, AuthorField, AuthorKey, AuthorPatch, Compatibility, Exclusion, ExclusionKey, Group,
    Mod, ModField, ModPatch,
};
pub use store::{Catalog, CURRENT_STRUCTURE_VERSION};
pub use types::{CompatibilityStatus, DlcId, ExclusionCategory, ModId, ModStatus, Stability};
