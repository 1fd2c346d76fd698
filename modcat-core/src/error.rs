//! Catalog error types
//!
//! Two layers: [`Violation`] is the "error code" returned by the catalog
//! store for expected conflicts (duplicate pairs, nested groups, ...), and
//! [`CatalogError`] is what the rest of the crate propagates.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::{CompatibilityStatus, ModId};

/// Invariant conflicts detected at the catalog store boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("mod {id} is already in the catalog")]
    DuplicateMod { id: ModId },

    #[error("mod id {id} lies outside the mod id ranges")]
    InvalidModId { id: ModId },

    #[error("mod {id} is not in the catalog")]
    UnknownMod { id: ModId },

    #[error("compatibility between mod {id} and itself")]
    SelfPair { id: ModId },

    #[error("compatibility {first} -> {second} already exists")]
    DuplicatePair { first: ModId, second: ModId },

    #[error("compatibility {first} -> {second} ({status}) mirrors an existing statement")]
    MirroredPair {
        first: ModId,
        second: ModId,
        status: CompatibilityStatus,
    },

    #[error("compatibility {first} -> {second} does not exist")]
    UnknownPair { first: ModId, second: ModId },

    #[error("group id {id} lies outside the group id range")]
    InvalidGroupId { id: ModId },

    #[error("group {id} is already in the catalog")]
    DuplicateGroup { id: ModId },

    #[error("group {id} is not in the catalog")]
    UnknownGroup { id: ModId },

    #[error("group needs at least 2 distinct members, got {count}")]
    GroupTooSmall { count: usize },

    #[error("mod {member} already belongs to group {group}")]
    AlreadyGrouped { member: ModId, group: ModId },

    #[error("group id {member} cannot be a group member")]
    NestedGroup { member: ModId },

    #[error("group {id} is still required by {count} mod(s)")]
    GroupStillRequired { id: ModId, count: usize },

    #[error("mod {member} is not a member of group {group}")]
    NotAMember { member: ModId, group: ModId },

    #[error("author has neither an id nor a handle")]
    AuthorWithoutIdentity,

    #[error("author '{key}' is already in the catalog")]
    DuplicateAuthor { key: String },

    #[error("author '{key}' is not in the catalog")]
    UnknownAuthor { key: String },
}

/// Coarse classification used by callers deciding whether to skip or abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    InvariantViolation,
    ResourceExhausted,
    StaleCatalog,
    IoFailure,
}

/// Errors surfaced by the catalog core
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Malformed collected record or manual row
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Rejected at the catalog store boundary
    #[error(transparent)]
    Invariant(#[from] Violation),

    /// An identifier band has no free ids left
    #[error("no free identifiers left in the {band} range")]
    ResourceExhausted { band: &'static str },

    /// Candidate catalog failed the version/timestamp sentinel check
    #[error("catalog from {source_name} is not usable: {reason}")]
    StaleCatalog {
        source_name: String,
        reason: String,
    },

    /// Failed to read or write a file
    #[error("I/O failure on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse or serialize catalog data
    #[error("failed to parse {what}")]
    Parse {
        what: String,
        #[source]
        source: serde_yaml_ng::Error,
    },

    /// Failed to parse JSON input
    #[error("failed to parse {what} as JSON")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// Catalog download failed
    #[error("catalog download failed: {0}")]
    Download(String),

    /// Every candidate catalog was missing or unusable
    #[error("no usable catalog available")]
    NoCatalogAvailable,
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::InvalidInput(_) => ErrorKind::InvalidInput,
            CatalogError::Invariant(_) => ErrorKind::InvariantViolation,
            CatalogError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            CatalogError::StaleCatalog { .. } => ErrorKind::StaleCatalog,
            CatalogError::Io { .. }
            | CatalogError::Parse { .. }
            | CatalogError::Json { .. }
            | CatalogError::Download(_)
            | CatalogError::NoCatalogAvailable => ErrorKind::IoFailure,
        }
    }

    /// Per-entity failures are skipped; only I/O failures end a pass
    pub fn is_per_entity(&self) -> bool {
        !matches!(self.kind(), ErrorKind::IoFailure)
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CatalogError::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_maps_to_invariant_kind() {
        let err: CatalogError = Violation::SelfPair { id: 5 }.into();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert!(err.is_per_entity());
        assert_eq!(err.to_string(), "compatibility between mod 5 and itself");
    }

    #[test]
    fn test_no_catalog_is_pass_level() {
        let err = CatalogError::NoCatalogAvailable;
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(!err.is_per_entity());
    }
}
