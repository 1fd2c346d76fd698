//! Test helper functions for integration tests
//!
//! Shared across the test files using the tests/common/ pattern.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use modcat_core::catalog::{Author, Catalog, Mod, ModId, ModPatch};
use modcat_core::collect::{CollectedMod, CollectedSet};
use std::path::{Path, PathBuf};
use std::sync::Once;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Midnight UTC on the given day
pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// A published catalog holding the given mods
pub fn published_catalog(version: u32, mods: &[(ModId, &str)]) -> Catalog {
    let mut catalog = Catalog::new().with_version(version, day(2026, 1, 1));
    for (id, name) in mods {
        catalog.add_mod(Mod::new(*id, *name)).unwrap();
    }
    catalog
}

/// Add an author and point the given mods at it
pub fn add_author(catalog: &mut Catalog, author: Author, mods: &[ModId]) {
    let (id, handle) = (author.id, author.handle.clone());
    catalog.add_author(author).unwrap();
    for mod_id in mods {
        let patch = ModPatch::new().author(id, handle.clone());
        catalog.apply_patch(*mod_id, &patch).unwrap();
    }
}

/// A collected set that mentions every mod of `catalog` unchanged
pub fn echo_of(catalog: &Catalog) -> CollectedSet {
    let mut set = CollectedSet::new();
    for m in catalog.mods() {
        let mut record = CollectedMod::new(m.id, m.name.clone());
        record.author_id = m.author_id;
        record.author_handle = m.author_handle.clone();
        record.updated = m.updated;
        set.mods.push(record);
    }
    set
}

pub fn write_catalog(dir: &Path, file: &str, catalog: &Catalog) -> PathBuf {
    let path = dir.join(file);
    catalog.save(&path).unwrap();
    path
}
