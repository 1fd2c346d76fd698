//! Catalog selection across sources, downloads and the session lifecycle

mod common;

use common::{day, init_test_logging, published_catalog, write_catalog};
use modcat_core::catalog::{Catalog, ExclusionCategory};
use modcat_core::error::{CatalogError, Result};
use modcat_core::manual::ManualRow;
use modcat_core::selector::{
    CatalogSelector, CatalogSource, CatalogSources, DownloadLatch, NoDownload,
};
use modcat_core::{CatalogSession, ModcatConfig};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const URL: &str = "https://catalog.example/catalog.yaml";

fn sources(dir: &Path) -> CatalogSources {
    CatalogSources {
        maintainer: Some(dir.join("maintainer.yaml")),
        cached: Some(dir.join("cache").join("catalog.yaml")),
        bundled: Some(dir.join("bundled.yaml")),
        download_url: Some(URL.to_string()),
    }
}

#[test]
fn test_failed_download_falls_back_with_warning() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    write_catalog(&dir.path().join("cache"), "catalog.yaml", &published_catalog(5, &[]));
    write_catalog(dir.path(), "bundled.yaml", &published_catalog(3, &[]));

    let offline = |_url: &str| -> Result<String> {
        Err(CatalogError::Download("network unreachable".to_string()))
    };
    let selection = CatalogSelector::new(sources(dir.path()), offline, DownloadLatch::new())
        .select()
        .unwrap();

    assert_eq!(selection.source, CatalogSource::Cached);
    assert_eq!(selection.catalog.version(), 5);
    let warning = selection.stale_warning.unwrap();
    assert!(warning.contains("download failed"), "{warning}");
}

#[test]
fn test_download_wins_and_is_cached() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "bundled.yaml", &published_catalog(3, &[]));
    let published = published_catalog(8, &[(2_000_001, "Traffic")]).to_yaml().unwrap();

    let online = move |url: &str| -> Result<String> {
        assert_eq!(url, URL);
        Ok(published.clone())
    };
    let selection = CatalogSelector::new(sources(dir.path()), online, DownloadLatch::new())
        .select()
        .unwrap();

    assert_eq!(selection.source, CatalogSource::Downloaded);
    assert!(selection.stale_warning.is_none());

    let cached = Catalog::load(&dir.path().join("cache").join("catalog.yaml")).unwrap();
    assert_eq!(cached.version(), 8);
    assert_eq!(cached, selection.catalog);
}

#[test]
fn test_newer_cache_survives_older_download() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let cache = write_catalog(
        &dir.path().join("cache"),
        "catalog.yaml",
        &published_catalog(10, &[(2_000_001, "Curated")]),
    );
    let published = published_catalog(9, &[]).to_yaml().unwrap();

    let online = move |_url: &str| -> Result<String> { Ok(published.clone()) };
    let selection = CatalogSelector::new(sources(dir.path()), online, DownloadLatch::new())
        .select()
        .unwrap();

    assert_eq!(selection.source, CatalogSource::Cached);
    assert_eq!(selection.catalog.version(), 10);

    let on_disk = Catalog::load(&cache).unwrap();
    assert_eq!(on_disk.version(), 10);
    assert_eq!(on_disk.mods().len(), 1);
}

#[test]
#[serial]
fn test_local_saves_are_selected_next_run() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "bundled.yaml", &published_catalog(4, &[(2_000_001, "Traffic")]));
    let config = ModcatConfig {
        bundled_catalog: Some(dir.path().join("bundled.yaml")),
        cache_dir: Some(dir.path().join("cache")),
        ..ModcatConfig::default()
    };

    let mut session =
        CatalogSession::open(config.clone(), NoDownload, DownloadLatch::new()).unwrap();
    let rows = ManualRow::from_yaml(
        "- category: mod\n  command: set_note\n  target: 2000001\n  payload: [checked]\n",
    )
    .unwrap();
    session.apply_manual(&rows, day(2026, 10, 19)).unwrap();
    let saved = session.save(None).unwrap();
    session.close();

    assert_ne!(Some(saved.clone()), config.cached_catalog_path());
    let reopened = CatalogSession::open(config, NoDownload, DownloadLatch::new()).unwrap();
    assert_eq!(reopened.source(), CatalogSource::Maintainer);
    assert_eq!(reopened.catalog().version(), 5);
}

#[test]
fn test_unparseable_download_falls_back() {
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "bundled.yaml", &published_catalog(3, &[]));

    let garbage = |_url: &str| -> Result<String> { Ok("mods: [oops".to_string()) };
    let selection = CatalogSelector::new(sources(dir.path()), garbage, DownloadLatch::new())
        .select()
        .unwrap();

    assert_eq!(selection.source, CatalogSource::Bundled);
    assert!(!dir.path().join("cache").join("catalog.yaml").exists());
}

#[test]
fn test_stale_candidates_are_skipped() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    write_catalog(
        dir.path(),
        "maintainer.yaml",
        &Catalog::new().with_version(0, day(2026, 2, 1)),
    );
    write_catalog(dir.path(), "bundled.yaml", &published_catalog(2, &[]));

    let selection = CatalogSelector::new(
        CatalogSources {
            download_url: None,
            ..sources(dir.path())
        },
        NoDownload,
        DownloadLatch::new(),
    )
    .select()
    .unwrap();

    assert_eq!(selection.source, CatalogSource::Bundled);
}

#[test]
fn test_no_candidate_at_all() {
    let dir = TempDir::new().unwrap();
    let err = CatalogSelector::new(sources(dir.path()), NoDownload, DownloadLatch::new())
        .select()
        .unwrap_err();
    assert!(matches!(err, CatalogError::NoCatalogAvailable));
}

#[test]
#[serial]
fn test_process_latch_downloads_once() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    write_catalog(dir.path(), "bundled.yaml", &published_catalog(3, &[]));
    let latch = DownloadLatch::process();
    latch.reset();

    let calls = AtomicUsize::new(0);
    let counting = |_url: &str| -> Result<String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(CatalogError::Download("timeout".to_string()))
    };

    for _ in 0..2 {
        CatalogSelector::new(sources(dir.path()), &counting, DownloadLatch::process())
            .select()
            .unwrap();
    }
    let last = CatalogSelector::new(sources(dir.path()), &counting, DownloadLatch::default())
        .select()
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(last.stale_warning.unwrap().contains("already attempted"));
    latch.reset();
}

#[test]
#[serial]
fn test_session_lifecycle() {
    init_test_logging();
    let dir = TempDir::new().unwrap();
    let maintainer = write_catalog(
        dir.path(),
        "maintainer.yaml",
        &published_catalog(6, &[(2_000_001, "Traffic"), (2_000_002, "Roads")]),
    );
    let config = ModcatConfig {
        maintainer_catalog: Some(maintainer.clone()),
        cache_dir: Some(dir.path().join("cache")),
        changelog_path: Some(dir.path().join("changes.txt")),
        ..ModcatConfig::default()
    };

    let mut session = CatalogSession::open(config, NoDownload, DownloadLatch::new()).unwrap();
    assert_eq!(session.source(), CatalogSource::Maintainer);
    assert!(session.stale_warning().is_none());

    let rows = ManualRow::from_yaml(
        r#"
- category: mod
  command: set_source_url
  target: 2000001
  isExclusion: true
  payload: ["https://example.com/traffic"]
- category: compatibility
  command: add
  target: 2000001
  payload: ["2000002", "SameFunctionality", "both", "replace", "roads"]
- category: mod
  command: set_note
  target: 9999999
  payload: [missing]
"#,
    )
    .unwrap();
    let (report, outcome) = session.apply_manual(&rows, day(2026, 10, 19)).unwrap();

    assert_eq!(report.applied, 2);
    assert_eq!(report.failed.len(), 1);
    assert!(!outcome.is_noop());
    assert_eq!(session.catalog().version(), 7);

    let saved = session.save(None).unwrap();
    assert_eq!(saved, maintainer);
    let closed = session.close();

    let reloaded = Catalog::load(&maintainer).unwrap();
    assert_eq!(reloaded, closed);
    assert!(reloaded
        .mod_by_id(2_000_001)
        .unwrap()
        .is_excluded(ExclusionCategory::SourceUrl, None));
    assert_eq!(
        reloaded.compatibility(2_000_001, 2_000_002).unwrap().note,
        "both replace roads"
    );

    let log = std::fs::read_to_string(dir.path().join("changes.txt")).unwrap();
    assert!(log.starts_with("Catalog version 7, 2026-10-19 00:00:00 UTC"));
    assert!(log.contains("  Mod 2000001 Traffic: source URL changed"));
}
