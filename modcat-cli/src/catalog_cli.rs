//! Catalog commands
//!
//! Every command opens a session through the catalog selector, so the same
//! catalog is shown, reconciled and saved regardless of where it came from.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

use modcat_core::catalog::{Catalog, Mod};
use modcat_core::ids;
use modcat_core::selector::{DownloadLatch, NoDownload};
use modcat_core::{CatalogSession, CollectedSet, ManualRow, ModcatConfig, ReconcileOutcome};

pub struct SessionOptions {
    pub config: ModcatConfig,
    pub offline: bool,
}

fn open_session(options: SessionOptions) -> Result<CatalogSession> {
    let SessionOptions { mut config, offline } = options;
    tracing::debug!(
        "Opening catalog session (offline: {}, download URL: {:?})",
        offline,
        config.download_url
    );
    let session = if offline {
        config.download_url = None;
        CatalogSession::open(config, NoDownload, DownloadLatch::process())
    } else {
        open_online(config)
    };
    let session = session.context("No usable catalog found, no report generated")?;

    if let Some(warning) = session.stale_warning() {
        eprintln!("Warning: {warning}");
    }
    Ok(session)
}

#[cfg(feature = "download")]
fn open_online(config: ModcatConfig) -> modcat_core::Result<CatalogSession> {
    let fetcher = modcat_core::selector::HttpFetcher::new(config.download_timeout_seconds);
    CatalogSession::open(config, fetcher, DownloadLatch::process())
}

#[cfg(not(feature = "download"))]
fn open_online(config: ModcatConfig) -> modcat_core::Result<CatalogSession> {
    CatalogSession::open(config, NoDownload, DownloadLatch::process())
}

fn print_table<T: Tabled>(rows: &[T]) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();
    println!("{table}");
}

fn name_of(catalog: &Catalog, id: u64) -> String {
    catalog
        .mod_by_id(id)
        .map(|m| m.name.clone())
        .or_else(|| catalog.group(id).map(|g| format!("[group] {}", g.name)))
        .unwrap_or_else(|| "?".to_string())
}

pub fn execute_select(options: SessionOptions) -> Result<()> {
    let session = open_session(options)?;
    let catalog = session.catalog();

    println!("Source:    {}", session.source());
    println!("Version:   {}", catalog.version());
    println!(
        "Updated:   {}",
        catalog.update_timestamp().format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("Mods:      {}", catalog.mods().len());
    println!("Groups:    {}", catalog.groups().len());
    println!("Authors:   {}", catalog.authors().len());
    Ok(())
}

#[derive(Tabled)]
struct ModRow {
    #[tabled(rename = "Id")]
    id: u64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Stability")]
    stability: String,
    #[tabled(rename = "Statuses")]
    statuses: String,
}

impl ModRow {
    fn new(catalog: &Catalog, m: &Mod) -> Self {
        let author = catalog
            .find_author(m.author_id, &m.author_handle)
            .map(|a| a.label())
            .unwrap_or_default();
        Self {
            id: m.id,
            name: m.name.clone(),
            author,
            stability: m.stability.to_string(),
            statuses: m
                .statuses
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

pub fn execute_show(options: SessionOptions, id: Option<u64>, json: bool) -> Result<()> {
    let session = open_session(options)?;
    let catalog = session.catalog();

    match id {
        None if json => {
            println!("{}", serde_json::to_string_pretty(catalog)?);
        }
        None => {
            println!(
                "Catalog version {} ({} mods, {} groups, {} compatibilities)",
                catalog.version(),
                catalog.mods().len(),
                catalog.groups().len(),
                catalog.compatibilities().len()
            );
            let rows: Vec<ModRow> = catalog.mods().iter().map(|m| ModRow::new(catalog, m)).collect();
            print_table(&rows);
        }
        Some(id) if ids::is_group_id(id) => {
            let group = catalog
                .group(id)
                .with_context(|| format!("Group {id} is not in the catalog"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(group)?);
            } else {
                println!("Group {} {}", group.id, group.name);
                let rows: Vec<ModRow> = group
                    .members
                    .iter()
                    .filter_map(|member| catalog.mod_by_id(*member))
                    .map(|m| ModRow::new(catalog, m))
                    .collect();
                print_table(&rows);
            }
        }
        Some(id) => {
            let m = catalog
                .mod_by_id(id)
                .with_context(|| format!("Mod {id} is not in the catalog"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(m)?);
            } else {
                print_mod(catalog, m);
            }
        }
    }
    Ok(())
}

fn print_mod(catalog: &Catalog, m: &Mod) {
    let ids_with_names = |list: &[u64]| {
        list.iter()
            .map(|id| format!("{id} {}", name_of(catalog, *id)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    println!("{} {}", m.id, m.name);
    println!("  Stability:  {} {}", m.stability, m.stability_note);
    if !m.source_url.is_empty() {
        println!("  Source:     {}", m.source_url);
    }
    if !m.required_mods.is_empty() {
        println!("  Requires:   {}", ids_with_names(&m.required_mods));
    }
    if !m.successors.is_empty() {
        println!("  Successors: {}", ids_with_names(&m.successors));
    }
    let needed_for = catalog.needed_for(m.id);
    if !needed_for.is_empty() {
        println!("  Needed for: {}", ids_with_names(&needed_for));
    }
    if let Some(group) = catalog.group_of(m.id) {
        println!("  Group:      {} {}", group.id, group.name);
    }
    if !m.exclusions.is_empty() {
        let frozen: Vec<String> = m
            .exclusions
            .iter()
            .map(|key| match key.sub_item {
                Some(sub) => format!("{} {}", key.category, sub),
                None => key.category.to_string(),
            })
            .collect();
        println!("  Frozen:     {}", frozen.join(", "));
    }
    for note in &m.change_notes {
        println!("  - {note}");
    }
}

#[derive(Tabled)]
struct CompatRow {
    #[tabled(rename = "Other")]
    other: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Note")]
    note: String,
    #[tabled(rename = "Stored by")]
    stored_by: String,
}

pub fn execute_compat(options: SessionOptions, id: u64, json: bool) -> Result<()> {
    let session = open_session(options)?;
    let catalog = session.catalog();

    let views = if ids::is_group_id(id) {
        catalog.for_group(id)
    } else {
        catalog.for_mod(id)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }
    if views.is_empty() {
        println!("No compatibilities recorded for {id} {}", name_of(catalog, id));
        return Ok(());
    }

    let rows: Vec<CompatRow> = views
        .iter()
        .map(|view| CompatRow {
            other: format!("{} {}", view.other, name_of(catalog, view.other)),
            status: view.status.to_string(),
            note: view.note.clone(),
            stored_by: if view.mirrored {
                "other side".to_string()
            } else {
                "this side".to_string()
            },
        })
        .collect();
    print_table(&rows);
    Ok(())
}

fn finish(
    mut session: CatalogSession,
    outcome: &ReconcileOutcome,
    dry_run: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    match outcome.render() {
        None => {
            println!(
                "No changes, catalog stays at version {}",
                session.catalog().version()
            );
            return Ok(());
        }
        Some(text) => print!("{text}"),
    }

    if dry_run {
        tracing::debug!("Dry run, skipping save");
        println!("Dry run, nothing saved");
        return Ok(());
    }
    let saved = session
        .save(output.as_deref())
        .context("Failed to save the updated catalog")?;
    println!("Saved to {}", saved.display());
    session.close();
    Ok(())
}

pub fn execute_reconcile(
    mut options: SessionOptions,
    collected: &Path,
    dry_run: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let collected = CollectedSet::load(collected)
        .with_context(|| format!("Failed to read collected set {}", collected.display()))?;
    tracing::info!(
        "Reconciling {} collected mods, {} groups, {} compatibilities",
        collected.mods.len(),
        collected.groups.len(),
        collected.compatibilities.len()
    );
    if dry_run {
        options.config.changelog_path = None;
    }

    let mut session = open_session(options)?;
    let outcome = session
        .reconcile(&collected, Utc::now())
        .context("Reconciliation failed")?;
    finish(session, &outcome, dry_run, output)
}

pub fn execute_apply(
    mut options: SessionOptions,
    rows: &Path,
    dry_run: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let rows = ManualRow::load_all(rows)
        .with_context(|| format!("Failed to read manual rows {}", rows.display()))?;
    tracing::info!("Applying {} manual rows", rows.len());
    if dry_run {
        options.config.changelog_path = None;
    }

    let mut session = open_session(options)?;
    let (report, outcome) = session
        .apply_manual(&rows, Utc::now())
        .context("Applying manual rows failed")?;

    for (index, error) in &report.failed {
        eprintln!("Row {} skipped: {}", index + 1, error);
    }
    println!("{} of {} rows applied", report.applied, rows.len());
    finish(session, &outcome, dry_run, output)
}

pub fn execute_validate(path: &Path) -> Result<()> {
    tracing::debug!("Validating catalog {}", path.display());
    let mut catalog = Catalog::load(path)
        .with_context(|| format!("Failed to load catalog {}", path.display()))?;

    let mut problems: Vec<String> = catalog
        .create_index()
        .into_iter()
        .map(|violation| violation.to_string())
        .collect();
    if let Some(reason) = catalog.invalid_reason() {
        problems.push(format!("not activatable: {reason}"));
    }

    if problems.is_empty() {
        println!(
            "Catalog version {} is valid ({} mods, {} authors)",
            catalog.version(),
            catalog.mods().len(),
            catalog.authors().len()
        );
        return Ok(());
    }

    for problem in &problems {
        println!("  - {problem}");
    }
    bail!("{} problem(s) found in {}", problems.len(), path.display())
}
