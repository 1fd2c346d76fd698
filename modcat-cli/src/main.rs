//! modcat - curated mod compatibility catalog
//!
//! Operator front-end: selects the active catalog, runs reconciliation
//! passes and manual overrides, and prints catalog contents.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use modcat_core::ModcatConfig;

mod catalog_cli;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "modcat",
    about = "Curated catalog of mods, their compatibility and their status",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[clap(long, global = true)]
    log_json: bool,

    /// Configuration file (defaults to .modcat/config.yaml, then the global config)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Project root used to find .modcat/config.yaml
    #[clap(long, default_value = ".", global = true)]
    project_dir: PathBuf,

    /// Never download a catalog
    #[clap(long, global = true)]
    offline: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Show which catalog would be activated and why
    Select,

    /// Show catalog contents
    Show {
        /// Show a single mod or group
        #[clap(long)]
        id: Option<u64>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// List compatibilities of a mod or group
    Compat {
        /// Mod or group id
        id: u64,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Merge a collected set into the active catalog
    Reconcile {
        /// Collected set (YAML, or JSON for .json files)
        collected: PathBuf,

        /// Print the change log without saving
        #[clap(long)]
        dry_run: bool,

        /// Save to this path instead of the configured catalog
        #[clap(long)]
        output: Option<PathBuf>,
    },

    /// Apply maintainer rows from a YAML file
    Apply {
        /// File with a list of manual rows
        rows: PathBuf,

        /// Print the change log without saving
        #[clap(long)]
        dry_run: bool,

        /// Save to this path instead of the configured catalog
        #[clap(long)]
        output: Option<PathBuf>,
    },

    /// Check a catalog file for structural problems
    Validate {
        /// Catalog file to check
        path: PathBuf,
    },
}

fn initialize_tracing(log_level: &LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr) // stdout carries command output
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, cli.log_json);

    let config = ModcatConfig::load(cli.config.as_deref(), &cli.project_dir)
        .context("Failed to load modcat configuration")?;
    let options = catalog_cli::SessionOptions {
        config,
        offline: cli.offline,
    };

    match cli.command {
        Command::Select => catalog_cli::execute_select(options),
        Command::Show { id, json } => catalog_cli::execute_show(options, id, json),
        Command::Compat { id, json } => catalog_cli::execute_compat(options, id, json),
        Command::Reconcile {
            collected,
            dry_run,
            output,
        } => catalog_cli::execute_reconcile(options, &collected, dry_run, output),
        Command::Apply {
            rows,
            dry_run,
            output,
        } => catalog_cli::execute_apply(options, &rows, dry_run, output),
        Command::Validate { path } => catalog_cli::execute_validate(&path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "modcat",
            "reconcile",
            "collected.yaml",
            "--dry-run",
            "--log-level",
            "debug",
            "--offline",
        ])
        .unwrap();
        assert!(cli.offline);
        assert!(matches!(
            cli.command,
            Command::Reconcile { dry_run: true, .. }
        ));
    }
}
