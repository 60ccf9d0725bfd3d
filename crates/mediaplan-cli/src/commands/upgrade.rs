//! Workspace upgrade

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use mediaplan_workspace::{LocalJsonStore, UpgradeOptions, WorkspaceUpgrader};

use super::Context;
use crate::output::{print_error, print_field, print_json, print_success, OutputFormat};

#[derive(Args)]
pub struct UpgradeArgs {
    /// Workspace root (overrides configuration)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Show what would be upgraded without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Skip backing up plans before upgrading
    #[arg(long)]
    pub no_backup: bool,
}

pub fn execute(args: UpgradeArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut config = ctx.config.clone();
    if let Some(root) = args.root {
        config.workspace.root = root;
    }

    let store = Arc::new(LocalJsonStore::new(config.plans_path()));
    let upgrader = WorkspaceUpgrader::new(store, config.registry()?);
    let options = UpgradeOptions {
        dry_run: args.dry_run,
        backup_root: (config.workspace.backup && !args.no_backup).then(|| config.backup_path()),
    };
    let report = upgrader.upgrade(&options)?;

    match ctx.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            let heading = if report.dry_run { "upgrade (dry run)" } else { "upgrade" };
            println!("{} to schema {}", heading, report.target_version);
            print_field("scanned", report.scanned);
            print_field("migrated", report.migrated.len());
            print_field("already current", report.already_current.len());
            print_field("failed", report.failed.len());
            if let Some(dir) = &report.backup_dir {
                print_field("backup", dir.display());
            }
            for failure in &report.failed {
                print_error(&format!("{}: {}", failure.path.display(), failure.error));
            }
            if report.is_success() {
                print_success("workspace upgraded");
            }
        }
    }

    if !report.is_success() {
        anyhow::bail!("{} plan(s) could not be upgraded", report.failed.len());
    }
    Ok(())
}
