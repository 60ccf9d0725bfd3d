//! Subcommand implementations

pub mod formula;
pub mod migrate;
pub mod upgrade;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use mediaplan_workspace::{LocalJsonStore, PlanStore, ToolkitConfig};
use serde_json::Value;

use crate::output::OutputFormat;

/// State shared by every command
pub struct Context {
    pub config: ToolkitConfig,
    pub format: OutputFormat,
}

fn split(path: &Path) -> anyhow::Result<(LocalJsonStore, PathBuf)> {
    let file = path
        .file_name()
        .with_context(|| format!("{} is not a file path", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((LocalJsonStore::new(dir), PathBuf::from(file)))
}

/// Read a plan document from an arbitrary path.
pub fn read_document(path: &Path) -> anyhow::Result<Value> {
    let (store, file) = split(path)?;
    Ok(store.read(&file)?)
}

/// Write a plan document to `out`, or back to `path` when `out` is absent.
pub fn write_document(
    path: &Path,
    out: Option<&Path>,
    document: &Value,
) -> anyhow::Result<PathBuf> {
    let target = out.unwrap_or(path);
    let (store, file) = split(target)?;
    store.write(&file, document)?;
    Ok(target.to_path_buf())
}
