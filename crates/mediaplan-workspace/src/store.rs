//! Plan storage.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{WorkspaceError, WorkspaceResult};

/// Storage for plan documents addressed by relative path.
pub trait PlanStore: Send + Sync {
    /// Relative paths of every stored plan, sorted.
    fn list(&self) -> WorkspaceResult<Vec<PathBuf>>;

    fn read(&self, path: &Path) -> WorkspaceResult<Value>;

    /// Store `document` at `path`, replacing any existing plan.
    fn write(&self, path: &Path, document: &Value) -> WorkspaceResult<()>;
}

/// JSON files under a local directory.
#[derive(Clone, Debug)]
pub struct LocalJsonStore {
    root: PathBuf,
}

impl LocalJsonStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl PlanStore for LocalJsonStore {
    fn list(&self) -> WorkspaceResult<Vec<PathBuf>> {
        if !self.root.exists() {
            debug!(root = %self.root.display(), "plan directory does not exist");
            return Ok(Vec::new());
        }

        let mut plans = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let is_json = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            if !is_json {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                plans.push(rel.to_path_buf());
            }
        }
        plans.sort();
        Ok(plans)
    }

    fn read(&self, path: &Path) -> WorkspaceResult<Value> {
        let full = self.resolve(path);
        let bytes = fs::read(&full).map_err(|e| WorkspaceError::io(&full, e))?;
        serde_json::from_slice(&bytes).map_err(|source| WorkspaceError::Json { path: full, source })
    }

    fn write(&self, path: &Path, document: &Value) -> WorkspaceResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| WorkspaceError::io(parent, e))?;
        }
        let mut bytes = serde_json::to_vec_pretty(document).map_err(|source| WorkspaceError::Json {
            path: full.clone(),
            source,
        })?;
        bytes.push(b'\n');

        // Write-then-rename so a failed write never truncates the plan.
        let staging = full.with_extension("json.tmp");
        fs::write(&staging, &bytes).map_err(|e| WorkspaceError::io(&staging, e))?;
        fs::rename(&staging, &full).map_err(|e| WorkspaceError::io(&full, e))?;
        debug!(path = %full.display(), "wrote plan");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_finds_nested_json_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalJsonStore::new(dir.path());
        store.write(Path::new("b.json"), &json!({"id": "b"})).unwrap();
        store.write(Path::new("q3/a.json"), &json!({"id": "a"})).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a plan").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed, vec![PathBuf::from("b.json"), PathBuf::from("q3/a.json")]);
        assert_eq!(store.read(Path::new("q3/a.json")).unwrap(), json!({"id": "a"}));
    }

    #[test]
    fn missing_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalJsonStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn read_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = LocalJsonStore::new(dir.path());

        let err = store.read(Path::new("broken.json")).unwrap_err();
        assert!(matches!(err, WorkspaceError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
        assert!(matches!(
            store.read(Path::new("missing.json")),
            Err(WorkspaceError::Io { .. })
        ));
    }
}
