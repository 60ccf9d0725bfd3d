//! Workspace-wide schema upgrade.
//!
//! An upgrade runs in three phases:
//!
//! 1. **Pre-flight**: every plan's version is checked. Any plan whose
//!    version is malformed, missing or outside the supported majors stops
//!    the whole upgrade before anything is written.
//! 2. **Backup**: every plan is copied into a fresh run directory under the
//!    backup root.
//! 3. **Migrate**: each plan is brought to the current version and written
//!    back. A plan that fails is recorded and the run continues.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use mediaplan_schema::{classify, Compatibility, SchemaRegistry};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::loader::{schema_version, PlanLoader};
use crate::store::{LocalJsonStore, PlanStore};

#[derive(Clone, Debug, Default)]
pub struct UpgradeOptions {
    /// Report what would change without writing anything.
    pub dry_run: bool,
    /// Directory under which a per-run backup directory is created.
    /// `None` disables backups.
    pub backup_root: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedPlan {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub dry_run: bool,
    pub target_version: String,
    pub scanned: usize,
    /// Plans migrated, or that would be in a dry run.
    pub migrated: Vec<PathBuf>,
    pub already_current: Vec<PathBuf>,
    pub failed: Vec<FailedPlan>,
    pub backup_dir: Option<PathBuf>,
}

impl UpgradeReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct WorkspaceUpgrader {
    store: Arc<dyn PlanStore>,
    loader: PlanLoader,
}

impl WorkspaceUpgrader {
    pub fn new(store: Arc<dyn PlanStore>, registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            store,
            loader: PlanLoader::new(registry),
        }
    }

    pub fn upgrade(&self, options: &UpgradeOptions) -> WorkspaceResult<UpgradeReport> {
        let registry = self.loader.registry();
        let current = registry.current_version();
        let majors = registry.supported_majors();
        let plans = self.store.list()?;
        info!(
            plans = plans.len(),
            target = %current,
            dry_run = options.dry_run,
            "starting workspace upgrade"
        );

        let mut report = UpgradeReport {
            dry_run: options.dry_run,
            target_version: current.to_string(),
            scanned: plans.len(),
            ..Default::default()
        };

        // Pre-flight.
        let mut documents = Vec::with_capacity(plans.len());
        let mut unsupported = Vec::new();
        for path in plans {
            let document = match self.store.read(&path) {
                Ok(document) => document,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable plan");
                    report.failed.push(FailedPlan {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            let compatibility = schema_version(&document)
                .map_or(Compatibility::Unsupported, |v| classify(v, current, &majors));
            if compatibility == Compatibility::Unsupported {
                warn!(
                    path = %path.display(),
                    version = schema_version(&document).unwrap_or("<missing>"),
                    "plan has an unsupported schema version"
                );
                unsupported.push(path);
                continue;
            }
            documents.push((path, document, compatibility));
        }
        if !unsupported.is_empty() {
            error!(files = unsupported.len(), "upgrade aborted by unsupported plans");
            return Err(WorkspaceError::UnsupportedPlans { files: unsupported });
        }

        // Backup.
        if !options.dry_run {
            if let Some(root) = &options.backup_root {
                let run = format!(
                    "upgrade_{}_{}_{}",
                    current.tag(),
                    Utc::now().format("%Y%m%d_%H%M%S"),
                    &Uuid::new_v4().simple().to_string()[..8]
                );
                let backup = LocalJsonStore::new(root.join(run));
                for (path, document, _) in &documents {
                    backup.write(path, document)?;
                }
                info!(dir = %backup.root().display(), plans = documents.len(), "backed up plans");
                report.backup_dir = Some(backup.root().to_path_buf());
            }
        }

        // Migrate.
        for (path, document, compatibility) in documents {
            if matches!(compatibility, Compatibility::Native | Compatibility::ForwardMinor) {
                report.already_current.push(path);
                continue;
            }
            let result = self.loader.prepare(&document).and_then(|prepared| {
                if !options.dry_run {
                    self.store.write(&path, &prepared.document)?;
                }
                Ok(())
            });
            match result {
                Ok(()) => report.migrated.push(path),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "plan upgrade failed");
                    report.failed.push(FailedPlan {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            migrated = report.migrated.len(),
            already_current = report.already_current.len(),
            failed = report.failed.len(),
            "workspace upgrade finished"
        );
        Ok(report)
    }
}
