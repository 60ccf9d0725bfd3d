use std::path::Path;
use std::sync::Arc;

use mediaplan_schema::{recommendation, Compatibility, SchemaError, SchemaMigrator, SchemaRegistry};
use mediaplan_types::{MediaPlan, Version};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::store::PlanStore;

/// A document brought up to the current schema version.
#[derive(Clone, Debug)]
pub struct PreparedDocument {
    pub document: Value,
    /// Version the document was stored in, as written.
    pub source_version: String,
    pub compatibility: Compatibility,
    /// Whether the document differs from what was stored.
    pub migrated: bool,
}

/// A typed plan plus where it came from.
#[derive(Clone, Debug)]
pub struct LoadedPlan {
    pub plan: MediaPlan,
    pub source_version: String,
    pub migrated: bool,
}

/// Loads plan documents, migrating older supported versions on the way in.
pub struct PlanLoader {
    registry: Arc<dyn SchemaRegistry>,
    migrator: SchemaMigrator,
}

pub(crate) fn schema_version(document: &Value) -> Option<&str> {
    document.get("meta")?.get("schema_version")?.as_str()
}

impl PlanLoader {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            migrator: SchemaMigrator::new(registry.clone()),
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    pub fn migrator(&self) -> &SchemaMigrator {
        &self.migrator
    }

    /// Bring `document` to the current schema version.
    ///
    /// Native and newer-minor documents are returned as they are. Older
    /// minors of the current major are re-stamped. Older supported majors go
    /// through the migrator. Everything else is rejected.
    pub fn prepare(&self, document: &Value) -> WorkspaceResult<PreparedDocument> {
        let source_version = schema_version(document)
            .ok_or_else(|| {
                SchemaError::MalformedDocument("meta.schema_version is missing".into())
            })?
            .to_string();
        let current = self.registry.current_version();
        let advice = recommendation(&source_version, current, &self.registry.supported_majors());

        let (document, migrated) = match advice.compatibility {
            Compatibility::Native | Compatibility::ForwardMinor => (document.clone(), false),
            Compatibility::BackwardCompatible => {
                let mut restamped = document.clone();
                restamped["meta"]["schema_version"] = Value::String(current.to_string());
                (restamped, true)
            }
            Compatibility::Deprecated => {
                let migrated = self
                    .migrator
                    .migrate(document, &source_version, &current.to_string())?;
                (migrated, true)
            }
            Compatibility::Unsupported => {
                // Surface format errors as such rather than as unsupported.
                Version::parse(&source_version).map_err(SchemaError::from)?;
                return Err(SchemaError::UnsupportedVersion {
                    version: source_version,
                    message: advice.message,
                }
                .into());
            }
        };

        debug!(
            version = %source_version,
            compatibility = %advice.compatibility,
            migrated,
            "prepared plan document"
        );
        Ok(PreparedDocument {
            document,
            source_version,
            compatibility: advice.compatibility,
            migrated,
        })
    }

    /// Prepare `document` and parse it into a [`MediaPlan`].
    pub fn load_document(&self, document: &Value) -> WorkspaceResult<LoadedPlan> {
        let prepared = self.prepare(document)?;
        let plan = MediaPlan::from_document(prepared.document)?;
        if prepared.migrated {
            info!(
                plan = %plan.meta.id,
                from = %prepared.source_version,
                to = %plan.meta.schema_version,
                "loaded plan with schema upgrade"
            );
        }
        Ok(LoadedPlan {
            plan,
            source_version: prepared.source_version,
            migrated: prepared.migrated,
        })
    }

    /// Read `path` from `store` and load it.
    pub fn load(&self, store: &dyn PlanStore, path: &Path) -> WorkspaceResult<LoadedPlan> {
        let document = store.read(path)?;
        if schema_version(&document).is_none() {
            return Err(WorkspaceError::MissingVersion {
                path: path.to_path_buf(),
            });
        }
        self.load_document(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaplan_schema::BundledSchemaRegistry;
    use serde_json::json;

    fn loader() -> PlanLoader {
        PlanLoader::new(Arc::new(BundledSchemaRegistry::new()))
    }

    fn plan(version: &str) -> Value {
        json!({
            "meta": {"id": "mp_1", "schema_version": version},
            "campaign": {"id": "c_1", "audience_gender": "Female", "audience_age_start": 18},
            "lineitems": [{"id": "li_1", "cost_total": 100}]
        })
    }

    #[test]
    fn current_plans_load_untouched() {
        let loaded = loader().load_document(&plan("v3.0")).unwrap();
        assert!(!loaded.migrated);
        assert_eq!(loaded.plan.meta.schema_version, "v3.0");
        assert_eq!(loaded.plan.lineitems.len(), 1);
    }

    #[test]
    fn v2_plans_are_migrated() {
        let loaded = loader().load_document(&plan("v2.0")).unwrap();
        assert!(loaded.migrated);
        assert_eq!(loaded.source_version, "v2.0");
        assert_eq!(loaded.plan.meta.schema_version, "3.0");
        assert_eq!(loaded.plan.campaign.target_audiences[0].name, "Females 18+");
        assert!(loaded
            .plan
            .meta
            .custom_properties
            .contains_key(mediaplan_types::MIGRATION_PROVENANCE_KEY));
    }

    #[test]
    fn older_minor_is_restamped() {
        let registry = BundledSchemaRegistry::with_versions(Version::new(3, 1), [2, 3]);
        let loader = PlanLoader::new(Arc::new(registry));
        let prepared = loader.prepare(&plan("3.0")).unwrap();
        assert_eq!(prepared.compatibility, Compatibility::BackwardCompatible);
        assert_eq!(prepared.document["meta"]["schema_version"], json!("3.1"));
    }

    #[test]
    fn unsupported_and_malformed_versions_are_rejected() {
        let err = loader().load_document(&plan("v1.0")).unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::Schema(SchemaError::UnsupportedVersion { .. })
        ));
        assert!(err.to_string().contains("SDK v2.x"));

        assert!(matches!(
            loader().load_document(&plan("latest")),
            Err(WorkspaceError::Schema(SchemaError::InvalidVersionFormat(_)))
        ));
        assert!(matches!(
            loader().load_document(&json!({"meta": {}})),
            Err(WorkspaceError::Schema(SchemaError::MalformedDocument(_)))
        ));
    }
}
