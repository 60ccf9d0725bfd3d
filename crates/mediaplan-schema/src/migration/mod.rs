//! Schema version migration.
//!
//! Migrations are a table of [`MigrationStep`]s keyed by `(from, to)`,
//! built once when the migrator is constructed. Multi-hop migrations follow
//! the shortest chain of registered steps. Plans from majors below the
//! supported range are rejected outright rather than chained.

mod v2_to_v3;

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use mediaplan_types::{Version, MIGRATION_PROVENANCE_KEY};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::compatibility::{classify, legacy_rejection, Compatibility};
use crate::error::{SchemaError, SchemaResult};
use crate::registry::SchemaRegistry;

pub use v2_to_v3::V2ToV3;

// ── Migration Step ──────────────────────────────────────────────────

/// One registered version-to-version document transformation.
pub trait MigrationStep: Send + Sync {
    fn from_version(&self) -> Version;

    fn to_version(&self) -> Version;

    /// Transform `document`, returning a new document. The input is never
    /// modified.
    fn apply(&self, document: &Value) -> SchemaResult<Value>;

    /// Short human-readable summary.
    fn description(&self) -> &str;
}

// ── Compatibility Report ────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    Direct,
    MultiStep,
}

/// Result of [`SchemaMigrator::check_compatibility`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationCompatibility {
    pub compatible: bool,
    pub normalized_from: Option<String>,
    pub normalized_to: Option<String>,
    pub path: Vec<Version>,
    pub migration_type: Option<MigrationType>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

// ── Schema Migrator ─────────────────────────────────────────────────

/// Applies registered migration steps to plan documents.
pub struct SchemaMigrator {
    registry: Arc<dyn SchemaRegistry>,
    steps: BTreeMap<(Version, Version), Arc<dyn MigrationStep>>,
}

impl SchemaMigrator {
    /// Migrator with the built-in steps registered.
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        let mut migrator = Self {
            registry,
            steps: BTreeMap::new(),
        };
        let v2_to_v3: Arc<dyn MigrationStep> = Arc::new(V2ToV3);
        migrator
            .steps
            .insert((v2_to_v3.from_version(), v2_to_v3.to_version()), v2_to_v3);
        migrator
    }

    pub fn registry(&self) -> &Arc<dyn SchemaRegistry> {
        &self.registry
    }

    fn min_supported_major(&self) -> u32 {
        self.registry
            .supported_majors()
            .into_iter()
            .next()
            .unwrap_or(self.registry.current_version().major)
    }

    /// Register an additional step.
    ///
    /// Steps starting below the supported majors are refused.
    pub fn register(&mut self, step: Arc<dyn MigrationStep>) -> SchemaResult<()> {
        let from = step.from_version();
        if from.major < self.min_supported_major() {
            return Err(SchemaError::UnsupportedVersion {
                version: from.to_string(),
                message: legacy_rejection(&from.to_string(), from.major),
            });
        }
        debug!(from = %from, to = %step.to_version(), "registered migration step");
        self.steps.insert((from, step.to_version()), step);
        Ok(())
    }

    /// Whether a single registered step leads from `from` to `to`.
    pub fn can_migrate(&self, from: &str, to: &str) -> bool {
        match (Version::parse(from), Version::parse(to)) {
            (Ok(f), Ok(t)) => self.steps.contains_key(&(f, t)),
            _ => false,
        }
    }

    /// Shortest chain of versions leading from `from` to `to`.
    ///
    /// The start version is not included. Empty when the versions are equal
    /// or when nothing connects them.
    pub fn find_path(&self, from: &str, to: &str) -> SchemaResult<Vec<Version>> {
        let from = Version::parse(from)?;
        let to = Version::parse(to)?;
        Ok(self.path_between(from, to))
    }

    fn path_between(&self, from: Version, to: Version) -> Vec<Version> {
        if from == to {
            return Vec::new();
        }

        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back((from, Vec::new()));

        while let Some((current, path)) = queue.pop_front() {
            for &(_, next) in self.steps.keys().filter(|(f, _)| *f == current) {
                if !visited.insert(next) {
                    continue;
                }
                let mut extended: Vec<Version> = path.clone();
                extended.push(next);
                if next == to {
                    return extended;
                }
                queue.push_back((next, extended));
            }
        }
        Vec::new()
    }

    fn ensure_supported(&self, raw: &str, version: Version) -> SchemaResult<()> {
        let majors = self.registry.supported_majors();
        if majors.contains(&version.major) {
            return Ok(());
        }
        let message = if version.major < self.min_supported_major() {
            legacy_rejection(raw, version.major)
        } else {
            let listed: Vec<String> = majors.iter().map(|m| format!("v{m}.x")).collect();
            format!("supported majors are {}", listed.join(", "))
        };
        Err(SchemaError::UnsupportedVersion {
            version: raw.to_string(),
            message,
        })
    }

    /// Migrate `document` from `from` to `to`.
    ///
    /// The caller's document is never modified. On success the result's
    /// `meta.schema_version` is `to` exactly as given and
    /// `meta.custom_properties.schema_migration` records the migration.
    pub fn migrate(&self, document: &Value, from: &str, to: &str) -> SchemaResult<Value> {
        let from_version = Version::parse(from)?;
        let to_version = Version::parse(to)?;
        self.ensure_supported(from, from_version)?;
        self.ensure_supported(to, to_version)?;

        if from_version == to_version {
            debug!(version = %from_version, "no migration needed");
            return Ok(document.clone());
        }
        if !document.is_object() {
            return Err(SchemaError::MalformedDocument(
                "plan document must be a JSON object".into(),
            ));
        }

        let path = self.path_between(from_version, to_version);
        if path.is_empty() {
            return Err(SchemaError::NoMigrationPath {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        let mut current = document.clone();
        let mut cursor = from_version;
        for next in path {
            let step = self.steps.get(&(cursor, next)).ok_or_else(|| {
                SchemaError::NoMigrationPath {
                    from: cursor.to_string(),
                    to: next.to_string(),
                }
            })?;
            debug!(
                from = %cursor,
                to = %next,
                step = step.description(),
                "applying migration step"
            );
            current = step
                .apply(&current)
                .map_err(|e| SchemaError::MigrationFailed {
                    from: cursor.to_string(),
                    to: next.to_string(),
                    reason: e.to_string(),
                })?;
            set_schema_version(&mut current, &next.to_string())?;
            cursor = next;
        }

        set_schema_version(&mut current, to)?;
        record_provenance(&mut current, from_version, to_version)?;
        info!(from, to, "migrated plan document");
        Ok(current)
    }

    /// Reachable target versions for every version that appears in a step.
    pub fn supported_paths(&self) -> BTreeMap<Version, Vec<Version>> {
        let min_major = self.min_supported_major();
        let versions: BTreeSet<Version> = self
            .steps
            .keys()
            .flat_map(|(f, t)| [*f, *t])
            .filter(|v| v.major >= min_major)
            .collect();

        let mut paths = BTreeMap::new();
        for source in &versions {
            let reachable: Vec<Version> = versions
                .iter()
                .filter(|target| *target != source)
                .filter(|target| !self.path_between(*source, **target).is_empty())
                .copied()
                .collect();
            if !reachable.is_empty() {
                paths.insert(*source, reachable);
            }
        }
        paths
    }

    /// Describe whether and how `from` can be migrated to `to`.
    pub fn check_compatibility(&self, from: &str, to: &str) -> MigrationCompatibility {
        let mut report = MigrationCompatibility::default();
        let (from_version, to_version) = match (Version::parse(from), Version::parse(to)) {
            (Ok(f), Ok(t)) => (f, t),
            (Err(e), _) | (_, Err(e)) => {
                report.errors.push(e.to_string());
                return report;
            }
        };
        report.normalized_from = Some(from_version.to_string());
        report.normalized_to = Some(to_version.to_string());

        let current = self.registry.current_version();
        let majors = self.registry.supported_majors();
        if let Err(e) = self.ensure_supported(from, from_version) {
            report.errors.push(e.to_string());
            return report;
        }
        match classify(to, current, &majors) {
            Compatibility::Unsupported => {
                report
                    .errors
                    .push(format!("target version {to} is not supported"));
            }
            Compatibility::ForwardMinor => {
                report
                    .warnings
                    .push(format!("target version {to} is newer than {current}"));
            }
            _ => {}
        }
        if classify(from, current, &majors) == Compatibility::Deprecated {
            report
                .warnings
                .push(format!("source version {from} is deprecated"));
        }

        if from_version == to_version {
            report.compatible = report.errors.is_empty();
            return report;
        }

        let path = self.path_between(from_version, to_version);
        if path.is_empty() {
            report
                .errors
                .push(format!("no migration path from {from} to {to}"));
        } else if path.len() == 1 {
            report.migration_type = Some(MigrationType::Direct);
        } else {
            report.migration_type = Some(MigrationType::MultiStep);
            report
                .warnings
                .push(format!("migration requires {} steps", path.len()));
        }
        report.path = path;
        report.compatible = report.errors.is_empty();
        report
    }
}

// ── Document helpers ────────────────────────────────────────────────

fn meta_mut(document: &mut Value) -> SchemaResult<&mut Map<String, Value>> {
    let root = document
        .as_object_mut()
        .ok_or_else(|| {
            SchemaError::MalformedDocument("plan document must be a JSON object".into())
        })?;
    root.entry("meta")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| SchemaError::MalformedDocument("'meta' must be an object".into()))
}

fn set_schema_version(document: &mut Value, version: &str) -> SchemaResult<()> {
    meta_mut(document)?.insert("schema_version".into(), Value::String(version.to_string()));
    Ok(())
}

/// Write `meta.custom_properties.schema_migration`, keeping every other
/// custom property.
fn record_provenance(document: &mut Value, from: Version, to: Version) -> SchemaResult<()> {
    let meta = meta_mut(document)?;
    let properties = meta
        .entry("custom_properties")
        .or_insert_with(|| Value::Object(Map::new()));
    if properties.is_null() {
        *properties = Value::Object(Map::new());
    }
    let properties = properties.as_object_mut().ok_or_else(|| {
        SchemaError::MalformedDocument("'meta.custom_properties' must be an object".into())
    })?;
    properties.insert(
        MIGRATION_PROVENANCE_KEY.into(),
        json!({
            "from_version": from.to_string(),
            "to_version": to.to_string(),
            "migrated_at": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BundledSchemaRegistry;

    fn migrator() -> SchemaMigrator {
        SchemaMigrator::new(Arc::new(BundledSchemaRegistry::new()))
    }

    /// Test-only step that tags the document with its hop.
    struct Tagging {
        from: Version,
        to: Version,
    }

    impl MigrationStep for Tagging {
        fn from_version(&self) -> Version {
            self.from
        }

        fn to_version(&self) -> Version {
            self.to
        }

        fn apply(&self, document: &Value) -> SchemaResult<Value> {
            let mut out = document.clone();
            out["campaign"][format!("hop_{}", self.to.minor)] = json!(true);
            Ok(out)
        }

        fn description(&self) -> &str {
            "tagging"
        }
    }

    struct Failing;

    impl MigrationStep for Failing {
        fn from_version(&self) -> Version {
            Version::new(3, 0)
        }

        fn to_version(&self) -> Version {
            Version::new(3, 1)
        }

        fn apply(&self, _document: &Value) -> SchemaResult<Value> {
            Err(SchemaError::MalformedDocument("boom".into()))
        }

        fn description(&self) -> &str {
            "failing"
        }
    }

    fn doc(version: &str) -> Value {
        json!({
            "meta": {"id": "mp_1", "schema_version": version, "created_at": "2024-06-01T00:00:00Z"},
            "campaign": {"id": "c_1"},
            "lineitems": []
        })
    }

    #[test]
    fn builtin_direct_path() {
        let m = migrator();
        assert!(m.can_migrate("v2.0", "3.0"));
        assert!(!m.can_migrate("3.0", "2.0"));
        assert!(!m.can_migrate("bad", "3.0"));
        assert_eq!(m.find_path("2.0", "v3.0").unwrap(), vec![Version::new(3, 0)]);
        assert!(m.find_path("3.0", "3.0").unwrap().is_empty());
        assert!(m.find_path("3.0", "2.0").unwrap().is_empty());
        assert!(m.find_path("x", "3.0").is_err());
    }

    #[test]
    fn multi_hop_path_threads_documents() {
        let mut m = migrator();
        m.register(Arc::new(Tagging {
            from: Version::new(3, 0),
            to: Version::new(3, 1),
        }))
        .unwrap();
        assert_eq!(
            m.find_path("2.0", "3.1").unwrap(),
            vec![Version::new(3, 0), Version::new(3, 1)]
        );

        let out = m.migrate(&doc("v2.0"), "v2.0", "v3.1").unwrap();
        assert_eq!(out["meta"]["schema_version"], json!("v3.1"));
        assert_eq!(out["campaign"]["hop_1"], json!(true));
        let provenance = &out["meta"]["custom_properties"]["schema_migration"];
        assert_eq!(provenance["from_version"], json!("2.0"));
        assert_eq!(provenance["to_version"], json!("3.1"));

        let report = m.check_compatibility("2.0", "3.1");
        assert!(report.compatible);
        assert_eq!(report.migration_type, Some(MigrationType::MultiStep));
        assert!(!report.warnings.is_empty());

        let paths = m.supported_paths();
        assert_eq!(
            paths[&Version::new(2, 0)],
            vec![Version::new(3, 0), Version::new(3, 1)]
        );
    }

    #[test]
    fn legacy_steps_cannot_be_registered() {
        let mut m = migrator();
        let result = m.register(Arc::new(Tagging {
            from: Version::new(1, 0),
            to: Version::new(2, 0),
        }));
        assert!(matches!(result, Err(SchemaError::UnsupportedVersion { .. })));
    }

    #[test]
    fn failing_step_leaves_input_untouched() {
        let mut m = migrator();
        m.register(Arc::new(Failing)).unwrap();
        let input = doc("3.0");
        let result = m.migrate(&input, "3.0", "3.1");
        assert!(matches!(result, Err(SchemaError::MigrationFailed { .. })));
        assert_eq!(input, doc("3.0"));
    }

    #[test]
    fn unsupported_and_unconnected_versions() {
        let m = migrator();
        let v1 = m.migrate(&doc("v1.0"), "1.0", "3.0").unwrap_err();
        match v1 {
            SchemaError::UnsupportedVersion { message, .. } => {
                assert!(message.contains("SDK v2.x"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            m.migrate(&doc("3.0"), "3.0", "4.0"),
            Err(SchemaError::UnsupportedVersion { .. })
        ));
        assert!(matches!(
            m.migrate(&doc("3.0"), "3.0", "2.0"),
            Err(SchemaError::NoMigrationPath { .. })
        ));
        assert!(matches!(
            m.migrate(&doc("3.0"), "three", "2.0"),
            Err(SchemaError::InvalidVersionFormat(_))
        ));
        assert!(matches!(
            m.migrate(&json!([1, 2]), "2.0", "3.0"),
            Err(SchemaError::MalformedDocument(_))
        ));
    }

    #[test]
    fn compatibility_report_for_legacy_source() {
        let report = migrator().check_compatibility("v0.0", "3.0");
        assert!(!report.compatible);
        assert!(report.errors[0].contains("SDK v1.x"));

        let direct = migrator().check_compatibility("2.0", "3.0");
        assert!(direct.compatible);
        assert_eq!(direct.migration_type, Some(MigrationType::Direct));
        assert!(direct.warnings.iter().any(|w| w.contains("deprecated")));
    }
}
