//! Schema registry: supported versions and per-section schema documents.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use mediaplan_types::{FormulaType, Version};
use serde::Serialize;

use crate::error::{SchemaError, SchemaResult};

// ── Schema Kind ─────────────────────────────────────────────────────

/// Section of a plan document a schema describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    MediaPlan,
    Meta,
    Campaign,
    LineItem,
    Dictionary,
    TargetAudience,
    TargetLocation,
    MetricFormula,
}

impl SchemaKind {
    pub const ALL: [SchemaKind; 8] = [
        SchemaKind::MediaPlan,
        SchemaKind::Meta,
        SchemaKind::Campaign,
        SchemaKind::LineItem,
        SchemaKind::Dictionary,
        SchemaKind::TargetAudience,
        SchemaKind::TargetLocation,
        SchemaKind::MetricFormula,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MediaPlan => "mediaplan",
            Self::Meta => "meta",
            Self::Campaign => "campaign",
            Self::LineItem => "lineitem",
            Self::Dictionary => "dictionary",
            Self::TargetAudience => "target_audience",
            Self::TargetLocation => "target_location",
            Self::MetricFormula => "metric_formula",
        }
    }
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown schema kind '{s}'"))
    }
}

// ── Schema Document ─────────────────────────────────────────────────

/// What one version of the schema requires of one document section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchemaDocument {
    pub version: Version,
    pub kind: SchemaKind,
    /// Fields that must be present and non-null.
    pub required: Vec<String>,
    /// Fields restricted to a fixed set of string values.
    pub enums: BTreeMap<String, Vec<String>>,
    /// Fields still accepted but superseded in this version.
    pub deprecated: Vec<String>,
}

impl SchemaDocument {
    fn new(version: Version, kind: SchemaKind) -> Self {
        Self {
            version,
            kind,
            required: Vec::new(),
            enums: BTreeMap::new(),
            deprecated: Vec::new(),
        }
    }

    fn required(mut self, fields: &[&str]) -> Self {
        self.required = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    fn enumerated(mut self, field: &str, values: &[&str]) -> Self {
        self.enums.insert(
            field.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    fn deprecated(mut self, fields: &[&str]) -> Self {
        self.deprecated = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn allowed_values(&self, field: &str) -> Option<&[String]> {
        self.enums.get(field).map(Vec::as_slice)
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Source of schema versions and schema documents.
pub trait SchemaRegistry: Send + Sync {
    /// Version new plans are written in.
    fn current_version(&self) -> Version;

    /// Every version a schema document exists for.
    fn supported_versions(&self) -> Vec<Version>;

    /// Major versions plans may be read from.
    fn supported_majors(&self) -> BTreeSet<u32> {
        self.supported_versions().iter().map(|v| v.major).collect()
    }

    /// Whether `version` parses and its major is supported.
    fn is_version_supported(&self, version: &str) -> bool {
        Version::is_supported(version, &self.supported_majors())
    }

    /// Schema for one section of a plan at `version`.
    fn get_schema(&self, kind: SchemaKind, version: &str) -> SchemaResult<SchemaDocument>;
}

const CHANNELS: &[&str] = &[
    "social", "search", "display", "video", "audio", "tv", "ooh", "print", "other",
];
const GENDERS: &[&str] = &["Male", "Female", "Any"];
const V2_LOCATION_TYPES: &[&str] = &["Country", "State"];
const V3_LOCATION_TYPES: &[&str] = &[
    "Country", "State", "DMA", "County", "Postcode", "Radius", "POI",
];
const V2_AUDIENCE_FIELDS: &[&str] = &[
    "audience_name",
    "audience_age_start",
    "audience_age_end",
    "audience_gender",
    "audience_interests",
    "location_type",
    "locations",
];

/// Registry with the schema definitions compiled into the binary.
#[derive(Clone, Debug)]
pub struct BundledSchemaRegistry {
    current: Version,
    supported_majors: BTreeSet<u32>,
}

impl BundledSchemaRegistry {
    /// Bundled definitions: v2.0 and v3.0, current v3.0.
    pub fn new() -> Self {
        Self {
            current: Version::new(3, 0),
            supported_majors: [2, 3].into_iter().collect(),
        }
    }

    /// Restrict or re-point the registry, e.g. from configuration.
    ///
    /// Majors without bundled definitions are ignored.
    pub fn with_versions(
        current: Version,
        supported_majors: impl IntoIterator<Item = u32>,
    ) -> Self {
        let bundled = Self::new();
        Self {
            current,
            supported_majors: supported_majors
                .into_iter()
                .filter(|m| bundled.supported_majors.contains(m))
                .collect(),
        }
    }

    fn build(&self, kind: SchemaKind, version: Version) -> Option<SchemaDocument> {
        let doc = SchemaDocument::new(version, kind);
        let v3 = version.major == 3;
        let formula_types: Vec<&str> = FormulaType::ALL.iter().map(|t| t.as_str()).collect();

        let schema = match kind {
            SchemaKind::MediaPlan => doc.required(&["meta", "campaign", "lineitems"]),
            SchemaKind::Meta => doc.required(&["id", "schema_version", "created_by_name"]),
            SchemaKind::Campaign if v3 => doc
                .required(&["id", "name", "objective", "start_date", "end_date", "budget_total"])
                .deprecated(V2_AUDIENCE_FIELDS),
            SchemaKind::Campaign => doc
                .required(&["id", "name", "objective", "start_date", "end_date", "budget_total"])
                .enumerated("audience_gender", GENDERS)
                .enumerated("location_type", V2_LOCATION_TYPES),
            SchemaKind::LineItem => doc
                .required(&["id", "name", "start_date", "end_date", "cost_total"])
                .enumerated("channel", CHANNELS),
            SchemaKind::Dictionary if v3 => doc.deprecated(&["custom_dimensions"]),
            SchemaKind::Dictionary => doc,
            SchemaKind::TargetAudience if v3 => doc
                .required(&["name"])
                .enumerated("demo_gender", GENDERS),
            SchemaKind::TargetLocation if v3 => doc
                .required(&["name"])
                .enumerated("location_type", V3_LOCATION_TYPES),
            SchemaKind::MetricFormula if v3 => doc
                .required(&["formula_type"])
                .enumerated("formula_type", &formula_types),
            SchemaKind::TargetAudience | SchemaKind::TargetLocation | SchemaKind::MetricFormula => {
                return None
            }
        };
        Some(schema)
    }
}

impl Default for BundledSchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry for BundledSchemaRegistry {
    fn current_version(&self) -> Version {
        self.current
    }

    fn supported_versions(&self) -> Vec<Version> {
        self.supported_majors
            .iter()
            .map(|major| Version::new(*major, 0))
            .collect()
    }

    fn supported_majors(&self) -> BTreeSet<u32> {
        self.supported_majors.clone()
    }

    fn get_schema(&self, kind: SchemaKind, version: &str) -> SchemaResult<SchemaDocument> {
        let parsed = Version::parse(version)?;
        let not_found = || SchemaError::SchemaNotFound {
            kind: kind.to_string(),
            version: parsed.to_string(),
        };
        if !self.supported_versions().contains(&parsed) {
            return Err(not_found());
        }
        self.build(kind, parsed).ok_or_else(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_versions() {
        let registry = BundledSchemaRegistry::new();
        assert_eq!(registry.current_version(), Version::new(3, 0));
        assert_eq!(
            registry.supported_versions(),
            vec![Version::new(2, 0), Version::new(3, 0)]
        );
        assert!(registry.is_version_supported("v2.0"));
        assert!(registry.is_version_supported("3.1"));
        assert!(!registry.is_version_supported("1.0"));
        assert!(!registry.is_version_supported("bogus"));
    }

    #[test]
    fn v3_campaign_lists_deprecated_fields() {
        let registry = BundledSchemaRegistry::new();
        let schema = registry.get_schema(SchemaKind::Campaign, "v3.0").unwrap();
        assert!(schema.deprecated.iter().any(|f| f == "audience_name"));
        assert!(schema.required.iter().any(|f| f == "budget_total"));

        let v2 = registry.get_schema(SchemaKind::Campaign, "2.0").unwrap();
        assert_eq!(
            v2.allowed_values("location_type").unwrap(),
            ["Country".to_string(), "State".to_string()]
        );
    }

    #[test]
    fn unknown_schemas_are_not_found() {
        let registry = BundledSchemaRegistry::new();
        assert!(matches!(
            registry.get_schema(SchemaKind::TargetAudience, "2.0"),
            Err(SchemaError::SchemaNotFound { .. })
        ));
        assert!(matches!(
            registry.get_schema(SchemaKind::Meta, "1.0"),
            Err(SchemaError::SchemaNotFound { .. })
        ));
        assert!(matches!(
            registry.get_schema(SchemaKind::Meta, "3.5"),
            Err(SchemaError::SchemaNotFound { .. })
        ));
        assert!(matches!(
            registry.get_schema(SchemaKind::Meta, "x"),
            Err(SchemaError::InvalidVersionFormat(_))
        ));
    }

    #[test]
    fn restricted_registry_drops_unbundled_majors() {
        let registry = BundledSchemaRegistry::with_versions(Version::new(3, 0), [1, 3]);
        assert_eq!(registry.supported_versions(), vec![Version::new(3, 0)]);
        assert!(!registry.is_version_supported("2.0"));
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in SchemaKind::ALL {
            assert_eq!(kind.as_str().parse::<SchemaKind>().unwrap(), kind);
        }
    }
}
