//! Document validation against a schema version.
//!
//! Validation never stops at the first problem: every issue found is
//! returned, tagged with a severity. Errors make a document invalid;
//! warnings flag deprecated but still accepted content.

use std::sync::Arc;

use chrono::NaiveDate;
use mediaplan_types::{FormulaType, Version};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SchemaError, SchemaResult};
use crate::registry::{SchemaDocument, SchemaKind, SchemaRegistry};

// ── Issues ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One finding, located by a slash-separated path such as
/// `lineitems/2/start_date`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.path, self.message)
    }
}

// ── Validator ───────────────────────────────────────────────────────

pub trait SchemaValidator: Send + Sync {
    /// Validate `document` against `version`, or against the document's own
    /// `meta.schema_version` when `version` is `None`.
    ///
    /// Fails only when the version cannot be resolved to a schema; problems
    /// inside the document are returned as issues.
    fn validate(
        &self,
        document: &Value,
        version: Option<&str>,
    ) -> SchemaResult<Vec<ValidationIssue>>;
}

/// Validator backed by a [`SchemaRegistry`].
pub struct DocumentValidator {
    registry: Arc<dyn SchemaRegistry>,
}

const CUSTOM_FIELD_PREFIXES: [&str; 3] = ["dim_custom", "metric_custom", "cost_custom"];
const MAX_CAPTION_LEN: usize = 100;

impl DocumentValidator {
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self { registry }
    }

    fn schema(&self, kind: SchemaKind, version: &str) -> SchemaResult<Option<SchemaDocument>> {
        match self.registry.get_schema(kind, version) {
            Ok(schema) => Ok(Some(schema)),
            Err(SchemaError::SchemaNotFound { .. }) if kind != SchemaKind::MediaPlan => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl SchemaValidator for DocumentValidator {
    fn validate(
        &self,
        document: &Value,
        version: Option<&str>,
    ) -> SchemaResult<Vec<ValidationIssue>> {
        let Some(root) = document.as_object() else {
            return Ok(vec![ValidationIssue::error("", "plan document must be a JSON object")]);
        };

        let version = match version {
            Some(v) => v.to_string(),
            None => root
                .get("meta")
                .and_then(|m| m.get("schema_version"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.registry.current_version().to_string()),
        };
        let parsed = Version::parse(&version)?;
        let normalized = parsed.to_string();
        // Minor revisions validate against their major's definitions.
        let lookup = Version::new(parsed.major, 0).to_string();

        let mut issues = Vec::new();
        let plan = self
            .schema(SchemaKind::MediaPlan, &lookup)?
            .ok_or_else(|| SchemaError::SchemaNotFound {
                kind: SchemaKind::MediaPlan.to_string(),
                version: normalized.clone(),
            })?;
        check_required(root, &plan, "", &mut issues);

        if let Some(meta) = object_at(root, "meta", "meta", &mut issues) {
            if let Some(schema) = self.schema(SchemaKind::Meta, &lookup)? {
                check_section(meta, &schema, "meta", &mut issues);
            }
            check_meta_rules(meta, &mut issues);
        }

        let mut campaign_range = (None, None);
        if let Some(campaign) = object_at(root, "campaign", "campaign", &mut issues) {
            if let Some(schema) = self.schema(SchemaKind::Campaign, &lookup)? {
                check_section(campaign, &schema, "campaign", &mut issues);
            }
            campaign_range = (
                date_field(campaign, "start_date", "campaign", &mut issues),
                date_field(campaign, "end_date", "campaign", &mut issues),
            );
            if let (Some(start), Some(end)) = campaign_range {
                if start > end {
                    issues.push(ValidationIssue::error(
                        "campaign/end_date",
                        "campaign end date precedes its start date",
                    ));
                }
            }
            for (field, kind) in [
                ("target_audiences", SchemaKind::TargetAudience),
                ("target_locations", SchemaKind::TargetLocation),
            ] {
                self.check_array(campaign, field, kind, &lookup, &mut issues)?;
            }
        }

        match root.get("lineitems") {
            Some(Value::Array(items)) => {
                let schema = self.schema(SchemaKind::LineItem, &lookup)?;
                let formula_schema = self.schema(SchemaKind::MetricFormula, &lookup)?;
                for (index, item) in items.iter().enumerate() {
                    let path = format!("lineitems/{index}");
                    let Some(item) = item.as_object() else {
                        issues.push(ValidationIssue::error(path, "line item must be an object"));
                        continue;
                    };
                    if let Some(schema) = &schema {
                        check_section(item, schema, &path, &mut issues);
                    }
                    check_lineitem_rules(item, &path, campaign_range, &mut issues);
                    check_metric_formulas(item, formula_schema.as_ref(), &path, &mut issues);
                }
            }
            Some(Value::Null) | None => {}
            Some(_) => issues.push(ValidationIssue::error(
                "lineitems",
                "'lineitems' must be an array",
            )),
        }

        match root.get("dictionary") {
            Some(Value::Object(dictionary)) => {
                if let Some(schema) = self.schema(SchemaKind::Dictionary, &lookup)? {
                    check_section(dictionary, &schema, "dictionary", &mut issues);
                }
                check_dictionary(dictionary, &mut issues);
            }
            Some(Value::Null) | None => {}
            Some(_) => issues.push(ValidationIssue::error(
                "dictionary",
                "'dictionary' must be an object",
            )),
        }

        debug!(
            version = %normalized,
            errors = issues.iter().filter(|i| i.is_error()).count(),
            warnings = issues.iter().filter(|i| !i.is_error()).count(),
            "validated plan document"
        );
        Ok(issues)
    }
}

impl DocumentValidator {
    /// Required fields and enums for each element of a campaign array. Arrays
    /// unknown to the version are reported as unexpected.
    fn check_array(
        &self,
        campaign: &Map<String, Value>,
        field: &str,
        kind: SchemaKind,
        version: &str,
        issues: &mut Vec<ValidationIssue>,
    ) -> SchemaResult<()> {
        let Some(value) = campaign.get(field) else {
            return Ok(());
        };
        let path = format!("campaign/{field}");
        let Some(schema) = self.schema(kind, version)? else {
            issues.push(ValidationIssue::warning(
                path,
                format!("'{field}' is not part of schema {version}"),
            ));
            return Ok(());
        };
        let Some(elements) = value.as_array() else {
            issues.push(ValidationIssue::error(path, format!("'{field}' must be an array")));
            return Ok(());
        };
        for (index, element) in elements.iter().enumerate() {
            let element_path = format!("{path}/{index}");
            match element.as_object() {
                Some(element) => check_section(element, &schema, &element_path, issues),
                None => issues.push(ValidationIssue::error(
                    element_path,
                    "array element must be an object",
                )),
            }
        }
        Ok(())
    }
}

// ── Section checks ──────────────────────────────────────────────────

fn join(base: &str, field: &str) -> String {
    if base.is_empty() {
        field.to_string()
    } else {
        format!("{base}/{field}")
    }
}

fn object_at<'a>(
    root: &'a Map<String, Value>,
    field: &str,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a Map<String, Value>> {
    match root.get(field)? {
        Value::Object(map) => Some(map),
        Value::Null => None,
        _ => {
            issues.push(ValidationIssue::error(path, format!("'{field}' must be an object")));
            None
        }
    }
}

fn check_required(
    section: &Map<String, Value>,
    schema: &SchemaDocument,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    for field in &schema.required {
        if section.get(field).map_or(true, Value::is_null) {
            issues.push(ValidationIssue::error(
                join(path, field),
                format!("required field '{field}' is missing"),
            ));
        }
    }
}

fn check_section(
    section: &Map<String, Value>,
    schema: &SchemaDocument,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    check_required(section, schema, path, issues);

    for (field, allowed) in &schema.enums {
        let Some(value) = section.get(field) else { continue };
        match value {
            Value::Null => {}
            Value::String(s) if allowed.iter().any(|a| a == s) => {}
            other => issues.push(ValidationIssue::error(
                join(path, field),
                format!("value {other} is not one of: {}", allowed.join(", ")),
            )),
        }
    }

    for field in &schema.deprecated {
        if section.get(field).is_some_and(|v| !v.is_null()) {
            issues.push(ValidationIssue::warning(
                join(path, field),
                format!(
                    "'{field}' is deprecated in schema {}; migrate the plan to move it",
                    schema.version
                ),
            ));
        }
    }
}

fn date_field(
    section: &Map<String, Value>,
    field: &str,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<NaiveDate> {
    let raw = section.get(field)?.as_str()?;
    // Accept full timestamps by looking at the date part only.
    let date_part = raw.get(..10).unwrap_or(raw);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            issues.push(ValidationIssue::error(
                join(path, field),
                format!("'{raw}' is not a YYYY-MM-DD date"),
            ));
            None
        }
    }
}

fn is_true(section: &Map<String, Value>, field: &str) -> bool {
    section.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn check_meta_rules(meta: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    if is_true(meta, "is_current") && is_true(meta, "is_archived") {
        issues.push(ValidationIssue::error(
            "meta/is_archived",
            "a plan cannot be both current and archived",
        ));
    }
    if let (Some(parent), Some(id)) = (
        meta.get("parent_id").and_then(Value::as_str),
        meta.get("id").and_then(Value::as_str),
    ) {
        if parent == id {
            issues.push(ValidationIssue::error(
                "meta/parent_id",
                "a plan cannot be its own parent",
            ));
        }
    }
}

fn check_lineitem_rules(
    item: &Map<String, Value>,
    path: &str,
    (campaign_start, campaign_end): (Option<NaiveDate>, Option<NaiveDate>),
    issues: &mut Vec<ValidationIssue>,
) {
    let start = date_field(item, "start_date", path, issues);
    let end = date_field(item, "end_date", path, issues);

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            issues.push(ValidationIssue::error(
                join(path, "end_date"),
                "line item end date precedes its start date",
            ));
        }
    }
    if let (Some(start), Some(campaign_start)) = (start, campaign_start) {
        if start < campaign_start {
            issues.push(ValidationIssue::error(
                join(path, "start_date"),
                format!("line item starts {start}, before the campaign starts {campaign_start}"),
            ));
        }
    }
    if let (Some(end), Some(campaign_end)) = (end, campaign_end) {
        if end > campaign_end {
            issues.push(ValidationIssue::error(
                join(path, "end_date"),
                format!("line item ends {end}, after the campaign ends {campaign_end}"),
            ));
        }
    }

    if let Some(currency) = item.get("cost_currency").filter(|v| !v.is_null()) {
        let valid = currency
            .as_str()
            .is_some_and(|c| c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()));
        if !valid {
            issues.push(ValidationIssue::error(
                join(path, "cost_currency"),
                format!("currency {currency} must be a 3-letter code"),
            ));
        }
    }
}

fn check_metric_formulas(
    item: &Map<String, Value>,
    schema: Option<&SchemaDocument>,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(formulas) = item.get("metric_formulas").filter(|v| !v.is_null()) else {
        return;
    };
    let formulas_path = join(path, "metric_formulas");
    let Some(schema) = schema else {
        issues.push(ValidationIssue::warning(
            formulas_path,
            "'metric_formulas' is not part of this schema version",
        ));
        return;
    };
    let Some(formulas) = formulas.as_object() else {
        issues.push(ValidationIssue::error(formulas_path, "'metric_formulas' must be an object"));
        return;
    };
    for (metric, formula) in formulas {
        let formula_path = join(&formulas_path, metric);
        let Some(formula) = formula.as_object() else {
            issues.push(ValidationIssue::error(formula_path, "formula must be an object"));
            continue;
        };
        check_section(formula, schema, &formula_path, issues);

        let needs_base = formula
            .get("formula_type")
            .and_then(Value::as_str)
            .and_then(|t| t.parse::<FormulaType>().ok())
            .is_some_and(|t| t.uses_base());
        let base = formula.get("base_metric").and_then(Value::as_str);
        if needs_base && base == Some(metric.as_str()) {
            issues.push(ValidationIssue::error(
                join(&formula_path, "base_metric"),
                "a metric cannot be its own base",
            ));
        }
    }
}

// ── Dictionary ──────────────────────────────────────────────────────

fn is_custom_field_name(name: &str) -> bool {
    CUSTOM_FIELD_PREFIXES.iter().any(|prefix| {
        name.strip_prefix(prefix)
            .and_then(|n| n.parse::<u32>().ok())
            .is_some_and(|n| (1..=10).contains(&n))
    })
}

fn check_dictionary(dictionary: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    for section in [
        "meta_custom_dimensions",
        "campaign_custom_dimensions",
        "lineitem_custom_dimensions",
        "custom_dimensions",
        "custom_metrics",
        "custom_costs",
    ] {
        let Some(fields) = dictionary.get(section).and_then(Value::as_object) else {
            continue;
        };
        for (name, config) in fields {
            let path = format!("dictionary/{section}/{name}");
            if !is_custom_field_name(name) {
                issues.push(ValidationIssue::error(
                    path.clone(),
                    format!("'{name}' is not a recognised custom field name"),
                ));
            }
            check_field_config(config, &path, issues);
        }
    }
}

fn check_field_config(config: &Value, path: &str, issues: &mut Vec<ValidationIssue>) {
    let Some(config) = config.as_object() else {
        issues.push(ValidationIssue::error(path, "field configuration must be an object"));
        return;
    };
    let status = config.get("status").and_then(Value::as_str);
    match status {
        Some("enabled") => {
            let caption = config.get("caption").and_then(Value::as_str).map(str::trim);
            match caption {
                None | Some("") => issues.push(ValidationIssue::error(
                    join(path, "caption"),
                    "enabled fields require a caption",
                )),
                Some(c) if c.chars().count() > MAX_CAPTION_LEN => {
                    issues.push(ValidationIssue::error(
                        join(path, "caption"),
                        format!("caption exceeds {MAX_CAPTION_LEN} characters"),
                    ))
                }
                Some(_) => {}
            }
        }
        Some("disabled") => {}
        Some(other) => issues.push(ValidationIssue::error(
            join(path, "status"),
            format!("status '{other}' must be 'enabled' or 'disabled'"),
        )),
        None => issues.push(ValidationIssue::error(
            join(path, "status"),
            "required field 'status' is missing",
        )),
    }
}
