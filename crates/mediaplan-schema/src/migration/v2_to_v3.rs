use mediaplan_types::Version;
use serde_json::{Map, Value};
use tracing::debug;

use super::MigrationStep;
use crate::error::{SchemaError, SchemaResult};

const AUDIENCE_FIELDS: [&str; 5] = [
    "audience_name",
    "audience_age_start",
    "audience_age_end",
    "audience_gender",
    "audience_interests",
];
const LOCATION_FIELDS: [&str; 2] = ["location_type", "locations"];

/// Built-in v2.0 → v3.0 step.
///
/// Moves the scalar audience and location fields of v2.0 campaigns into the
/// `target_audiences` / `target_locations` arrays and renames the
/// dictionary's `custom_dimensions` to `lineitem_custom_dimensions`. Every
/// other field passes through untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct V2ToV3;

impl MigrationStep for V2ToV3 {
    fn from_version(&self) -> Version {
        Version::new(2, 0)
    }

    fn to_version(&self) -> Version {
        Version::new(3, 0)
    }

    fn apply(&self, document: &Value) -> SchemaResult<Value> {
        let mut out = document.clone();
        let root = out
            .as_object_mut()
            .ok_or_else(|| {
                SchemaError::MalformedDocument("plan document must be a JSON object".into())
            })?;

        match root.get_mut("campaign") {
            Some(Value::Object(campaign)) => {
                restructure_audience(campaign);
                restructure_location(campaign);
            }
            Some(Value::Null) | None => {}
            Some(_) => {
                return Err(SchemaError::MalformedDocument(
                    "'campaign' must be an object".into(),
                ))
            }
        }

        match root.get_mut("dictionary") {
            Some(Value::Object(dictionary)) => rename_custom_dimensions(dictionary),
            Some(Value::Null) | None => {}
            Some(_) => {
                return Err(SchemaError::MalformedDocument(
                    "'dictionary' must be an object".into(),
                ))
            }
        }

        Ok(out)
    }

    fn description(&self) -> &str {
        "v2.0 -> v3.0: target audience/location arrays, lineitem_custom_dimensions"
    }
}

/// Non-null, non-empty value. Empty strings, empty lists and `false` count
/// as absent.
fn present(value: Option<&Value>) -> Option<&Value> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Array(a) if a.is_empty() => None,
        other => Some(other),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn restructure_audience(campaign: &mut Map<String, Value>) {
    let has_any = AUDIENCE_FIELDS
        .iter()
        .any(|f| present(campaign.get(*f)).is_some());
    if has_any {
        let name = audience_name(campaign);
        let mut audience = Map::new();
        audience.insert("name".into(), Value::String(name));
        if let Some(start) = present(campaign.get("audience_age_start")) {
            audience.insert("demo_age_start".into(), start.clone());
        }
        if let Some(end) = present(campaign.get("audience_age_end")) {
            audience.insert("demo_age_end".into(), end.clone());
        }
        if let Some(gender) = present(campaign.get("audience_gender")) {
            audience.insert("demo_gender".into(), gender.clone());
        }
        if let Some(interests) = present(campaign.get("audience_interests")) {
            let joined = match interests {
                Value::Array(items) => items.iter().map(as_text).collect::<Vec<_>>().join(", "),
                other => as_text(other),
            };
            audience.insert("interest_attributes".into(), Value::String(joined));
        }
        debug!(name = %audience["name"], "created target audience from v2.0 fields");
        campaign.insert(
            "target_audiences".into(),
            Value::Array(vec![Value::Object(audience)]),
        );
    }
    for field in AUDIENCE_FIELDS {
        campaign.remove(field);
    }
}

/// `audience_name` when set, otherwise built from gender and age range:
/// "Males 35-55", "Females 18+", "Adults up to 34", "General Audience".
fn audience_name(campaign: &Map<String, Value>) -> String {
    if let Some(name) = present(campaign.get("audience_name")) {
        return as_text(name);
    }

    let prefix = match present(campaign.get("audience_gender")).map(as_text) {
        Some(g) if g != "Any" => format!("{g}s"),
        _ => "Adults".to_string(),
    };
    let start = present(campaign.get("audience_age_start")).map(as_text);
    let end = present(campaign.get("audience_age_end")).map(as_text);

    match (start, end) {
        (Some(s), Some(e)) => format!("{prefix} {s}-{e}"),
        (Some(s), None) => format!("{prefix} {s}+"),
        (None, Some(e)) => format!("{prefix} up to {e}"),
        (None, None) if prefix == "Adults" => "General Audience".to_string(),
        (None, None) => prefix,
    }
}

fn restructure_location(campaign: &mut Map<String, Value>) {
    let location_type = present(campaign.get("location_type")).cloned();
    let locations: Vec<String> = match present(campaign.get("locations")) {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| present(Some(*v)).is_some())
            .map(as_text)
            .collect(),
        Some(other) => vec![as_text(other)],
        None => Vec::new(),
    };

    if location_type.is_some() || !locations.is_empty() {
        let name = if locations.is_empty() {
            location_type.as_ref().map(as_text).unwrap_or_default()
        } else {
            locations.join(" and ")
        };
        let mut location = Map::new();
        location.insert("name".into(), Value::String(name));
        if let Some(kind) = location_type {
            location.insert("location_type".into(), kind);
        }
        if !locations.is_empty() {
            location.insert(
                "location_list".into(),
                Value::Array(locations.into_iter().map(Value::String).collect()),
            );
        }
        campaign.insert(
            "target_locations".into(),
            Value::Array(vec![Value::Object(location)]),
        );
    }
    for field in LOCATION_FIELDS {
        campaign.remove(field);
    }
}

/// Rename `custom_dimensions`. When both keys exist the v3.0 entries win and
/// v2.0 entries only fill gaps.
fn rename_custom_dimensions(dictionary: &mut Map<String, Value>) {
    let Some(legacy) = dictionary.remove("custom_dimensions") else {
        return;
    };
    match dictionary.get_mut("lineitem_custom_dimensions") {
        Some(Value::Object(current)) => {
            if let Value::Object(legacy) = legacy {
                for (key, value) in legacy {
                    current.entry(key).or_insert(value);
                }
            }
        }
        _ => {
            dictionary.insert("lineitem_custom_dimensions".into(), legacy);
        }
    }
}
