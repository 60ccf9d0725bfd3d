//! Typed media plan document.
//!
//! Only the fields the formula engine, migrator and validator reason about
//! are typed. Everything else rides along in `extra` so a typed round-trip
//! reproduces the original document.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dictionary::Dictionary;
use crate::error::ModelResult;
use crate::lineitem::LineItem;
use crate::version::Version;

/// Key under `meta.custom_properties` that records the last migration.
pub const MIGRATION_PROVENANCE_KEY: &str = "schema_migration";

/// Plan metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub id: String,
    pub schema_version: String,
    /// Kept verbatim; migrations never rewrite it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_properties: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Meta {
    /// Parsed `schema_version`.
    pub fn version(&self) -> Result<Version, crate::error::VersionError> {
        Version::parse(&self.schema_version)
    }
}

/// One entry of `campaign.target_audiences`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetAudience {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_age_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_age_end: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo_gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_attributes: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of `campaign.target_locations`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetLocation {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_list: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(
        default,
        with = "crate::decimal::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub budget_total: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_audiences: Vec<TargetAudience>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_locations: Vec<TargetLocation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A complete media plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaPlan {
    pub meta: Meta,
    pub campaign: Campaign,
    #[serde(default)]
    pub lineitems: Vec<LineItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<Dictionary>,
}

impl MediaPlan {
    pub fn from_document(document: Value) -> ModelResult<Self> {
        Ok(serde_json::from_value(document)?)
    }

    pub fn to_document(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// The plan dictionary, created empty when absent.
    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        self.dictionary.get_or_insert_with(Dictionary::default)
    }

    pub fn lineitem(&self, id: &str) -> Option<&LineItem> {
        self.lineitems.iter().find(|li| li.id == id)
    }

    pub fn lineitem_mut(&mut self, id: &str) -> Option<&mut LineItem> {
        self.lineitems.iter_mut().find(|li| li.id == id)
    }
}
