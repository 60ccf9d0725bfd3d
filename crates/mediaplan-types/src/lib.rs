//! # mediaplan-types
//!
//! Typed model of a media plan document and the primitives every other
//! mediaplan crate builds on:
//!
//! 1. **Version**: `X.Y` schema version identifiers
//! 2. **FormulaDefinition**: how a metric is derived from a base metric
//! 3. **Dictionary**: plan-wide custom field and formula configuration
//! 4. **LineItem**: metric values plus per-item formula instances
//! 5. **MediaPlan**: meta, campaign, line items and dictionary
//!
//! Decimal values are exact (`rust_decimal`) and travel as JSON numbers.

pub mod decimal;
pub mod dictionary;
pub mod error;
pub mod formula;
pub mod lineitem;
pub mod plan;
pub mod version;

pub use dictionary::{
    is_custom_metric, CustomFieldConfig, CustomMetricConfig, Dictionary, FieldScope,
    FieldStatus, MetricFormulaConfig,
};
pub use error::{ModelError, ModelResult, VersionError};
pub use formula::{FormulaDefinition, FormulaType, DEFAULT_BASE_METRIC};
pub use lineitem::LineItem;
pub use plan::{Campaign, MediaPlan, Meta, TargetAudience, TargetLocation, MIGRATION_PROVENANCE_KEY};
pub use rust_decimal::Decimal;
pub use version::Version;
