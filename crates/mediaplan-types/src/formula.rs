//! Metric formula definitions.
//!
//! The same shape serves two roles: in the plan dictionary it names which
//! formula type and base metric a metric uses plan-wide; on a line item it
//! is an instance that also carries the calibrated coefficient.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Metric that formulas derive from when nothing else is configured.
pub const DEFAULT_BASE_METRIC: &str = "cost_total";

/// Supported formula functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FormulaType {
    /// `value = base / coefficient` (coefficient is a cost per unit).
    CostPerUnit,
    /// `value = base * coefficient`.
    ConversionRate,
    /// `value = coefficient`, base ignored.
    Constant,
    /// `value = coefficient * base ^ parameter1`.
    PowerFunction,
}

impl FormulaType {
    pub const ALL: [FormulaType; 4] = [
        FormulaType::CostPerUnit,
        FormulaType::ConversionRate,
        FormulaType::Constant,
        FormulaType::PowerFunction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CostPerUnit => "cost_per_unit",
            Self::ConversionRate => "conversion_rate",
            Self::Constant => "constant",
            Self::PowerFunction => "power_function",
        }
    }

    /// Whether evaluating this formula reads the base metric's value.
    pub fn uses_base(&self) -> bool {
        !matches!(self, Self::Constant)
    }
}

impl Default for FormulaType {
    fn default() -> Self {
        Self::CostPerUnit
    }
}

impl std::fmt::Display for FormulaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormulaType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyFormulaType);
        }
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == trimmed)
            .ok_or_else(|| ModelError::UnknownFormulaType(trimmed.to_string()))
    }
}

impl TryFrom<String> for FormulaType {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormulaType> for String {
    fn from(value: FormulaType) -> Self {
        value.as_str().to_string()
    }
}

/// A formula definition or line-item formula instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormulaDefinition {
    pub formula_type: FormulaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_metric: Option<String>,
    #[serde(
        default,
        with = "crate::decimal::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub coefficient: Option<Decimal>,
    #[serde(
        default,
        with = "crate::decimal::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub parameter1: Option<Decimal>,
    #[serde(
        default,
        with = "crate::decimal::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub parameter2: Option<Decimal>,
    #[serde(
        default,
        with = "crate::decimal::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub parameter3: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl FormulaDefinition {
    pub fn new(formula_type: FormulaType, base_metric: impl Into<String>) -> Self {
        Self {
            formula_type,
            base_metric: Some(base_metric.into()),
            ..Default::default()
        }
    }

    pub fn with_coefficient(mut self, coefficient: Decimal) -> Self {
        self.coefficient = Some(coefficient);
        self
    }

    pub fn with_parameter1(mut self, parameter1: Decimal) -> Self {
        self.parameter1 = Some(parameter1);
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// Base metric name, or `None` when the formula stands alone.
    pub fn base(&self) -> Option<&str> {
        self.base_metric.as_deref()
    }
}
