//! Line items: metric values plus per-item formula instances.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::decimal;
use crate::error::ModelError;
use crate::formula::FormulaDefinition;

const METRIC_FORMULAS_KEY: &str = "metric_formulas";

/// A line item as the formula engine sees it.
///
/// On the wire a line item is a flat object. Numeric `cost_*` and `metric_*`
/// fields land in `metrics`, `metric_formulas` in `metric_formulas`, and every
/// other field is kept verbatim in `attributes`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct LineItem {
    pub id: String,
    pub name: Option<String>,
    pub metrics: BTreeMap<String, Decimal>,
    pub metric_formulas: BTreeMap<String, FormulaDefinition>,
    pub attributes: Map<String, Value>,
}

fn is_metric_field(key: &str) -> bool {
    key != METRIC_FORMULAS_KEY && (key.starts_with("cost_") || key.starts_with("metric_"))
}

impl LineItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: Decimal) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_formula(mut self, metric: impl Into<String>, formula: FormulaDefinition) -> Self {
        self.metric_formulas.insert(metric.into(), formula);
        self
    }

    pub fn metric(&self, name: &str) -> Option<Decimal> {
        self.metrics.get(name).copied()
    }

    pub fn set_metric(&mut self, name: impl Into<String>, value: Decimal) {
        self.metrics.insert(name.into(), value);
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn formula(&self, metric: &str) -> Option<&FormulaDefinition> {
        self.metric_formulas.get(metric)
    }

    pub fn formula_mut(&mut self, metric: &str) -> Option<&mut FormulaDefinition> {
        self.metric_formulas.get_mut(metric)
    }
}

impl TryFrom<Map<String, Value>> for LineItem {
    type Error = ModelError;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = match map.remove("id") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(ModelError::MissingField("id".into())),
        };
        let name = match map.remove("name") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
        let metric_formulas = match map.remove(METRIC_FORMULAS_KEY) {
            Some(Value::Null) | None => BTreeMap::new(),
            Some(v) => serde_json::from_value(v)?,
        };

        let mut metrics = BTreeMap::new();
        let mut attributes = Map::new();
        for (key, value) in map {
            if !is_metric_field(&key) {
                attributes.insert(key, value);
                continue;
            }
            match &value {
                Value::Null => {}
                Value::Number(_) => {
                    let d = decimal::from_json(&value).ok_or_else(|| ModelError::InvalidDecimal {
                        field: key.clone(),
                        value: value.to_string(),
                    })?;
                    metrics.insert(key, d);
                }
                Value::String(_) => match decimal::from_json(&value) {
                    Some(d) => {
                        metrics.insert(key, d);
                    }
                    None => {
                        attributes.insert(key, value);
                    }
                },
                _ => {
                    attributes.insert(key, value);
                }
            }
        }

        Ok(Self {
            id,
            name,
            metrics,
            metric_formulas,
            attributes,
        })
    }
}

impl From<LineItem> for Map<String, Value> {
    fn from(item: LineItem) -> Self {
        let mut map = Map::new();
        map.insert("id".into(), Value::String(item.id));
        if let Some(name) = item.name {
            map.insert("name".into(), Value::String(name));
        }
        for (key, value) in item.attributes {
            map.insert(key, value);
        }
        for (key, value) in item.metrics {
            map.insert(key, decimal::to_json(value));
        }
        if !item.metric_formulas.is_empty() {
            // BTreeMap<String, FormulaDefinition> always serializes to an object.
            let formulas = serde_json::to_value(&item.metric_formulas).unwrap_or(Value::Null);
            map.insert(METRIC_FORMULAS_KEY.into(), formulas);
        }
        map
    }
}
