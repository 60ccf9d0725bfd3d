//! Plan-level dictionary: custom field configuration and metric formula
//! definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::formula::{FormulaDefinition, FormulaType, DEFAULT_BASE_METRIC};

const CUSTOM_METRIC_PREFIX: &str = "metric_custom";

/// Whether a custom field is switched on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Enabled,
    #[default]
    Disabled,
}

/// Scope a custom dimension lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldScope {
    Meta,
    Campaign,
    LineItem,
}

impl FieldScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meta => "meta",
            Self::Campaign => "campaign",
            Self::LineItem => "lineitem",
        }
    }
}

/// Configuration of a custom dimension or custom cost field.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFieldConfig {
    pub status: FieldStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl CustomFieldConfig {
    pub fn enabled(caption: impl Into<String>) -> Self {
        Self {
            status: FieldStatus::Enabled,
            caption: Some(caption.into()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == FieldStatus::Enabled
    }
}

/// Formula configuration for a standard metric.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricFormulaConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_type: Option<FormulaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_metric: Option<String>,
}

impl MetricFormulaConfig {
    pub fn new(formula_type: FormulaType, base_metric: impl Into<String>) -> Self {
        Self {
            formula_type: Some(formula_type),
            base_metric: Some(base_metric.into()),
        }
    }
}

/// Configuration of a custom metric, including its optional formula.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomMetricConfig {
    pub status: FieldStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_type: Option<FormulaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_metric: Option<String>,
}

/// Plan dictionary.
///
/// `custom_dimensions` is the v2.0 name of `lineitem_custom_dimensions` and
/// is accepted on input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta_custom_dimensions: BTreeMap<String, CustomFieldConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub campaign_custom_dimensions: BTreeMap<String, CustomFieldConfig>,
    #[serde(
        default,
        alias = "custom_dimensions",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub lineitem_custom_dimensions: BTreeMap<String, CustomFieldConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub standard_metrics: BTreeMap<String, MetricFormulaConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_metrics: BTreeMap<String, CustomMetricConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_costs: BTreeMap<String, CustomFieldConfig>,
}

/// True for `metric_custom<N>` names.
pub fn is_custom_metric(name: &str) -> bool {
    name.strip_prefix(CUSTOM_METRIC_PREFIX)
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the dictionary carries any formula configuration for `metric`.
    pub fn has_metric(&self, metric: &str) -> bool {
        self.standard_metrics.contains_key(metric) || self.custom_metrics.contains_key(metric)
    }

    /// Definition a metric uses plan-wide.
    ///
    /// Metrics without configuration default to `cost_per_unit` on
    /// `cost_total`.
    pub fn metric_formula_definition(&self, metric: &str) -> FormulaDefinition {
        let (formula_type, base_metric) = if let Some(cfg) = self.standard_metrics.get(metric) {
            (cfg.formula_type, cfg.base_metric.clone())
        } else if let Some(cfg) = self.custom_metrics.get(metric) {
            (cfg.formula_type, cfg.base_metric.clone())
        } else {
            (None, None)
        };

        FormulaDefinition {
            formula_type: formula_type.unwrap_or_default(),
            base_metric: Some(base_metric.unwrap_or_else(|| DEFAULT_BASE_METRIC.to_string())),
            ..Default::default()
        }
    }

    /// Every metric that has a formula configured, keyed by metric name.
    pub fn formula_definitions(&self) -> BTreeMap<String, FormulaDefinition> {
        let standard = self
            .standard_metrics
            .iter()
            .filter(|(_, cfg)| cfg.formula_type.is_some() || cfg.base_metric.is_some())
            .map(|(name, _)| name);
        let custom = self
            .custom_metrics
            .iter()
            .filter(|(_, cfg)| cfg.formula_type.is_some() || cfg.base_metric.is_some())
            .map(|(name, _)| name);

        standard
            .chain(custom)
            .map(|name| (name.clone(), self.metric_formula_definition(name)))
            .collect()
    }

    /// Select which formula type and base metric `metric` uses.
    ///
    /// Creates the entry when missing: `metric_custom<N>` names go to
    /// `custom_metrics` (enabled, captioned "Custom Metric N"), everything
    /// else to `standard_metrics`. Returns whether anything changed.
    pub fn select_metric_formula(
        &mut self,
        metric: &str,
        formula_type: Option<FormulaType>,
        base_metric: Option<&str>,
    ) -> bool {
        fn apply(
            slot_type: &mut Option<FormulaType>,
            slot_base: &mut Option<String>,
            formula_type: Option<FormulaType>,
            base_metric: Option<&str>,
        ) -> bool {
            let mut changed = false;
            if let Some(t) = formula_type {
                if *slot_type != Some(t) {
                    *slot_type = Some(t);
                    changed = true;
                }
            }
            if let Some(b) = base_metric {
                if slot_base.as_deref() != Some(b) {
                    *slot_base = Some(b.to_string());
                    changed = true;
                }
            }
            changed
        }

        if let Some(cfg) = self.standard_metrics.get_mut(metric) {
            return apply(&mut cfg.formula_type, &mut cfg.base_metric, formula_type, base_metric);
        }
        if let Some(cfg) = self.custom_metrics.get_mut(metric) {
            return apply(&mut cfg.formula_type, &mut cfg.base_metric, formula_type, base_metric);
        }

        let formula_type = formula_type.unwrap_or_default();
        let base_metric = base_metric.unwrap_or(DEFAULT_BASE_METRIC).to_string();
        if is_custom_metric(metric) {
            let caption = metric.replace(CUSTOM_METRIC_PREFIX, "Custom Metric ");
            self.custom_metrics.insert(
                metric.to_string(),
                CustomMetricConfig {
                    status: FieldStatus::Enabled,
                    caption: Some(caption),
                    formula_type: Some(formula_type),
                    base_metric: Some(base_metric),
                },
            );
        } else {
            self.standard_metrics.insert(
                metric.to_string(),
                MetricFormulaConfig::new(formula_type, base_metric),
            );
        }
        true
    }

    fn dimensions(&self, scope: FieldScope) -> &BTreeMap<String, CustomFieldConfig> {
        match scope {
            FieldScope::Meta => &self.meta_custom_dimensions,
            FieldScope::Campaign => &self.campaign_custom_dimensions,
            FieldScope::LineItem => &self.lineitem_custom_dimensions,
        }
    }

    /// Look up the enabled configuration of a custom field.
    ///
    /// Dimension fields are searched in `scope` or, when `None`, in meta,
    /// campaign and line-item order.
    fn enabled_config(&self, field: &str, scope: Option<FieldScope>) -> Option<Option<&str>> {
        if field.starts_with("dim_custom") {
            let scopes = match scope {
                Some(s) => vec![s],
                None => vec![FieldScope::Meta, FieldScope::Campaign, FieldScope::LineItem],
            };
            return scopes.into_iter().find_map(|s| {
                self.dimensions(s)
                    .get(field)
                    .filter(|cfg| cfg.is_enabled())
                    .map(|cfg| cfg.caption.as_deref())
            });
        }
        if is_custom_metric(field) {
            return self
                .custom_metrics
                .get(field)
                .filter(|cfg| cfg.status == FieldStatus::Enabled)
                .map(|cfg| cfg.caption.as_deref());
        }
        if field.starts_with("cost_custom") {
            return self
                .custom_costs
                .get(field)
                .filter(|cfg| cfg.is_enabled())
                .map(|cfg| cfg.caption.as_deref());
        }
        None
    }

    pub fn is_field_enabled(&self, field: &str, scope: Option<FieldScope>) -> bool {
        self.enabled_config(field, scope).is_some()
    }

    pub fn field_caption(&self, field: &str, scope: Option<FieldScope>) -> Option<String> {
        self.enabled_config(field, scope).flatten().map(str::to_string)
    }

    /// Enabled custom fields and their captions.
    ///
    /// Dimension keys are qualified with their scope (`lineitem.dim_custom1`);
    /// custom metrics and costs belong to the line-item scope.
    pub fn enabled_fields(&self, scope: Option<FieldScope>) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        let wanted = |s: FieldScope| scope.is_none() || scope == Some(s);

        for s in [FieldScope::Meta, FieldScope::Campaign, FieldScope::LineItem] {
            if !wanted(s) {
                continue;
            }
            for (name, cfg) in self.dimensions(s).iter().filter(|(_, c)| c.is_enabled()) {
                fields.insert(
                    format!("{}.{}", s.as_str(), name),
                    cfg.caption.clone().unwrap_or_default(),
                );
            }
        }

        if wanted(FieldScope::LineItem) {
            for (name, cfg) in &self.custom_metrics {
                if cfg.status == FieldStatus::Enabled {
                    fields.insert(name.clone(), cfg.caption.clone().unwrap_or_default());
                }
            }
            for (name, cfg) in self.custom_costs.iter().filter(|(_, c)| c.is_enabled()) {
                fields.insert(name.clone(), cfg.caption.clone().unwrap_or_default());
            }
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn funnel() -> Dictionary {
        let mut dict = Dictionary::new();
        dict.standard_metrics.insert(
            "metric_impressions".into(),
            MetricFormulaConfig::new(FormulaType::CostPerUnit, "cost_total"),
        );
        dict.custom_metrics.insert(
            "metric_custom1".into(),
            CustomMetricConfig {
                status: FieldStatus::Enabled,
                caption: Some("Store Visits".into()),
                formula_type: Some(FormulaType::ConversionRate),
                base_metric: Some("metric_impressions".into()),
            },
        );
        dict
    }

    #[test]
    fn definition_for_standard_and_custom_metrics() {
        let dict = funnel();
        let def = dict.metric_formula_definition("metric_custom1");
        assert_eq!(def.formula_type, FormulaType::ConversionRate);
        assert_eq!(def.base(), Some("metric_impressions"));

        let def = dict.metric_formula_definition("metric_impressions");
        assert_eq!(def.formula_type, FormulaType::CostPerUnit);
    }

    #[test]
    fn definition_defaults_when_absent() {
        let def = Dictionary::new().metric_formula_definition("metric_clicks");
        assert_eq!(def.formula_type, FormulaType::CostPerUnit);
        assert_eq!(def.base(), Some("cost_total"));
        assert!(def.coefficient.is_none());
    }

    #[test]
    fn formula_definitions_lists_configured_metrics() {
        let defs = funnel().formula_definitions();
        assert_eq!(defs.len(), 2);
        assert!(defs.contains_key("metric_impressions"));
        assert!(defs.contains_key("metric_custom1"));
    }

    #[test]
    fn select_updates_existing_entry() {
        let mut dict = funnel();
        assert!(dict.select_metric_formula(
            "metric_impressions",
            Some(FormulaType::Constant),
            None
        ));
        assert_eq!(
            dict.standard_metrics["metric_impressions"].formula_type,
            Some(FormulaType::Constant)
        );
        assert!(!dict.select_metric_formula(
            "metric_impressions",
            Some(FormulaType::Constant),
            None
        ));
    }

    #[test]
    fn select_creates_custom_metric_with_caption() {
        let mut dict = Dictionary::new();
        assert!(dict.select_metric_formula("metric_custom7", None, Some("metric_clicks")));
        let cfg = &dict.custom_metrics["metric_custom7"];
        assert_eq!(cfg.caption.as_deref(), Some("Custom Metric 7"));
        assert_eq!(cfg.status, FieldStatus::Enabled);
        assert_eq!(cfg.formula_type, Some(FormulaType::CostPerUnit));
        assert_eq!(cfg.base_metric.as_deref(), Some("metric_clicks"));
    }

    #[test]
    fn select_creates_standard_metric() {
        let mut dict = Dictionary::new();
        dict.select_metric_formula("metric_clicks", Some(FormulaType::ConversionRate), None);
        assert!(dict.standard_metrics.contains_key("metric_clicks"));
        assert!(dict.custom_metrics.is_empty());
    }

    #[test]
    fn custom_metric_naming() {
        assert!(is_custom_metric("metric_custom10"));
        assert!(!is_custom_metric("metric_custom"));
        assert!(!is_custom_metric("metric_customer"));
        assert!(!is_custom_metric("metric_clicks"));
    }

    #[test]
    fn deprecated_custom_dimensions_key_is_accepted() {
        let dict: Dictionary = serde_json::from_value(json!({
            "custom_dimensions": {
                "dim_custom1": {"status": "enabled", "caption": "Region"}
            }
        }))
        .unwrap();
        assert!(dict.is_field_enabled("dim_custom1", Some(FieldScope::LineItem)));
        let out = serde_json::to_value(&dict).unwrap();
        assert!(out.get("lineitem_custom_dimensions").is_some());
        assert!(out.get("custom_dimensions").is_none());
    }

    #[test]
    fn captions_and_enabled_fields() {
        let mut dict = funnel();
        dict.campaign_custom_dimensions
            .insert("dim_custom2".into(), CustomFieldConfig::enabled("Brand"));
        dict.custom_costs.insert(
            "cost_custom1".into(),
            CustomFieldConfig {
                status: FieldStatus::Disabled,
                caption: Some("Fees".into()),
            },
        );

        assert_eq!(dict.field_caption("dim_custom2", None).as_deref(), Some("Brand"));
        assert!(!dict.is_field_enabled("dim_custom2", Some(FieldScope::Meta)));
        assert!(!dict.is_field_enabled("cost_custom1", None));

        let all = dict.enabled_fields(None);
        assert_eq!(all.get("campaign.dim_custom2").map(String::as_str), Some("Brand"));
        assert_eq!(all.get("metric_custom1").map(String::as_str), Some("Store Visits"));
        assert!(!all.contains_key("cost_custom1"));

        let meta_only = dict.enabled_fields(Some(FieldScope::Meta));
        assert!(meta_only.is_empty());
    }
}
