use mediaplan_types::{Dictionary, FormulaType, LineItem};
use rust_decimal::Decimal;
use serde::Serialize;

/// Read-only snapshot of one metric on a line item.
///
/// Formula type and base metric come from the line item's formula instance,
/// or from the dictionary when the line item has none. Coefficient and
/// parameters only exist on an instance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricValue {
    pub name: String,
    #[serde(with = "mediaplan_types::decimal::option")]
    pub value: Option<Decimal>,
    pub formula_type: FormulaType,
    pub base_metric: Option<String>,
    #[serde(with = "mediaplan_types::decimal::option")]
    pub coefficient: Option<Decimal>,
    #[serde(with = "mediaplan_types::decimal::option")]
    pub parameter1: Option<Decimal>,
    #[serde(with = "mediaplan_types::decimal::option")]
    pub parameter2: Option<Decimal>,
    #[serde(with = "mediaplan_types::decimal::option")]
    pub parameter3: Option<Decimal>,
    pub comments: Option<String>,
}

impl MetricValue {
    pub fn of(item: &LineItem, dictionary: Option<&Dictionary>, metric: &str) -> Self {
        let fallback = match dictionary {
            Some(d) => d.metric_formula_definition(metric),
            None => Dictionary::default().metric_formula_definition(metric),
        };
        let instance = item.formula(metric);

        Self {
            name: metric.to_string(),
            value: item.metric(metric),
            formula_type: instance.map_or(fallback.formula_type, |f| f.formula_type),
            base_metric: instance
                .and_then(|f| f.base_metric.clone())
                .or(fallback.base_metric),
            coefficient: instance.and_then(|f| f.coefficient),
            parameter1: instance.and_then(|f| f.parameter1),
            parameter2: instance.and_then(|f| f.parameter2),
            parameter3: instance.and_then(|f| f.parameter3),
            comments: instance.and_then(|f| f.comments.clone()),
        }
    }

    /// Cost per thousand units, for `cost_per_unit` metrics with a coefficient.
    pub fn cpm(&self) -> Option<Decimal> {
        if self.formula_type != FormulaType::CostPerUnit {
            return None;
        }
        self.coefficient
            .and_then(|c| c.checked_mul(Decimal::ONE_THOUSAND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaplan_types::{FormulaDefinition, MetricFormulaConfig};
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn view_of_metric_with_formula() {
        let item = LineItem::new("li_001")
            .with_metric("metric_impressions", d("1250000"))
            .with_formula(
                "metric_impressions",
                FormulaDefinition::new(FormulaType::CostPerUnit, "cost_total")
                    .with_coefficient(d("0.008"))
                    .with_comments("Test formula"),
            );
        let view = MetricValue::of(&item, None, "metric_impressions");
        assert_eq!(view.value, Some(d("1250000")));
        assert_eq!(view.formula_type, FormulaType::CostPerUnit);
        assert_eq!(view.base_metric.as_deref(), Some("cost_total"));
        assert_eq!(view.cpm(), Some(d("8")));
        assert_eq!(view.comments.as_deref(), Some("Test formula"));
    }

    #[test]
    fn view_falls_back_to_dictionary() {
        let mut dict = Dictionary::new();
        dict.standard_metrics.insert(
            "metric_clicks".into(),
            MetricFormulaConfig::new(FormulaType::ConversionRate, "metric_impressions"),
        );
        let item = LineItem::new("li_001").with_metric("metric_clicks", d("900"));
        let view = MetricValue::of(&item, Some(&dict), "metric_clicks");
        assert_eq!(view.formula_type, FormulaType::ConversionRate);
        assert_eq!(view.base_metric.as_deref(), Some("metric_impressions"));
        assert!(view.coefficient.is_none());
        assert!(view.cpm().is_none());

        let default = MetricValue::of(&item, None, "metric_impressions");
        assert_eq!(default.formula_type, FormulaType::CostPerUnit);
        assert_eq!(default.base_metric.as_deref(), Some("cost_total"));
        assert!(default.value.is_none());
    }
}
