//! Integration tests: recalculation cascades over a parsed plan document.

use std::collections::BTreeSet;
use std::str::FromStr;

use mediaplan_formulas::{
    configure_metric_formula, evaluate, select_formula_for_media_plan, set_metric_value,
    FormulaError, FormulaSelection, FormulaUpdate, MetricValue,
};
use mediaplan_types::{Decimal, FormulaType, MediaPlan};
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn plan() -> MediaPlan {
    MediaPlan::from_document(json!({
        "meta": {"id": "mp_001", "schema_version": "3.0"},
        "campaign": {"id": "camp_001", "name": "Spring Launch"},
        "dictionary": {
            "standard_metrics": {
                "metric_impressions": {
                    "formula_type": "cost_per_unit",
                    "base_metric": "cost_total"
                },
                "metric_clicks": {
                    "formula_type": "conversion_rate",
                    "base_metric": "metric_impressions"
                }
            }
        },
        "lineitems": [{
            "id": "li_001",
            "cost_total": 10000,
            "cost_currency": "USD",
            "metric_impressions": 1250000,
            "metric_clicks": 31250,
            "metric_views": 777,
            "metric_formulas": {
                "metric_impressions": {
                    "formula_type": "cost_per_unit",
                    "base_metric": "cost_total",
                    "coefficient": 0.008
                },
                "metric_clicks": {
                    "formula_type": "conversion_rate",
                    "base_metric": "metric_impressions",
                    "coefficient": 0.025
                }
            }
        }]
    }))
    .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn cascade_updates_only_reachable_dependents() {
    let mut plan = plan();
    let dictionary = plan.dictionary.clone();
    let item = &mut plan.lineitems[0];

    let changed =
        set_metric_value(item, dictionary.as_ref(), "cost_total", d("20000"), true).unwrap();

    let expected: BTreeSet<String> = ["metric_impressions", "metric_clicks"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(changed, expected);
    assert_eq!(item.metric("cost_total"), Some(d("20000")));
    assert_eq!(item.metric("metric_impressions"), Some(d("2500000")));
    assert_eq!(item.metric("metric_clicks"), Some(d("62500")));
    assert_eq!(item.metric("metric_views"), Some(d("777")));
}

#[test]
fn reselection_keeps_values_and_serializes_numbers() {
    let mut plan = plan();
    let report = select_formula_for_media_plan(
        &mut plan,
        "metric_impressions",
        &FormulaSelection::formula_type(FormulaType::Constant),
    )
    .unwrap();
    assert_eq!(report.coefficients_recalculated, 1);

    let view = MetricValue::of(
        &plan.lineitems[0],
        plan.dictionary.as_ref(),
        "metric_impressions",
    );
    assert_eq!(view.value, Some(d("1250000")));
    assert_eq!(view.coefficient, Some(d("1250000")));
    assert!(view.cpm().is_none());

    let doc = plan.to_document().unwrap();
    let formula = &doc["lineitems"][0]["metric_formulas"]["metric_impressions"];
    assert_eq!(formula["formula_type"], json!("constant"));
    assert_eq!(formula["coefficient"], json!(1250000));
    assert_eq!(doc["lineitems"][0]["cost_currency"], json!("USD"));
}

fn names(metrics: &[&str]) -> BTreeSet<String> {
    metrics.iter().map(|m| m.to_string()).collect()
}

#[test]
fn configure_cascades_to_dependents() {
    let mut plan = plan();
    let dictionary = plan.dictionary.clone();
    let item = &mut plan.lineitems[0];

    let changed = configure_metric_formula(
        item,
        dictionary.as_ref(),
        "metric_impressions",
        &FormulaUpdate::coefficient(d("0.010")),
        true,
    )
    .unwrap();

    assert_eq!(changed, names(&["metric_impressions", "metric_clicks"]));
    assert_eq!(item.metric("metric_impressions"), Some(d("1000000")));
    assert_eq!(item.metric("metric_clicks"), Some(d("25000")));
    assert_eq!(item.metric("metric_views"), Some(d("777")));
}

#[test]
fn configure_leaves_item_untouched_when_a_dependent_cannot_be_evaluated() {
    let mut plan = plan();
    let dictionary = plan.dictionary.clone();
    let item = &mut plan.lineitems[0];
    item.formula_mut("metric_clicks").unwrap().coefficient = None;
    let before = item.clone();

    let result = configure_metric_formula(
        item,
        dictionary.as_ref(),
        "metric_impressions",
        &FormulaUpdate::coefficient(d("0.010")),
        true,
    );

    assert!(matches!(result, Err(FormulaError::MissingCoefficient { .. })));
    assert_eq!(*item, before);
}

#[test]
fn solved_coefficient_survives_save_and_reload() {
    let mut plan = plan();
    let dictionary = plan.dictionary.clone();
    set_metric_value(
        &mut plan.lineitems[0],
        dictionary.as_ref(),
        "metric_impressions",
        d("3"),
        true,
    )
    .unwrap();
    plan.lineitems[0].set_metric("metric_y", d("0.1234567890123456789"));

    let formula = plan.lineitems[0].formula("metric_impressions").unwrap().clone();
    let coefficient = formula.coefficient.unwrap();
    assert_eq!(coefficient, d("10000") / d("3"));

    let text = serde_json::to_string(&plan.to_document().unwrap()).unwrap();
    let reloaded =
        MediaPlan::from_document(serde_json::from_str(&text).unwrap()).unwrap();
    let item = &reloaded.lineitems[0];

    let reloaded_formula = item.formula("metric_impressions").unwrap();
    assert_eq!(reloaded_formula.coefficient, Some(coefficient));
    assert_eq!(item.metric("metric_y"), Some(d("0.1234567890123456789")));
    assert_eq!(
        evaluate(reloaded_formula, d("10000")).unwrap(),
        evaluate(&formula, d("10000")).unwrap()
    );
}
