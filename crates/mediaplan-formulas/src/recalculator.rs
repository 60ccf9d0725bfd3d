//! Dependency-driven recalculation of line-item metrics.
//!
//! A line item's formula instances decide how its metrics relate. The plan
//! dictionary only fills in what an instance leaves out (its base metric)
//! and supplies defaults when an instance is created.
//!
//! Every operation works on a staged copy and writes it back only once the
//! whole cascade has succeeded, so an error leaves the caller's data as it
//! was.

use std::collections::{BTreeMap, BTreeSet};

use mediaplan_types::{Dictionary, FormulaDefinition, FormulaType, LineItem, MediaPlan};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FormulaResult;
use crate::evaluator::{evaluate, reverse_calculate_coefficient};
use crate::graph::DependencyGraph;

// ── Inputs & reports ────────────────────────────────────────────────

/// Field updates applied to a line item's formula instance.
///
/// `None` leaves the field as it is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormulaUpdate {
    pub formula_type: Option<FormulaType>,
    pub base_metric: Option<String>,
    pub coefficient: Option<Decimal>,
    pub parameter1: Option<Decimal>,
    pub parameter2: Option<Decimal>,
    pub parameter3: Option<Decimal>,
    pub comments: Option<String>,
}

impl FormulaUpdate {
    pub fn coefficient(coefficient: Decimal) -> Self {
        Self {
            coefficient: Some(coefficient),
            ..Default::default()
        }
    }

    fn apply(&self, formula: &mut FormulaDefinition) {
        if let Some(t) = self.formula_type {
            formula.formula_type = t;
        }
        if let Some(base) = &self.base_metric {
            formula.base_metric = Some(base.clone());
        }
        if let Some(c) = self.coefficient {
            formula.coefficient = Some(c);
        }
        if let Some(p) = self.parameter1 {
            formula.parameter1 = Some(p);
        }
        if let Some(p) = self.parameter2 {
            formula.parameter2 = Some(p);
        }
        if let Some(p) = self.parameter3 {
            formula.parameter3 = Some(p);
        }
        if let Some(c) = &self.comments {
            formula.comments = Some(c.clone());
        }
    }
}

/// Plan-wide formula selection for one metric.
#[derive(Clone, Debug, PartialEq)]
pub struct FormulaSelection {
    pub formula_type: Option<FormulaType>,
    pub base_metric: Option<String>,
    pub default_coefficient: Option<Decimal>,
    pub default_parameter1: Option<Decimal>,
    pub default_parameter2: Option<Decimal>,
    pub propagate_to_line_items: bool,
    pub preserve_values: bool,
}

impl Default for FormulaSelection {
    fn default() -> Self {
        Self {
            formula_type: None,
            base_metric: None,
            default_coefficient: None,
            default_parameter1: None,
            default_parameter2: None,
            propagate_to_line_items: true,
            preserve_values: true,
        }
    }
}

impl FormulaSelection {
    pub fn formula_type(formula_type: FormulaType) -> Self {
        Self {
            formula_type: Some(formula_type),
            ..Default::default()
        }
    }
}

/// Outcome of [`select_formula_for_media_plan`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SelectionReport {
    pub dictionary_updated: bool,
    pub lineitems_updated: usize,
    pub coefficients_recalculated: usize,
    /// Line items whose value could not be preserved under the new formula
    /// (no base value, or the formula cannot be solved for it).
    pub unresolved: Vec<String>,
}

// ── Formula resolution ──────────────────────────────────────────────

fn dictionary_definition(dictionary: Option<&Dictionary>, metric: &str) -> FormulaDefinition {
    match dictionary {
        Some(d) => d.metric_formula_definition(metric),
        None => Dictionary::default().metric_formula_definition(metric),
    }
}

/// The line item's formula for `metric` with a missing base metric filled in
/// from the dictionary.
fn effective_formula(
    item: &LineItem,
    dictionary: Option<&Dictionary>,
    metric: &str,
) -> Option<FormulaDefinition> {
    let mut formula = item.formula(metric)?.clone();
    if formula.base_metric.is_none() {
        formula.base_metric = dictionary_definition(dictionary, metric).base_metric;
    }
    Some(formula)
}

/// Base value `formula` reads, or `None` when it needs one that is unset.
fn base_value(item: &LineItem, formula: &FormulaDefinition) -> Option<Decimal> {
    if !formula.formula_type.uses_base() {
        return Some(Decimal::ZERO);
    }
    formula.base().and_then(|base| item.metric(base))
}

/// Recalculate everything downstream of `root` on `item`.
fn cascade(
    item: &mut LineItem,
    dictionary: Option<&Dictionary>,
    root: &str,
) -> FormulaResult<BTreeSet<String>> {
    let relevant: BTreeSet<String> = item.metric_formulas.keys().cloned().collect();
    let mut definitions = dictionary.map(Dictionary::formula_definitions).unwrap_or_default();
    for metric in &relevant {
        if let Some(formula) = effective_formula(item, dictionary, metric) {
            definitions.insert(metric.clone(), formula);
        }
    }

    let graph = DependencyGraph::build(&definitions, Some(&relevant));
    let mut changed = BTreeSet::new();

    for metric in graph.dependents_of(root)? {
        let formula = &definitions[&metric];
        let Some(base) = base_value(item, formula) else {
            debug!(metric = %metric, base = ?formula.base(), "base has no value, skipping");
            continue;
        };
        let value = evaluate(formula, base).inspect_err(|e| {
            warn!(line_item = %item.id, metric = %metric, error = %e, "recalculation failed");
        })?;
        debug!(line_item = %item.id, metric = %metric, %value, "recalculated");
        item.set_metric(metric.clone(), value);
        changed.insert(metric);
    }

    Ok(changed)
}

// ── Operations ──────────────────────────────────────────────────────

/// Set `metric` on `item` and recalculate its dependents.
///
/// With `update_coefficient`, a metric that has its own formula gets a new
/// coefficient so the formula reproduces `value` from the current base.
/// A formula that cannot be solved for `value` (a `cost_per_unit` metric set
/// to zero, or a zero base under `conversion_rate`) fails the whole call and
/// leaves `item` as it was; set the value without `update_coefficient` to
/// store it anyway.
/// Returns the dependents that were recalculated; `metric` itself is not
/// included.
pub fn set_metric_value(
    item: &mut LineItem,
    dictionary: Option<&Dictionary>,
    metric: &str,
    value: Decimal,
    update_coefficient: bool,
) -> FormulaResult<BTreeSet<String>> {
    let mut staged = item.clone();
    staged.set_metric(metric, value);

    if update_coefficient {
        if let Some(formula) = effective_formula(&staged, dictionary, metric) {
            if let Some(base) = base_value(&staged, &formula) {
                let coefficient = reverse_calculate_coefficient(&formula, base, value)?;
                if let Some(instance) = staged.formula_mut(metric) {
                    instance.coefficient = Some(coefficient);
                }
                debug!(line_item = %staged.id, metric, %coefficient, "coefficient updated");
            }
        }
    }

    let changed = cascade(&mut staged, dictionary, metric)?;
    *item = staged;
    Ok(changed)
}

/// Update `metric`'s formula instance on `item`, creating it from the
/// dictionary definition when absent.
///
/// With `recalculate`, the metric is re-evaluated under the updated formula
/// (when its base has a value) and the change cascades to its dependents;
/// the returned set then includes `metric`. Without it nothing but the
/// formula changes and the set is empty.
pub fn configure_metric_formula(
    item: &mut LineItem,
    dictionary: Option<&Dictionary>,
    metric: &str,
    update: &FormulaUpdate,
    recalculate: bool,
) -> FormulaResult<BTreeSet<String>> {
    let mut staged = item.clone();
    let instance = staged
        .metric_formulas
        .entry(metric.to_string())
        .or_insert_with(|| {
            let definition = dictionary_definition(dictionary, metric);
            FormulaDefinition {
                formula_type: definition.formula_type,
                base_metric: definition.base_metric,
                ..Default::default()
            }
        });
    update.apply(instance);

    let mut changed = BTreeSet::new();
    if recalculate {
        if let Some(formula) = effective_formula(&staged, dictionary, metric) {
            if let Some(base) = base_value(&staged, &formula) {
                let value = evaluate(&formula, base)?;
                staged.set_metric(metric, value);
                changed.insert(metric.to_string());
                changed.extend(cascade(&mut staged, dictionary, metric)?);
            }
        }
    }

    *item = staged;
    Ok(changed)
}

/// Select which formula `metric` uses across the whole plan.
///
/// Updates (or creates) the dictionary definition, then brings every line
/// item that has a value or formula for `metric` in line with it. With
/// `preserve_values`, line items that have a value get a coefficient solved
/// so the value is unchanged; otherwise the caller's defaults are applied.
pub fn select_formula_for_media_plan(
    plan: &mut MediaPlan,
    metric: &str,
    selection: &FormulaSelection,
) -> FormulaResult<SelectionReport> {
    let mut dictionary = plan.dictionary.clone().unwrap_or_default();
    let mut report = SelectionReport {
        dictionary_updated: dictionary.select_metric_formula(
            metric,
            selection.formula_type,
            selection.base_metric.as_deref(),
        ),
        ..Default::default()
    };

    let mut lineitems = plan.lineitems.clone();
    if selection.propagate_to_line_items {
        for item in &mut lineitems {
            let has_value = item.has_value(metric);
            if !has_value && item.formula(metric).is_none() {
                continue;
            }
            if select_on_line_item(item, &dictionary, metric, selection, has_value, &mut report) {
                report.lineitems_updated += 1;
            }
        }
    }

    plan.dictionary = Some(dictionary);
    plan.lineitems = lineitems;
    info!(
        metric,
        dictionary_updated = report.dictionary_updated,
        lineitems_updated = report.lineitems_updated,
        coefficients_recalculated = report.coefficients_recalculated,
        "formula selected"
    );
    Ok(report)
}

/// Returns whether the line item's formula instance was created or changed.
fn select_on_line_item(
    item: &mut LineItem,
    dictionary: &Dictionary,
    metric: &str,
    selection: &FormulaSelection,
    has_value: bool,
    report: &mut SelectionReport,
) -> bool {
    let touched = match item.formula_mut(metric) {
        Some(formula) => {
            let mut changed = false;
            if let Some(t) = selection.formula_type.filter(|t| *t != formula.formula_type) {
                formula.formula_type = t;
                changed = true;
            }
            if let Some(base) = selection
                .base_metric
                .as_ref()
                .filter(|b| formula.base() != Some(b.as_str()))
            {
                formula.base_metric = Some(base.clone());
                changed = true;
            }
            changed
        }
        None => {
            let definition = dictionary.metric_formula_definition(metric);
            item.metric_formulas.insert(
                metric.to_string(),
                FormulaDefinition {
                    formula_type: selection.formula_type.unwrap_or(definition.formula_type),
                    base_metric: selection.base_metric.clone().or(definition.base_metric),
                    ..Default::default()
                },
            );
            true
        }
    };

    let preserving = selection.preserve_values && has_value;
    if touched && preserving {
        preserve_value(item, dictionary, metric, selection, report);
    }
    if !preserving {
        if let Some(formula) = item.formula_mut(metric) {
            if let Some(c) = selection.default_coefficient {
                formula.coefficient = Some(c);
            }
            if let Some(p) = selection.default_parameter1 {
                formula.parameter1 = Some(p);
            }
            if let Some(p) = selection.default_parameter2 {
                formula.parameter2 = Some(p);
            }
        }
    }
    touched
}

/// Solve the new formula's coefficient so the observed value is kept.
fn preserve_value(
    item: &mut LineItem,
    dictionary: &Dictionary,
    metric: &str,
    selection: &FormulaSelection,
    report: &mut SelectionReport,
) {
    let Some(observed) = item.metric(metric) else {
        return;
    };
    if let Some(formula) = item.formula_mut(metric) {
        // A power function cannot be solved without its exponent.
        if formula.parameter1.is_none() {
            formula.parameter1 = selection.default_parameter1;
        }
    }
    let Some(formula) = effective_formula(item, Some(dictionary), metric) else {
        return;
    };

    let solved = base_value(item, &formula)
        .map(|base| reverse_calculate_coefficient(&formula, base, observed));
    match solved {
        Some(Ok(coefficient)) => {
            if let Some(instance) = item.formula_mut(metric) {
                instance.coefficient = Some(coefficient);
            }
            report.coefficients_recalculated += 1;
        }
        Some(Err(e)) => {
            warn!(line_item = %item.id, metric, error = %e, "cannot preserve value");
            report.unresolved.push(item.id.clone());
        }
        None => {
            debug!(line_item = %item.id, metric, base = ?formula.base(), "base has no value");
            report.unresolved.push(item.id.clone());
        }
    }
}
