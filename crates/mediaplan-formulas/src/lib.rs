//! # mediaplan-formulas
//!
//! Metric formula engine for media plan line items.
//!
//! - [`evaluator`] evaluates the four formula types and solves them for
//!   their coefficient.
//! - [`graph`] inverts `base_metric` links into a dependency graph and
//!   walks it breadth-first, failing on cycles.
//! - [`recalculator`] keeps a line item's metrics consistent when a value or
//!   formula changes, and re-selects formulas across a whole plan.
//! - [`metric_view`] is a read-only snapshot of one metric.
//!
//! Every mutating operation is all-or-nothing: changes are staged on a copy
//! and only committed when the whole cascade succeeds.

pub mod error;
pub mod evaluator;
pub mod graph;
pub mod metric_view;
pub mod recalculator;

pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, reverse_calculate_coefficient};
pub use graph::DependencyGraph;
pub use metric_view::MetricValue;
pub use recalculator::{
    configure_metric_formula, select_formula_for_media_plan, set_metric_value, FormulaSelection,
    FormulaUpdate, SelectionReport,
};
