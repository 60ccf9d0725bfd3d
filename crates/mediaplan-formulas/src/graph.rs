use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use mediaplan_types::FormulaDefinition;
use tracing::debug;

use crate::error::{FormulaError, FormulaResult};

/// Base metric → metrics whose formulas read it.
///
/// Built fresh from a snapshot of formula definitions; never persisted.
/// Every metric has at most one base, so each node has at most one parent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    edges: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Invert each definition's `base_metric` into an edge `base -> metric`.
    ///
    /// With `relevant`, only metrics in that set contribute edges (their
    /// bases still appear as source nodes).
    pub fn build(
        definitions: &BTreeMap<String, FormulaDefinition>,
        relevant: Option<&BTreeSet<String>>,
    ) -> Self {
        let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (metric, definition) in definitions {
            if relevant.is_some_and(|r| !r.contains(metric)) {
                continue;
            }
            let Some(base) = definition.base() else {
                continue;
            };
            edges
                .entry(base.to_string())
                .or_default()
                .push(metric.clone());
        }
        Self { edges }
    }

    /// Metrics that read `metric` directly.
    pub fn direct_dependents(&self, metric: &str) -> &[String] {
        self.edges.get(metric).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All metrics downstream of `metric`, breadth-first.
    ///
    /// Every metric appears after its base, so the result is a valid
    /// recalculation order. `metric` itself is not included. Reaching the
    /// root again, or any metric twice, means the formulas form a cycle.
    pub fn dependents_of(&self, metric: &str) -> FormulaResult<Vec<String>> {
        let mut order = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        visited.insert(metric);
        queue.push_back(metric);

        while let Some(current) = queue.pop_front() {
            for dependent in self.direct_dependents(current) {
                if !visited.insert(dependent.as_str()) {
                    return Err(FormulaError::CyclicDependency {
                        metric: dependent.clone(),
                    });
                }
                order.push(dependent.clone());
                queue.push_back(dependent.as_str());
            }
        }

        debug!(root = metric, dependents = order.len(), "resolved dependents");
        Ok(order)
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaplan_types::FormulaType;

    fn defs(pairs: &[(&str, FormulaType, &str)]) -> BTreeMap<String, FormulaDefinition> {
        pairs
            .iter()
            .map(|(metric, t, base)| (metric.to_string(), FormulaDefinition::new(*t, *base)))
            .collect()
    }

    #[test]
    fn dependents_are_breadth_first() {
        let graph = DependencyGraph::build(
            &defs(&[
                ("metric_impressions", FormulaType::CostPerUnit, "cost_total"),
                ("metric_clicks", FormulaType::ConversionRate, "metric_impressions"),
                ("metric_views", FormulaType::ConversionRate, "metric_impressions"),
                ("metric_conversions", FormulaType::ConversionRate, "metric_clicks"),
                ("metric_reach", FormulaType::CostPerUnit, "cost_media"),
            ]),
            None,
        );
        assert_eq!(
            graph.dependents_of("cost_total").unwrap(),
            vec![
                "metric_impressions",
                "metric_clicks",
                "metric_views",
                "metric_conversions"
            ]
        );
        assert_eq!(
            graph.dependents_of("metric_clicks").unwrap(),
            vec!["metric_conversions"]
        );
        assert!(graph.dependents_of("metric_conversions").unwrap().is_empty());
    }

    #[test]
    fn relevant_set_scopes_edges() {
        let all = defs(&[
            ("metric_impressions", FormulaType::CostPerUnit, "cost_total"),
            ("metric_clicks", FormulaType::ConversionRate, "metric_impressions"),
        ]);
        let relevant: BTreeSet<String> = ["metric_impressions".to_string()].into();
        let graph = DependencyGraph::build(&all, Some(&relevant));
        assert_eq!(
            graph.dependents_of("cost_total").unwrap(),
            vec!["metric_impressions"]
        );
        assert!(graph.direct_dependents("metric_impressions").is_empty());
    }

    #[test]
    fn metrics_without_base_add_no_edge() {
        let mut all = defs(&[("metric_views", FormulaType::Constant, "cost_total")]);
        all.insert(
            "metric_reach".into(),
            FormulaDefinition {
                formula_type: FormulaType::Constant,
                ..Default::default()
            },
        );
        let graph = DependencyGraph::build(&all, None);
        assert_eq!(graph.direct_dependents("cost_total"), ["metric_views"]);
        assert!(graph.dependents_of("metric_reach").unwrap().is_empty());
    }

    #[test]
    fn cycles_fail_fast() {
        let graph = DependencyGraph::build(
            &defs(&[
                ("metric_a", FormulaType::ConversionRate, "metric_b"),
                ("metric_b", FormulaType::ConversionRate, "metric_a"),
            ]),
            None,
        );
        assert!(matches!(
            graph.dependents_of("metric_a"),
            Err(FormulaError::CyclicDependency { .. })
        ));

        let self_loop = DependencyGraph::build(
            &defs(&[("metric_a", FormulaType::ConversionRate, "metric_a")]),
            None,
        );
        assert_eq!(
            self_loop.dependents_of("metric_a"),
            Err(FormulaError::CyclicDependency {
                metric: "metric_a".into()
            })
        );
    }
}
