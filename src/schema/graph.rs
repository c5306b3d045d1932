//! Join connectivity graphs.
//!
//! Tables are nodes and every usable binary join is an edge. The same structure is
//! used to decompose a single declared join and to route a query across every join
//! of a database.

use super::plan::{JoinPlan, JoinStep, StepKind};
use crate::error::SchemaError;
use crate::models::{Database, JoinType};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct JoinGraph {
    graph: UnGraph<String, JoinStep>,
    nodes: HashMap<String, NodeIndex>,
}

/// Breadth-first spanning tree of a [`JoinGraph`].
#[derive(Debug, Clone)]
pub struct Span {
    pub anchor: String,
    /// Tree edges oriented parent to child, in discovery order of the child.
    pub steps: Vec<JoinStep>,
    reached: HashSet<String>,
}

impl Span {
    pub fn reaches(&self, table: &str) -> bool {
        self.reached.contains(table)
    }
}

/// Tables and binary steps needed to answer a query touching several tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Route {
    pub anchor: String,
    /// Anchor first, then every joined table in step order.
    pub tables: Vec<String>,
    pub steps: Vec<JoinStep>,
}

impl JoinGraph {
    /// Add a table node. Adding the same table twice is a no-op.
    pub fn add_table(&mut self, table: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(table) {
            return idx;
        }
        let idx = self.graph.add_node(table.to_string());
        self.nodes.insert(table.to_string(), idx);
        idx
    }

    /// Add an edge for a binary join step, adding its tables when missing.
    pub fn connect(&mut self, step: JoinStep) -> EdgeIndex {
        let left = self.add_table(&step.left);
        let right = self.add_table(&step.right);
        self.graph.add_edge(left, right, step)
    }

    pub fn table_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn step_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Graph spanning every table of a database.
    ///
    /// Inner joins link every pair of their tables with equal key arity, since
    /// inner joins can be chained in any order. Outer joins only contribute the
    /// steps of their plan, which keeps the preserved side fixed.
    pub fn for_database(database: &Database, plans: &[JoinPlan]) -> Self {
        let mut graph = Self::default();
        for table in &database.tables {
            graph.add_table(&table.name);
        }
        for (join, plan) in database.joins.iter().zip(plans) {
            if join.join_type != JoinType::Inner {
                for step in &plan.steps {
                    graph.connect(step.clone());
                }
                continue;
            }
            for (i, a) in join.matches.iter().enumerate() {
                for b in &join.matches[i + 1..] {
                    if a.keys.len() == b.keys.len() {
                        graph.connect(JoinStep {
                            left: a.table.clone(),
                            right: b.table.clone(),
                            left_keys: a.keys.clone(),
                            right_keys: b.keys.clone(),
                            kind: StepKind::Inner,
                        });
                    }
                }
            }
        }
        graph
    }

    /// Breadth-first spanning tree from `anchor`. Neighbours are visited in the
    /// order their tables were added, and parallel edges in the order they were
    /// connected.
    pub fn span(&self, anchor: &str) -> Span {
        let mut span = Span {
            anchor: anchor.to_string(),
            steps: Vec::new(),
            reached: HashSet::new(),
        };
        let Some(&start) = self.nodes.get(anchor) else {
            return span;
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        span.reached.insert(anchor.to_string());

        while let Some(node) = queue.pop_front() {
            let mut edges: Vec<_> = self
                .graph
                .edges(node)
                .map(|e| {
                    let other = if e.source() == node {
                        e.target()
                    } else {
                        e.source()
                    };
                    (other, e.id())
                })
                .collect();
            edges.sort_by_key(|(other, edge)| (other.index(), edge.index()));

            for (other, edge) in edges {
                if !visited.insert(other) {
                    continue;
                }
                let step = &self.graph[edge];
                let oriented = if step.left == self.graph[node] {
                    step.clone()
                } else {
                    step.reversed()
                };
                span.reached.insert(self.graph[other].clone());
                span.steps.push(oriented);
                queue.push_back(other);
            }
        }
        span
    }

    /// Smallest subtree of the spanning tree from the first table that contains
    /// every requested table. Intermediate tables are included when a requested
    /// table can only be reached through them.
    pub fn route(&self, tables: &[&str]) -> Result<Route, SchemaError> {
        let Some(&anchor) = tables.first() else {
            return Ok(Route {
                anchor: String::new(),
                tables: Vec::new(),
                steps: Vec::new(),
            });
        };

        let span = self.span(anchor);
        let mut missing: Vec<String> = Vec::new();
        for table in tables {
            if !span.reaches(table) && !missing.iter().any(|m| m == table) {
                missing.push(table.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(SchemaError::unreachable(
                format!("query from '{}'", anchor),
                missing,
            ));
        }

        let parents: HashMap<&str, &JoinStep> = span
            .steps
            .iter()
            .map(|s| (s.right.as_str(), s))
            .collect();
        let mut needed: HashSet<&str> = HashSet::new();
        for &table in tables {
            let mut current = table;
            while current != anchor && needed.insert(current) {
                match parents.get(current) {
                    Some(step) => current = step.left.as_str(),
                    None => break,
                }
            }
        }

        let steps: Vec<JoinStep> = span
            .steps
            .iter()
            .filter(|s| needed.contains(s.right.as_str()))
            .cloned()
            .collect();
        let mut route_tables = vec![anchor.to_string()];
        route_tables.extend(steps.iter().map(|s| s.right.clone()));

        Ok(Route {
            anchor: anchor.to_string(),
            tables: route_tables,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(left: &str, right: &str, kind: StepKind) -> JoinStep {
        JoinStep {
            left: left.into(),
            right: right.into(),
            left_keys: vec![format!("{}_key", left)],
            right_keys: vec![format!("{}_key", right)],
            kind,
        }
    }

    fn chain() -> JoinGraph {
        let mut graph = JoinGraph::default();
        for t in ["a", "b", "c", "d", "island"] {
            graph.add_table(t);
        }
        graph.connect(step("a", "b", StepKind::Inner));
        graph.connect(step("b", "c", StepKind::Inner));
        graph.connect(step("d", "c", StepKind::LeftOuter));
        graph
    }

    #[test]
    fn test_add_table_is_idempotent() {
        let mut graph = JoinGraph::default();
        let first = graph.add_table("a");
        assert_eq!(graph.add_table("a"), first);
        assert_eq!(graph.table_count(), 1);
    }

    #[test]
    fn test_span_orients_steps_from_anchor() {
        let span = chain().span("c");
        let pairs: Vec<_> = span
            .steps
            .iter()
            .map(|s| (s.left.as_str(), s.right.as_str(), s.kind))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("c", "b", StepKind::Inner),
                ("c", "d", StepKind::RightOuter),
                ("b", "a", StepKind::Inner),
            ]
        );
        assert!(!span.reaches("island"));
    }

    #[test]
    fn test_route_pulls_in_intermediate_tables() {
        let route = chain().route(&["a", "c"]).unwrap();
        assert_eq!(route.tables, vec!["a", "b", "c"]);
        assert_eq!(route.steps.len(), 2);
        assert_eq!(route.steps[1].left, "b");
    }

    #[test]
    fn test_route_single_table_has_no_steps() {
        let route = chain().route(&["d", "d"]).unwrap();
        assert_eq!(route.tables, vec!["d"]);
        assert!(route.steps.is_empty());
    }

    #[test]
    fn test_route_to_island_is_unreachable() {
        let err = chain().route(&["a", "island", "island"]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::unreachable("query from 'a'", vec!["island".into()])
        );
    }

    #[test]
    fn test_unknown_anchor_reaches_nothing() {
        let span = chain().span("nope");
        assert!(span.steps.is_empty());
        assert!(!span.reaches("nope"));
    }
}
