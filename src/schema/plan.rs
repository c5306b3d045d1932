//! Pairwise decomposition of n-way joins into ordered binary join steps.

use super::graph::JoinGraph;
use crate::error::SchemaError;
use crate::models::{Database, Join, JoinType};
use schemars::JsonSchema;
use serde::Serialize;

/// How the right-hand table of a step is attached to the rows built so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Inner,
    /// Keep every row of the left side.
    LeftOuter,
    /// Keep every row of the right side.
    RightOuter,
    FullOuter,
}

impl StepKind {
    /// The same join seen from the other side.
    pub fn flipped(self) -> Self {
        match self {
            Self::LeftOuter => Self::RightOuter,
            Self::RightOuter => Self::LeftOuter,
            other => other,
        }
    }

    pub fn sql_keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::LeftOuter => "LEFT OUTER JOIN",
            Self::RightOuter => "RIGHT OUTER JOIN",
            Self::FullOuter => "FULL OUTER JOIN",
        }
    }
}

/// One binary join: `left.left_keys[i] = right.right_keys[i]` for every `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct JoinStep {
    pub left: String,
    pub right: String,
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    #[serde(rename = "type")]
    pub kind: StepKind,
}

impl JoinStep {
    /// Swap the two sides, keeping the meaning of the join.
    pub fn reversed(&self) -> Self {
        Self {
            left: self.right.clone(),
            right: self.left.clone(),
            left_keys: self.right_keys.clone(),
            right_keys: self.left_keys.clone(),
            kind: self.kind.flipped(),
        }
    }
}

/// Ordered binary decomposition of one declared join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct JoinPlan {
    /// Position of the join in the schema document.
    pub join: usize,
    #[serde(rename = "type")]
    pub join_type: String,
    /// Table the chain of steps starts from.
    pub anchor: String,
    /// Every table of the join, anchor first, then declaration order.
    pub tables: Vec<String>,
    pub steps: Vec<JoinStep>,
}

/// Table the decomposition starts from. Outer joins start from the preserved side.
fn anchor_of(join: &Join) -> &str {
    let first = join.matches.first().map(|m| m.table.as_str()).unwrap_or_default();
    match join.join_type {
        JoinType::Inner | JoinType::Left => first,
        JoinType::Right => join
            .matches
            .last()
            .map(|m| m.table.as_str())
            .unwrap_or_default(),
        JoinType::Outer => join.preserve.as_deref().unwrap_or(first),
    }
}

fn step_kind(join: &Join) -> StepKind {
    match join.join_type {
        JoinType::Inner => StepKind::Inner,
        JoinType::Outer if join.preserve.is_none() => StepKind::FullOuter,
        JoinType::Outer | JoinType::Left | JoinType::Right => StepKind::LeftOuter,
    }
}

/// Decompose the join at `position` into binary steps.
///
/// Two tables can be joined directly when their key lists have the same length.
/// The steps form a breadth-first spanning tree rooted at the anchor table, with
/// neighbours visited in declaration order. Each step is oriented from the table
/// already joined towards the newly attached one, so an outer join always
/// preserves the anchor side.
pub fn build_plan(join: &Join, position: usize) -> Result<JoinPlan, SchemaError> {
    let anchor = anchor_of(join);
    let kind = step_kind(join);

    let mut graph = JoinGraph::default();
    for m in &join.matches {
        graph.add_table(&m.table);
    }
    for (i, a) in join.matches.iter().enumerate() {
        for b in &join.matches[i + 1..] {
            if a.keys.len() != b.keys.len() {
                continue;
            }
            let (left, right) = if b.table == anchor { (b, a) } else { (a, b) };
            graph.connect(JoinStep {
                left: left.table.clone(),
                right: right.table.clone(),
                left_keys: left.keys.clone(),
                right_keys: right.keys.clone(),
                kind,
            });
        }
    }

    let tree = graph.span(anchor);
    let unreachable: Vec<String> = join
        .tables()
        .filter(|t| !tree.reaches(t))
        .map(str::to_string)
        .collect();
    if !unreachable.is_empty() {
        return Err(SchemaError::unreachable(
            format!("joins[{}]", position),
            unreachable,
        ));
    }

    let mut tables = vec![anchor.to_string()];
    tables.extend(join.tables().filter(|t| *t != anchor).map(str::to_string));

    Ok(JoinPlan {
        join: position,
        join_type: join.join_type.to_string(),
        anchor: anchor.to_string(),
        tables,
        steps: tree.steps,
    })
}

/// Plans for every join of a database, in declaration order.
pub fn build_plans(database: &Database) -> Result<Vec<JoinPlan>, SchemaError> {
    database
        .joins
        .iter()
        .enumerate()
        .map(|(i, join)| build_plan(join, i))
        .collect()
}
