//! Schema loading, validation and join planning.
//!
//! [`ResolvedSchema`] is the immutable result of loading one schema document:
//! the validated [`Database`], one [`JoinPlan`] per declared join, and the
//! database-wide [`JoinGraph`] used to route queries across joins.

pub mod graph;
pub mod loader;
pub mod plan;

pub use graph::{JoinGraph, Route, Span};
pub use plan::{JoinPlan, JoinStep, StepKind, build_plan, build_plans};

use crate::error::SchemaError;
use crate::models::Database;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    pub database: Database,
    pub plans: Vec<JoinPlan>,
    graph: JoinGraph,
}

impl ResolvedSchema {
    /// Plan every join of a validated database.
    pub fn resolve(database: Database) -> Result<Self, SchemaError> {
        let plans = build_plans(&database)?;
        let graph = JoinGraph::for_database(&database, &plans);
        Ok(Self {
            database,
            plans,
            graph,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        let resolved = Self::resolve(loader::from_path(path)?)?;
        info!(
            database = %resolved.database.name,
            path = %path.display(),
            tables = resolved.database.tables.len(),
            joins = resolved.plans.len(),
            "Schema loaded"
        );
        Ok(resolved)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        Self::resolve(loader::from_yaml_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        Self::resolve(loader::from_json_str(text)?)
    }

    pub fn graph(&self) -> &JoinGraph {
        &self.graph
    }

    /// Connect the given tables through the database's joins.
    pub fn route(&self, tables: &[&str]) -> Result<Route, SchemaError> {
        self.graph.route(tables)
    }
}
