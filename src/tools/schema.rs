//! Schema tools.
//!
//! This module implements the `list databases`, `load schema` and `join plan`
//! commands. None of them touch a database connection.

use crate::db::{Catalog, DatabaseSummary};
use crate::error::ServiceResult;
use crate::models::{Database, DatabaseParams};
use crate::schema::JoinPlan;
use schemars::JsonSchema;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Output for the list databases command.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListDatabasesOutput {
    pub databases: Vec<DatabaseSummary>,
    pub count: usize,
}

/// Output for the join plan command.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct JoinPlanOutput {
    pub database: String,
    /// One plan per declared join, in declaration order.
    pub plans: Vec<JoinPlan>,
}

pub struct SchemaToolHandler {
    catalog: Arc<Catalog>,
}

impl SchemaToolHandler {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub async fn list_databases(&self) -> ListDatabasesOutput {
        let databases = self.catalog.summaries().await;
        let count = databases.len();
        info!(count = count, "Listed databases");
        ListDatabasesOutput { databases, count }
    }

    /// The validated schema document of one database.
    pub async fn load_schema(&self, input: DatabaseParams) -> ServiceResult<Database> {
        let source = self.catalog.get(&input.database).await?;
        info!(
            database = %input.database,
            tables = source.schema.database.tables.len(),
            "Loaded schema"
        );
        Ok(source.schema.database.clone())
    }

    pub async fn join_plan(&self, input: DatabaseParams) -> ServiceResult<JoinPlanOutput> {
        let source = self.catalog.get(&input.database).await?;
        Ok(JoinPlanOutput {
            database: input.database,
            plans: source.schema.plans.clone(),
        })
    }
}
