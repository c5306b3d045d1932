//! Data tools.
//!
//! This module implements the `load columns` and `get bounds` commands. Both
//! build a statement from the schema, so no SQL text ever comes from clients.

use crate::db::Catalog;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Filter, GetBoundsParams, LoadColumnsParams};
use crate::query::{ColumnsRequest, build_bounds_query, build_columns_query};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tracing::info;

/// Output for the load columns command.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct LoadColumnsOutput {
    /// Database the columns were read from.
    pub schema: String,
    /// Labels of the columns the client asked for, as `table.column`.
    pub columns: Vec<String>,
    /// Values keyed by column label. Index columns are included.
    pub data: Map<String, JsonValue>,
    /// True when the row limit cut the result short.
    pub truncated: bool,
}

/// Output for the get bounds command.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct GetBoundsOutput {
    pub column: String,
    /// `[min, max]`, both null when the column has no values.
    pub bounds: [JsonValue; 2],
}

pub struct QueryToolHandler {
    catalog: Arc<Catalog>,
}

impl QueryToolHandler {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub async fn load_columns(&self, input: LoadColumnsParams) -> ServiceResult<LoadColumnsOutput> {
        let source = self.catalog.get(&input.database).await?;
        let dialect = source.pool()?.dialect();
        let filter = Filter::and(input.query, input.global_query);
        let request = ColumnsRequest {
            columns: &input.columns,
            filter: filter.as_ref(),
            data_ids: input.data_ids.as_deref(),
            aggregator: input.aggregator,
        };
        let statement = build_columns_query(&source.schema, dialect, &request)?;
        let limit = if input.aggregator.is_some() { Some(1) } else { input.limit };
        let rows = self.catalog.fetch(&source, &statement, limit).await?;

        info!(
            database = %input.database,
            tables = statement.tables.len(),
            rows = rows.rows.len(),
            truncated = rows.truncated,
            execution_time_ms = rows.execution_time_ms,
            "Loaded columns"
        );

        let truncated = rows.truncated;
        Ok(LoadColumnsOutput {
            schema: input.database,
            columns: statement.requested,
            data: rows.into_columns(),
            truncated,
        })
    }

    pub async fn get_bounds(&self, input: GetBoundsParams) -> ServiceResult<GetBoundsOutput> {
        let source = self.catalog.get(&input.database).await?;
        let statement = build_bounds_query(&source.schema, &input.column)?;
        let rows = self.catalog.fetch(&source, &statement, Some(1)).await?;
        let mut row = rows
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::internal("Bounds query returned no rows"))?
            .into_iter();
        let min = row.next().unwrap_or(JsonValue::Null);
        let max = row.next().unwrap_or(JsonValue::Null);
        info!(database = %input.database, column = %input.column, "Computed bounds");
        Ok(GetBoundsOutput {
            column: input.column,
            bounds: [min, max],
        })
    }
}
