//! Query execution engine.
//!
//! Statements are executed with:
//! - Bound parameters
//! - Row limits (enforced via streaming - only fetches needed rows)
//! - Query timeouts
//!
//! Each backend has its own submodule with an identical `fetch_rows` so that rows
//! are decoded with their native row type.

use crate::db::params::{bind_postgres_param, bind_sqlite_param};
use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, QueryParam};
use crate::query::SelectStatement;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Rows returned by a statement, decoded by the statement's output columns.
#[derive(Debug, Clone, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    /// True when more rows matched than the limit allowed.
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl RowSet {
    /// Column-oriented view: label to list of values.
    pub fn into_columns(self) -> serde_json::Map<String, JsonValue> {
        let mut data: Vec<Vec<JsonValue>> = vec![Vec::with_capacity(self.rows.len()); self.columns.len()];
        for row in self.rows {
            for (i, value) in row.into_iter().enumerate() {
                if let Some(column) = data.get_mut(i) {
                    column.push(value);
                }
            }
        }
        self.columns
            .into_iter()
            .zip(data)
            .map(|(label, values)| (label, JsonValue::Array(values)))
            .collect()
    }
}

/// Query executor that handles database query execution.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    default_timeout: Duration,
    default_limit: u32,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS as u64),
            default_limit: DEFAULT_ROW_LIMIT,
        }
    }

    /// Create a new query executor with custom settings.
    pub fn with_defaults(timeout_secs: u64, row_limit: u32) -> Self {
        Self {
            default_timeout: Duration::from_secs(timeout_secs),
            default_limit: row_limit.clamp(1, MAX_ROW_LIMIT),
        }
    }

    /// Run a statement and return at most `limit` rows (the default limit when
    /// `None`).
    pub async fn fetch(
        &self,
        pool: &DbPool,
        statement: &SelectStatement,
        limit: Option<u32>,
    ) -> ServiceResult<RowSet> {
        let start = Instant::now();
        // Clamp to at least 1 so a zero limit does not mark every result as truncated
        let row_limit = limit
            .map(|l| l.clamp(1, MAX_ROW_LIMIT))
            .unwrap_or(self.default_limit);

        debug!(
            sql = %statement.sql,
            params = statement.params.len(),
            limit = row_limit,
            timeout_secs = self.default_timeout.as_secs(),
            "Executing query"
        );

        let mut rows = match pool {
            DbPool::Postgres(p) => postgres::fetch_rows(
                p,
                &statement.sql,
                &statement.params,
                row_limit,
                self.default_timeout,
            )
            .await?
            .iter()
            .map(|r| r.to_json_values(&statement.columns))
            .collect::<Vec<_>>(),
            DbPool::SQLite(p) => sqlite::fetch_rows(
                p,
                &statement.sql,
                &statement.params,
                row_limit,
                self.default_timeout,
            )
            .await?
            .iter()
            .map(|r| r.to_json_values(&statement.columns))
            .collect::<Vec<_>>(),
        };

        let truncated = rows.len() > row_limit as usize;
        if truncated {
            rows.truncate(row_limit as usize);
            warn!(limit = row_limit, "Query result truncated");
        }

        Ok(RowSet {
            columns: statement.columns.iter().map(|c| c.label.clone()).collect(),
            rows,
            truncated,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> ServiceResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(ServiceError::from)?);
    }
    Ok(rows)
}

fn timeout_error(operation: &str, timeout: Duration) -> ServiceError {
    ServiceError::timeout(operation, timeout.as_secs() as u32)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        params: &[QueryParam],
        row_limit: u32,
        query_timeout: Duration,
    ) -> ServiceResult<Vec<PgRow>> {
        let fetch_limit = row_limit as usize + 1;
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_postgres_param(query, param);
        }
        let rows_future = query.fetch(pool).take(fetch_limit).collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqlitePool;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        params: &[QueryParam],
        row_limit: u32,
        query_timeout: Duration,
    ) -> ServiceResult<Vec<SqliteRow>> {
        let fetch_limit = row_limit as usize + 1;
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_sqlite_param(query, param);
        }
        let rows_future = query.fetch(pool).take(fetch_limit).collect::<Vec<_>>();

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_defaults() {
        let executor = QueryExecutor::new();
        assert_eq!(
            executor.default_timeout,
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS as u64)
        );
        assert_eq!(executor.default_limit, DEFAULT_ROW_LIMIT);
    }

    #[test]
    fn test_executor_limit_capped() {
        let executor = QueryExecutor::with_defaults(30, u32::MAX);
        assert_eq!(executor.default_limit, MAX_ROW_LIMIT);
        let executor = QueryExecutor::with_defaults(30, 0);
        assert_eq!(executor.default_limit, 1);
    }

    #[test]
    fn test_row_set_into_columns() {
        let rows = RowSet {
            columns: vec!["t.a".into(), "t.b".into()],
            rows: vec![
                vec![serde_json::json!(1), serde_json::json!("x")],
                vec![serde_json::json!(2), serde_json::json!("y")],
            ],
            truncated: false,
            execution_time_ms: 0,
        };
        let data = rows.into_columns();
        assert_eq!(data["t.a"], serde_json::json!([1, 2]));
        assert_eq!(data["t.b"], serde_json::json!(["x", "y"]));
    }
}
