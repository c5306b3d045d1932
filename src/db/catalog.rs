//! Registry of served databases.
//!
//! Each entry pairs a resolved schema with the pool used to query it. Entries are
//! registered at startup and looked up by name for every command.

use crate::config::DataSourceConfig;
use crate::db::executor::{QueryExecutor, RowSet};
use crate::db::pool::{DatabaseType, DbPool};
use crate::error::{ServiceError, ServiceResult};
use crate::query::SelectStatement;
use crate::schema::ResolvedSchema;
use schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Summary of a served database, as listed to clients.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DatabaseSummary {
    /// Name to pass as `database` in every other command.
    pub name: String,
    pub description: String,
    pub tables: Vec<String>,
    /// Backend type, absent for schema-only sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_type: Option<DatabaseType>,
}

/// A schema plus the pool its tables live in.
#[derive(Debug, Clone)]
pub struct DataSource {
    pub schema: Arc<ResolvedSchema>,
    pub pool: Option<DbPool>,
}

impl DataSource {
    /// Load the schema document and connect to the database, if any.
    pub async fn open(config: &DataSourceConfig) -> ServiceResult<Self> {
        let schema = ResolvedSchema::from_path(&config.schema_path)?;
        let pool = match &config.connection_string {
            Some(conn) => Some(DbPool::connect(conn, &config.pool_options).await?),
            None => None,
        };
        Ok(Self {
            schema: Arc::new(schema),
            pool,
        })
    }

    /// The pool, or a connection error for schema-only sources.
    pub fn pool(&self) -> ServiceResult<&DbPool> {
        self.pool.as_ref().ok_or_else(|| {
            ServiceError::connection(
                format!(
                    "Database '{}' is served from its schema document only",
                    self.schema.database.name
                ),
                "Configure it with --database url?schema=path to query its data",
            )
        })
    }
}

#[derive(Debug, Default)]
pub struct Catalog {
    sources: RwLock<BTreeMap<String, DataSource>>,
    executor: QueryExecutor,
}

impl Catalog {
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            sources: RwLock::new(BTreeMap::new()),
            executor,
        }
    }

    /// Register a source under `name`, or under its schema's database name.
    pub async fn insert(&self, name: Option<String>, source: DataSource) -> ServiceResult<String> {
        let name = name.unwrap_or_else(|| source.schema.database.name.clone());
        let rejected = {
            let mut sources = self.sources.write().await;
            if sources.contains_key(&name) {
                Some(source)
            } else {
                info!(
                    database = %name,
                    tables = source.schema.database.tables.len(),
                    joins = source.schema.plans.len(),
                    connected = source.pool.is_some(),
                    "Database registered"
                );
                sources.insert(name.clone(), source);
                None
            }
        };

        // Close the rejected pool outside of lock
        if let Some(source) = rejected {
            if let Some(pool) = source.pool {
                pool.close().await;
            }
            return Err(ServiceError::invalid_input(format!(
                "Database '{}' is configured more than once",
                name
            )));
        }
        Ok(name)
    }

    /// Open and register a configured source.
    pub async fn open(&self, config: &DataSourceConfig) -> ServiceResult<String> {
        let source = DataSource::open(config).await?;
        self.insert(config.id.clone(), source).await
    }

    pub async fn get(&self, name: &str) -> ServiceResult<DataSource> {
        let sources = self.sources.read().await;
        match sources.get(name) {
            Some(source) => Ok(source.clone()),
            None => {
                let available: Vec<&str> = sources.keys().map(String::as_str).collect();
                let hint = if available.is_empty() {
                    "No databases are configured".to_string()
                } else {
                    format!("Available databases: {}", available.join(", "))
                };
                Err(ServiceError::database_not_found(name, hint))
            }
        }
    }

    pub async fn summaries(&self) -> Vec<DatabaseSummary> {
        let sources = self.sources.read().await;
        sources
            .iter()
            .map(|(name, source)| DatabaseSummary {
                name: name.clone(),
                description: source.schema.database.description.clone(),
                tables: source
                    .schema
                    .database
                    .table_names()
                    .into_iter()
                    .map(String::from)
                    .collect(),
                db_type: source.pool.as_ref().map(DbPool::db_type),
            })
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sources.read().await.is_empty()
    }

    /// Run a statement against a source's pool.
    pub async fn fetch(
        &self,
        source: &DataSource,
        statement: &SelectStatement,
        limit: Option<u32>,
    ) -> ServiceResult<RowSet> {
        self.executor.fetch(source.pool()?, statement, limit).await
    }

    /// Close all pools and clear the catalog.
    pub async fn close_all(&self) {
        let mut sources = self.sources.write().await;
        while let Some((name, source)) = sources.pop_first() {
            if let Some(pool) = source.pool {
                info!(database = %name, "Closing connection");
                pool.close().await;
            }
        }
        info!("All connections closed");
    }
}
