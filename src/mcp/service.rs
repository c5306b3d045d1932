//! MCP service implementation using rmcp.
//!
//! This module defines the JoinSchemaService struct with every command exposed
//! as an MCP tool using the rmcp framework's macros.

use crate::db::Catalog;
use crate::error::ServiceError;
use crate::models::{Database, DatabaseParams, GetBoundsParams, LoadColumnsParams, Response};
use crate::tools::{
    CommandHandler, ExecuteCommandInput, GetBoundsOutput, JoinPlanOutput, ListDatabasesOutput,
    LoadColumnsOutput, QueryToolHandler, SchemaToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct JoinSchemaService {
    /// Shared catalog of served databases
    catalog: Arc<Catalog>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl JoinSchemaService {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            tool_router: Self::tool_router(),
        }
    }

    /// Ensure a database name was given.
    fn validate_database(&self, provided: &str) -> Result<String, McpError> {
        let trimmed = provided.trim();
        if trimmed.is_empty() {
            Err(McpError::invalid_params(
                "database is required. Call list_databases first to get available names.",
                None,
            ))
        } else {
            Ok(trimmed.to_string())
        }
    }
}

#[tool_router]
impl JoinSchemaService {
    #[tool(
        description = "List the databases this server knows.\nReturns each database's name, description and tables."
    )]
    async fn list_databases(&self) -> Json<ListDatabasesOutput> {
        let handler = SchemaToolHandler::new(self.catalog.clone());
        Json(handler.list_databases().await)
    }

    #[tool(
        description = "Return the validated schema document of a database: tables, their index columns, typed columns and declared joins."
    )]
    async fn load_schema(
        &self,
        Parameters(input): Parameters<DatabaseParams>,
    ) -> Result<Json<Database>, McpError> {
        let mut input = input;
        input.database = self.validate_database(&input.database)?;
        let handler = SchemaToolHandler::new(self.catalog.clone());
        handler
            .load_schema(input)
            .await
            .map(Json)
            .map_err(|e: ServiceError| e.into())
    }

    #[tool(
        description = "Return the join plan of every declared join of a database.\nEach plan lists its anchor table and the binary join steps (left, right, keys, type) that connect every table of the join."
    )]
    async fn join_plan(
        &self,
        Parameters(input): Parameters<DatabaseParams>,
    ) -> Result<Json<JoinPlanOutput>, McpError> {
        let mut input = input;
        input.database = self.validate_database(&input.database)?;
        let handler = SchemaToolHandler::new(self.catalog.clone());
        handler
            .join_plan(input)
            .await
            .map(Json)
            .map_err(|e: ServiceError| e.into())
    }

    #[tool(
        description = "Load column values, joining tables as the schema declares.\nColumns are written as table.column; a single bare table name loads all of its columns.\nOptional `query` and `global_query` filter trees are ANDed together. `data_ids` restricts rows to index value tuples of the first table. `aggregator` (count, sum, avg, min, max) reduces each column to one value."
    )]
    async fn load_columns(
        &self,
        Parameters(input): Parameters<LoadColumnsParams>,
    ) -> Result<Json<LoadColumnsOutput>, McpError> {
        let mut input = input;
        input.database = self.validate_database(&input.database)?;
        let handler = QueryToolHandler::new(self.catalog.clone());
        handler
            .load_columns(input)
            .await
            .map(Json)
            .map_err(|e: ServiceError| e.into())
    }

    #[tool(description = "Return [min, max] of one column, written as table.column.")]
    async fn get_bounds(
        &self,
        Parameters(input): Parameters<GetBoundsParams>,
    ) -> Result<Json<GetBoundsOutput>, McpError> {
        let mut input = input;
        input.database = self.validate_database(&input.database)?;
        let handler = QueryToolHandler::new(self.catalog.clone());
        handler
            .get_bounds(input)
            .await
            .map(Json)
            .map_err(|e: ServiceError| e.into())
    }

    #[tool(
        description = "Run a command given as {name, parameters}.\nNames: list databases, load schema, join plan, load columns, get bounds.\nAnswers {type, content}; failures answer type \"error\" with error, description and suggestion."
    )]
    async fn execute_command(
        &self,
        Parameters(input): Parameters<ExecuteCommandInput>,
    ) -> Json<Response> {
        let handler = CommandHandler::new(self.catalog.clone());
        Json(handler.execute_parts(input).await)
    }
}

#[tool_handler]
impl ServerHandler for JoinSchemaService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "join-schema-server".to_owned(),
                title: Some("Join Schema Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for exploring databases described by join schema documents.\n\
                \n\
                ## Workflow\n\
                1. Call `list_databases` to get available database names\n\
                2. Call `load_schema` to see tables, columns and joins\n\
                3. Call `load_columns` with `table.column` names; tables are joined for you\n\
                \n\
                ## Filters\n\
                `query` is a tree of `EqualityQuery` leaves (field, leftOperator/leftValue,\n\
                rightOperator/rightValue) and `ParentQuery` nodes (AND, OR, NOT, XOR).\n\
                \n\
                ## Schema-only databases\n\
                Databases without a connection answer `load_schema` and `join_plan` only."
                    .to_string(),
            ),
        }
    }
}
