//! Command dispatch.
//!
//! Routes a parsed [`Command`] to its handler and wraps the result in the
//! `{"type", "content"}` response envelope.

use crate::db::Catalog;
use crate::error::{ServiceError, ServiceResult};
use crate::models::{Command, Response};
use crate::tools::query::QueryToolHandler;
use crate::tools::schema::SchemaToolHandler;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, warn};

/// Input for the execute_command tool: one command in wire form.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteCommandInput {
    /// Command name, e.g. "load columns".
    pub name: String,
    /// Command parameters.
    #[serde(default)]
    pub parameters: JsonValue,
}

pub struct CommandHandler {
    schema: SchemaToolHandler,
    query: QueryToolHandler,
}

impl CommandHandler {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            schema: SchemaToolHandler::new(catalog.clone()),
            query: QueryToolHandler::new(catalog),
        }
    }

    /// Run a command and return its response content.
    pub async fn dispatch(&self, command: Command) -> ServiceResult<JsonValue> {
        debug!(command = command.name(), "Dispatching command");
        match command {
            Command::ListDatabases => to_content(self.schema.list_databases().await),
            Command::LoadSchema(params) => to_content(self.schema.load_schema(params).await?),
            Command::JoinPlan(params) => to_content(self.schema.join_plan(params).await?),
            Command::LoadColumns(params) => to_content(self.query.load_columns(params).await?),
            Command::GetBounds(params) => to_content(self.query.get_bounds(params).await?),
        }
    }

    /// Run a command and wrap the outcome in a response. Failures become error
    /// responses instead of propagating.
    pub async fn execute(&self, command: Command) -> Response {
        let name = command.name();
        let response_type = command.response_type();
        match self.dispatch(command).await {
            Ok(content) => Response::new(response_type, content),
            Err(err) => {
                warn!(command = name, error = %err, "Command failed");
                Response::error(&err)
            }
        }
    }

    /// Parse and run a command from its parts.
    pub async fn execute_parts(&self, input: ExecuteCommandInput) -> Response {
        match Command::from_parts(&input.name, input.parameters) {
            Ok(command) => self.execute(command).await,
            Err(err) => {
                warn!(command = %input.name, error = %err, "Rejected command");
                Response::error(&err)
            }
        }
    }

    /// Parse and run a command from its JSON text.
    pub async fn execute_wire(&self, text: &str) -> Response {
        match Command::from_wire(text) {
            Ok(command) => self.execute(command).await,
            Err(err) => {
                warn!(error = %err, "Rejected command");
                Response::error(&err)
            }
        }
    }
}

fn to_content<T: Serialize>(output: T) -> ServiceResult<JsonValue> {
    serde_json::to_value(output)
        .map_err(|e| ServiceError::internal(format!("Failed to serialize response: {}", e)))
}
