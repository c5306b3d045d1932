//! Command wire format.
//!
//! Requests arrive as `{"name": "<command>", "parameters": {...}}` and are answered
//! with `{"type": "<response type>", "content": ...}`.

use super::query::{Aggregator, Filter};
use crate::error::{ServiceError, ServiceResult};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseParams {
    /// Database name as given in its schema document.
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoadColumnsParams {
    pub database: String,
    /// Columns as `table.column`. A single entry without a dot selects every
    /// column of that table.
    pub columns: Vec<String>,
    /// Filter for this request.
    #[serde(default)]
    pub query: Option<Filter>,
    /// Filter shared by every request of a workspace, ANDed with `query`.
    #[serde(default)]
    pub global_query: Option<Filter>,
    /// Only keep rows whose index columns (of the first selected table) equal
    /// one of these tuples.
    #[serde(default)]
    pub data_ids: Option<Vec<Vec<JsonValue>>>,
    /// Reduce each requested column to a single value.
    #[serde(default)]
    pub aggregator: Option<Aggregator>,
    /// Maximum number of rows to return.
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetBoundsParams {
    pub database: String,
    /// Column as `table.column`.
    pub column: String,
}

/// Every command the service answers.
#[derive(Debug, Clone)]
pub enum Command {
    ListDatabases,
    LoadSchema(DatabaseParams),
    JoinPlan(DatabaseParams),
    LoadColumns(LoadColumnsParams),
    GetBounds(GetBoundsParams),
}

#[derive(Debug, Deserialize)]
struct WireCommand {
    name: String,
    #[serde(default)]
    parameters: JsonValue,
}

impl Command {
    pub const NAMES: &'static [&'static str] = &[
        "list databases",
        "load schema",
        "join plan",
        "load columns",
        "get bounds",
    ];

    /// Parse the JSON wire form.
    pub fn from_wire(text: &str) -> ServiceResult<Self> {
        let wire: WireCommand = serde_json::from_str(text)
            .map_err(|e| ServiceError::invalid_input(format!("Malformed command: {}", e)))?;
        Self::from_parts(&wire.name, wire.parameters)
    }

    /// Build a command from its name and parameter object.
    pub fn from_parts(name: &str, parameters: JsonValue) -> ServiceResult<Self> {
        match name {
            "list databases" => Ok(Self::ListDatabases),
            "load schema" => Ok(Self::LoadSchema(parameters_for(name, parameters)?)),
            "join plan" => Ok(Self::JoinPlan(parameters_for(name, parameters)?)),
            "load columns" => Ok(Self::LoadColumns(parameters_for(name, parameters)?)),
            "get bounds" => Ok(Self::GetBounds(parameters_for(name, parameters)?)),
            other => Err(ServiceError::invalid_input(format!(
                "Unknown command '{}'. Available commands: {}",
                other,
                Self::NAMES.join(", ")
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ListDatabases => "list databases",
            Self::LoadSchema(_) => "load schema",
            Self::JoinPlan(_) => "join plan",
            Self::LoadColumns(_) => "load columns",
            Self::GetBounds(_) => "get bounds",
        }
    }

    /// The `type` of a successful response to this command.
    pub fn response_type(&self) -> &'static str {
        match self {
            Self::ListDatabases => "database list",
            Self::LoadSchema(_) => "database schema",
            Self::JoinPlan(_) => "join plan",
            Self::LoadColumns(_) => "table columns",
            Self::GetBounds(_) => "column bounds",
        }
    }
}

fn parameters_for<T: DeserializeOwned>(name: &str, parameters: JsonValue) -> ServiceResult<T> {
    serde_json::from_value(parameters).map_err(|e| {
        ServiceError::invalid_input(format!("Invalid parameters for '{}': {}", name, e))
    })
}

/// Command response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Response {
    #[serde(rename = "type")]
    pub response_type: String,
    pub content: JsonValue,
}

impl Response {
    pub fn new(response_type: impl Into<String>, content: JsonValue) -> Self {
        Self {
            response_type: response_type.into(),
            content,
        }
    }

    /// Error response carrying the error kind, message and suggestion.
    pub fn error(err: &ServiceError) -> Self {
        Self::new(
            "error",
            serde_json::json!({
                "error": err.kind(),
                "description": err.to_string(),
                "suggestion": err.suggestion(),
            }),
        )
    }
}
