//! Error types for the join schema server.
//!
//! Two layers are defined here using `thiserror`:
//! - [`SchemaError`]: failures while loading a schema document or planning its joins.
//!   These are fatal for the schema being loaded and always carry the offending path.
//! - [`ServiceError`]: failures while serving commands (connections, queries, lookups).
//!   Each variant provides an actionable message for the caller.

use thiserror::Error;

/// Failure raised while loading, validating or planning a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The document does not have the expected shape.
    #[error("Schema syntax error at {path}: {message}")]
    Syntax { path: String, message: String },

    /// A name refers to a table or column that is not declared.
    #[error("Schema reference error at {path}: {object} '{name}' is not declared")]
    Reference {
        path: String,
        /// "table" or "column"
        object: String,
        name: String,
    },

    /// A name is declared more than once within the same scope.
    #[error("Schema duplicate error at {path}: {object} '{name}' is declared more than once")]
    Duplicate {
        path: String,
        object: String,
        name: String,
    },

    /// Join key columns matched against each other have incompatible datatypes.
    #[error("Schema type error at {path}: {message}")]
    TypeMismatch { path: String, message: String },

    /// The tables of a join cannot be linked into a single chain of binary joins.
    #[error("Join plan unreachable for {join}: tables {} cannot be connected", .tables.join(", "))]
    JoinPlanUnreachable { join: String, tables: Vec<String> },
}

impl SchemaError {
    /// Create a syntax error.
    pub fn syntax(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a dangling reference error.
    pub fn reference(
        path: impl Into<String>,
        object: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Reference {
            path: path.into(),
            object: object.into(),
            name: name.into(),
        }
    }

    /// Create a duplicate name error.
    pub fn duplicate(
        path: impl Into<String>,
        object: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Duplicate {
            path: path.into(),
            object: object.into(),
            name: name.into(),
        }
    }

    /// Create a datatype mismatch error.
    pub fn type_mismatch(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unreachable join plan error.
    pub fn unreachable(join: impl Into<String>, tables: Vec<String>) -> Self {
        Self::JoinPlanUnreachable {
            join: join.into(),
            tables,
        }
    }

    /// The document path (or join path) the error points at.
    pub fn path(&self) -> &str {
        match self {
            Self::Syntax { path, .. }
            | Self::Reference { path, .. }
            | Self::Duplicate { path, .. }
            | Self::TypeMismatch { path, .. } => path,
            Self::JoinPlanUnreachable { join, .. } => join,
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "SchemaSyntaxError",
            Self::Reference { .. } => "SchemaReferenceError",
            Self::Duplicate { .. } => "SchemaDuplicateError",
            Self::TypeMismatch { .. } => "SchemaTypeError",
            Self::JoinPlanUnreachable { .. } => "JoinPlanUnreachableError",
        }
    }
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Query error: {message}")]
    Query { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Database '{database}' not found: {hint}")]
    DatabaseNotFound { database: String, hint: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ServiceError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a query construction error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create a database not found error.
    pub fn database_not_found(database: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::DatabaseNotFound {
            database: database.into(),
            hint: hint.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::DatabaseNotFound { hint, .. } => Some(hint),
            Self::Schema(_) => Some("Fix the schema document and restart the server"),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// Short machine-readable name of the error kind, used in command responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "ConnectionError",
            Self::Database { .. } => "DatabaseError",
            Self::Schema(err) => err.kind(),
            Self::Query { .. } => "QueryError",
            Self::Timeout { .. } => "TimeoutError",
            Self::DatabaseNotFound { .. } => "DatabaseNotFoundError",
            Self::InvalidInput { .. } => "InvalidInputError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

/// Convert sqlx errors to ServiceError.
impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => ServiceError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                ServiceError::database(
                    db_err.message(),
                    code,
                    "Check that the schema document matches the tables in the database",
                )
            }
            sqlx::Error::RowNotFound => ServiceError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => ServiceError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                ServiceError::connection("Connection pool is closed", "Restart the server")
            }
            sqlx::Error::Io(io_err) => ServiceError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => ServiceError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => ServiceError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                ServiceError::query(format!("Column not found in result set: {}", col))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                ServiceError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => {
                ServiceError::internal(format!("Decode error: {}", source))
            }
            sqlx::Error::WorkerCrashed => ServiceError::internal("Database worker crashed"),
            _ => ServiceError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert ServiceError to MCP ErrorData for semantic error categorization.
impl From<ServiceError> for rmcp::ErrorData {
    fn from(err: ServiceError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            ServiceError::InvalidInput { .. }
            | ServiceError::Query { .. }
            | ServiceError::Schema(_) => rmcp::ErrorData::invalid_params(err.to_string(), data),

            ServiceError::DatabaseNotFound { .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), data)
            }

            ServiceError::Database {
                message, sql_state, ..
            } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }

            ServiceError::Connection { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
            ServiceError::Timeout { .. } => rmcp::ErrorData::internal_error(
                err.to_string(),
                suggestion_data(Some(
                    "Consider increasing the timeout or narrowing the query",
                )),
            ),
            ServiceError::Internal { .. } => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display_includes_path() {
        let err = SchemaError::duplicate("tables[0].columns[2].name", "column", "ra");
        let msg = err.to_string();
        assert!(msg.contains("tables[0].columns[2].name"));
        assert!(msg.contains("'ra'"));
    }

    #[test]
    fn test_unreachable_lists_tables() {
        let err = SchemaError::unreachable("joins[1]", vec!["a".into(), "b".into()]);
        assert_eq!(err.path(), "joins[1]");
        assert!(err.to_string().contains("a, b"));
        assert_eq!(err.kind(), "JoinPlanUnreachableError");
    }

    #[test]
    fn test_schema_error_converts_to_service_error() {
        let err: ServiceError = SchemaError::reference("joins[0].matches.visit2", "table", "visit2").into();
        assert_eq!(err.kind(), "SchemaReferenceError");
        assert!(err.to_string().contains("visit2"));
    }

    #[test]
    fn test_error_retryable() {
        assert!(ServiceError::timeout("query", 30).is_retryable());
        assert!(ServiceError::connection("err", "sugg").is_retryable());
        assert!(!ServiceError::query("bad column").is_retryable());
    }

    #[test]
    fn test_query_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = ServiceError::query("bad").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_database_not_found_maps_to_resource_not_found() {
        let err = ServiceError::database_not_found("visitdb", "call list_databases");
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.code.0, -32002);
        assert_eq!(mcp_err.data.unwrap()["suggestion"], "call list_databases");
    }

    #[test]
    fn test_timeout_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData = ServiceError::timeout("query", 30).into();
        assert_eq!(mcp_err.code.0, -32603);
    }

    #[test]
    fn test_database_error_includes_sql_state() {
        let err = ServiceError::database("no such table", Some("42P01".to_string()), "check");
        let mcp_err: rmcp::ErrorData = err.into();
        assert!(mcp_err.message.contains("42P01"));
    }
}
