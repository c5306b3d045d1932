//! Join schema server library
//!
//! Loads schema documents that declare tables, typed columns and the joins
//! between them, validates them, plans every join and answers column queries
//! across the joined tables. The commands are served as MCP tools.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod query;
pub mod schema;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{SchemaError, ServiceError};
pub use mcp::JoinSchemaService;
pub use schema::ResolvedSchema;
