//! Data models for the join schema server.
//!
//! This module re-exports all model types used throughout the application.

pub mod command;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use command::{Command, DatabaseParams, GetBoundsParams, LoadColumnsParams, Response};
pub use query::{
    Aggregator, BoolOperator, DEFAULT_QUERY_TIMEOUT_SECS, DEFAULT_ROW_LIMIT, EqualityFilter,
    FieldRef, Filter, MAX_QUERY_TIMEOUT_SECS, MAX_ROW_LIMIT, Operator, ParentFilter, QueryParam,
};
pub use schema::{Column, Database, Datatype, DatatypeFamily, Join, JoinMatch, JoinType, Table};
