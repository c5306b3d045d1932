//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Connection pool management
//! - Query execution
//! - Type mappings
//! - The catalog of served databases

pub mod catalog;
pub mod executor;
pub mod params;
pub mod pool;
pub mod types;

pub use catalog::{Catalog, DataSource, DatabaseSummary};
pub use executor::{QueryExecutor, RowSet};
pub use pool::{DatabaseType, DbPool};
