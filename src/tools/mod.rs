//! Command handlers.
//!
//! - `schema`: list databases, load schema, join plan
//! - `query`: load columns, get bounds
//! - `command`: dispatch of the command wire form

pub mod command;
pub mod query;
pub mod schema;

pub use command::{CommandHandler, ExecuteCommandInput};
pub use query::{GetBoundsOutput, LoadColumnsOutput, QueryToolHandler};
pub use schema::{JoinPlanOutput, ListDatabasesOutput, SchemaToolHandler};
