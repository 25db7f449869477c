//! # mysql-subset
//!
//! Referentially-consistent subsetting of a MySQL database.
//!
//! Starting from the rows of a root table that match a filter (e.g. every
//! customer in one city), the library collects the transitive closure of
//! rows connected to them by foreign keys, in both directions, and copies
//! exactly that set into a target database:
//!
//! - **Schema introspection** of primary keys and foreign keys
//! - **Breadth-first closure** with per-table row-key deduplication, so
//!   cyclic and self-referencing schemas terminate
//! - **Topological loading** with per-row failure isolation
//! - **Structured reports** of skipped rows and dangling references
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_subset::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(false).await?;
//!     println!("Copied {} rows", result.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod graph;
pub mod orchestrator;
pub mod subset;

// Re-exports for convenient access
pub use config::{CityFilter, Config, ConnectionConfig, InsertOrder, SubsetConfig};
pub use crate::core::{Column, ForeignKeyEdge, Row, RowKey, SqlNullType, SqlValue};
pub use error::{Result, SubsetError};
pub use graph::{InsertStep, RelationshipGraph};
pub use orchestrator::{HealthCheckResult, Orchestrator, SubsetResult, TableSummary};
pub use subset::{Closure, ClosureBuilder, DanglingReference, MaterializeReport, Materializer};
