//! Core abstractions for the subsetting engine.
//!
//! - [`schema`]: column, row, row key, and foreign key types
//! - [`value`]: SQL value representation
//! - [`traits`]: introspection, source, and target collaborator traits

pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{Column, ForeignKeyEdge, Row, RowKey};
pub use traits::{SchemaIntrospector, SourceDatabase, SourceReader, TableSink, TargetWriter};
pub use value::{SqlNullType, SqlValue};
