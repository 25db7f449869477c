//! Core traits the subsetting engine calls into.
//!
//! - [`SchemaIntrospector`]: catalog metadata (primary keys, foreign keys)
//! - [`SourceReader`]: row fetches against the source
//! - [`TargetWriter`] / [`TableSink`]: clearing and loading the target
//!
//! The closure builder and materializer only see these traits, so the same
//! algorithms run against MySQL and against the in-memory driver.

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{ForeignKeyEdge, Row, RowKey};
use super::value::SqlValue;

/// Read-only catalog queries against the source schema.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Primary key columns of `table`, in ordinal order.
    ///
    /// Returns an empty vector when the table exists but has no primary key,
    /// and a schema error when the table does not exist.
    async fn primary_key(&self, table: &str) -> Result<Vec<String>>;

    /// Every foreign key edge in the schema, in a single catalog round-trip.
    async fn foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>>;
}

/// Row fetches against the source.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Seed rows: all rows of `table` whose `column` equals one of `values`.
    async fn fetch_seed(&self, table: &str, column: &str, values: &[String]) -> Result<Vec<Row>>;

    /// Point lookup: at most one row of `table` where `column = value`.
    async fn fetch_one_by_column(
        &self,
        table: &str,
        column: &str,
        value: &SqlValue,
    ) -> Result<Option<Row>>;

    /// Filtered scan: every row of `table` where `column = value`.
    async fn fetch_by_column(&self, table: &str, column: &str, value: &SqlValue)
        -> Result<Vec<Row>>;

    /// Check that the source is reachable.
    async fn ping(&self) -> Result<()>;
}

/// A source database: catalog plus row access over the same connection.
pub trait SourceDatabase: SchemaIntrospector + SourceReader {}

impl<T: SchemaIntrospector + SourceReader + ?Sized> SourceDatabase for T {}

/// Write access to the target.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Names of all base tables in the target database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Truncate the given tables with foreign key checks disabled for the
    /// duration of the clear. Returns the tables that were truncated;
    /// failures on individual tables are logged and skipped.
    async fn clear_tables(&self, tables: &[String]) -> Result<Vec<String>>;

    /// Open a transaction for loading `table`.
    ///
    /// With `relax_constraints`, foreign key checking is disabled until the
    /// sink is committed.
    async fn begin_table(&self, table: &str, relax_constraints: bool)
        -> Result<Box<dyn TableSink>>;

    /// Check that the target is reachable.
    async fn ping(&self) -> Result<()>;
}

/// An open per-table load transaction.
#[async_trait]
pub trait TableSink: Send {
    /// Insert a single row. `key` identifies the row in error reports.
    /// A failure leaves the transaction usable.
    async fn insert_row(&mut self, key: &RowKey, row: &Row) -> Result<()>;

    /// Commit every successful insert.
    async fn commit(self: Box<Self>) -> Result<()>;
}
