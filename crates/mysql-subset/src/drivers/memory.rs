//! In-memory source and target.
//!
//! [`MemorySource`] serves catalog metadata and rows from a [`MemoryDatabase`]
//! the caller populates. [`MemoryTarget`] accepts loads and enforces primary
//! key uniqueness and foreign key existence the way MySQL does with
//! `FOREIGN_KEY_CHECKS=1`, so subset runs can be verified without a server.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::{
    Column, ForeignKeyEdge, Row, RowKey, SchemaIntrospector, SourceReader, SqlValue, TableSink,
    TargetWriter,
};
use crate::error::{Result, SubsetError};

#[derive(Debug, Clone)]
struct MemoryTable {
    columns: Arc<[Column]>,
    primary_key: Vec<String>,
    rows: Vec<Row>,
}

impl MemoryTable {
    fn has_key(&self, key: &RowKey) -> bool {
        self.rows
            .iter()
            .any(|r| r.key(&self.primary_key).as_ref() == Some(key))
    }

    fn has_value(&self, column: &str, value: &SqlValue) -> bool {
        self.rows.iter().any(|r| r.get(column) == Some(value))
    }
}

/// Tables, rows and foreign keys held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    tables: BTreeMap<String, MemoryTable>,
    foreign_keys: Vec<ForeignKeyEdge>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a table. An empty `primary_key` makes it keyless.
    pub fn create_table(&mut self, name: &str, columns: Vec<Column>, primary_key: &[&str]) {
        self.tables.insert(
            name.to_string(),
            MemoryTable {
                columns: Arc::from(columns),
                primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
    }

    pub fn add_foreign_key(&mut self, edge: ForeignKeyEdge) {
        self.foreign_keys.push(edge);
    }

    /// Append a row without any constraint checks. `values` must follow the
    /// table's column order.
    pub fn insert(&mut self, table: &str, values: Vec<SqlValue>) -> Result<()> {
        let t = self
            .tables
            .get_mut(table)
            .ok_or_else(|| SubsetError::Schema(format!("table {} does not exist", table)))?;
        if values.len() != t.columns.len() {
            return Err(SubsetError::Schema(format!(
                "table {} has {} columns, got {} values",
                table,
                t.columns.len(),
                values.len()
            )));
        }
        t.rows.push(Row::new(table, t.columns.clone(), values));
        Ok(())
    }

    /// Rows of `table`, in insertion order. Empty for unknown tables.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or(&[])
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn foreign_keys(&self) -> &[ForeignKeyEdge] {
        &self.foreign_keys
    }

    pub fn primary_key(&self, table: &str) -> Option<&[String]> {
        self.tables.get(table).map(|t| t.primary_key.as_slice())
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Same tables and foreign keys, no rows.
    pub fn schema_only(&self) -> Self {
        let tables = self
            .tables
            .iter()
            .map(|(name, t)| {
                (
                    name.clone(),
                    MemoryTable {
                        columns: t.columns.clone(),
                        primary_key: t.primary_key.clone(),
                        rows: Vec::new(),
                    },
                )
            })
            .collect();
        Self {
            tables,
            foreign_keys: self.foreign_keys.clone(),
        }
    }

    fn table(&self, table: &str) -> Result<&MemoryTable> {
        self.tables
            .get(table)
            .ok_or_else(|| SubsetError::fetch(table, format!("Table '{}' doesn't exist", table)))
    }
}

/// Read-only source backed by a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemorySource {
    db: MemoryDatabase,
    failing_tables: HashSet<String>,
    catalog_queries: AtomicUsize,
    fetch_queries: AtomicUsize,
}

impl MemorySource {
    pub fn new(db: MemoryDatabase) -> Self {
        Self {
            db,
            failing_tables: HashSet::new(),
            catalog_queries: AtomicUsize::new(0),
            fetch_queries: AtomicUsize::new(0),
        }
    }

    /// Make every row fetch against `table` fail.
    pub fn fail_fetches_on(mut self, table: &str) -> Self {
        self.failing_tables.insert(table.to_string());
        self
    }

    pub fn database(&self) -> &MemoryDatabase {
        &self.db
    }

    /// Number of primary key and foreign key catalog lookups served.
    pub fn catalog_queries(&self) -> usize {
        self.catalog_queries.load(Ordering::Relaxed)
    }

    /// Number of row fetches served.
    pub fn fetch_queries(&self) -> usize {
        self.fetch_queries.load(Ordering::Relaxed)
    }

    fn matching<'a>(
        &'a self,
        table: &str,
        column: &str,
        pred: impl Fn(&SqlValue) -> bool + 'a,
    ) -> Result<impl Iterator<Item = &'a Row> + 'a> {
        self.fetch_queries.fetch_add(1, Ordering::Relaxed);
        if self.failing_tables.contains(table) {
            return Err(SubsetError::fetch(table, "Lost connection to MySQL server during query"));
        }
        let t = self.db.table(table)?;
        if !t.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column)) {
            return Err(SubsetError::fetch(
                table,
                format!("Unknown column '{}' in 'where clause'", column),
            ));
        }
        let column = column.to_string();
        Ok(t.rows.iter().filter(move |r| {
            r.get(&column)
                .is_some_and(|v| !v.is_null() && pred(v))
        }))
    }
}

#[async_trait]
impl SchemaIntrospector for MemorySource {
    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        self.catalog_queries.fetch_add(1, Ordering::Relaxed);
        self.db
            .primary_key(table)
            .map(<[String]>::to_vec)
            .ok_or_else(|| SubsetError::Schema(format!("table {} not found in source", table)))
    }

    async fn foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>> {
        self.catalog_queries.fetch_add(1, Ordering::Relaxed);
        Ok(self.db.foreign_keys.clone())
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn fetch_seed(&self, table: &str, column: &str, values: &[String]) -> Result<Vec<Row>> {
        let wanted: Vec<SqlValue> = values.iter().map(|v| SqlValue::from(v.as_str())).collect();
        Ok(self
            .matching(table, column, move |v| wanted.contains(v))?
            .cloned()
            .collect())
    }

    async fn fetch_one_by_column(
        &self,
        table: &str,
        column: &str,
        value: &SqlValue,
    ) -> Result<Option<Row>> {
        let value = value.clone();
        Ok(self
            .matching(table, column, move |v| *v == value)?
            .next()
            .cloned())
    }

    async fn fetch_by_column(
        &self,
        table: &str,
        column: &str,
        value: &SqlValue,
    ) -> Result<Vec<Row>> {
        let value = value.clone();
        Ok(self
            .matching(table, column, move |v| *v == value)?
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Target backed by a shared [`MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryTarget {
    db: Arc<Mutex<MemoryDatabase>>,
}

impl MemoryTarget {
    /// An empty target with the tables and foreign keys of `schema`.
    pub fn new(schema: &MemoryDatabase) -> Self {
        Self {
            db: Arc::new(Mutex::new(schema.schema_only())),
        }
    }

    /// Insert a row directly, bypassing constraint checks.
    pub async fn preload(&self, table: &str, values: Vec<SqlValue>) -> Result<()> {
        self.db.lock().await.insert(table, values)
    }

    pub async fn row_count(&self, table: &str) -> usize {
        self.db.lock().await.row_count(table)
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.db.lock().await.rows(table).to_vec()
    }

    /// A copy of the current contents.
    pub async fn snapshot(&self) -> MemoryDatabase {
        self.db.lock().await.clone()
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.db.lock().await.table_names())
    }

    async fn clear_tables(&self, tables: &[String]) -> Result<Vec<String>> {
        let mut db = self.db.lock().await;
        let mut cleared = Vec::with_capacity(tables.len());
        for table in tables {
            match db.tables.get_mut(table) {
                Some(t) => {
                    t.rows.clear();
                    debug!("Truncated {}", table);
                    cleared.push(table.clone());
                }
                None => warn!("Could not truncate {}: table does not exist", table),
            }
        }
        Ok(cleared)
    }

    async fn begin_table(
        &self,
        table: &str,
        relax_constraints: bool,
    ) -> Result<Box<dyn TableSink>> {
        Ok(Box::new(MemoryTableSink {
            db: self.db.clone(),
            table: table.to_string(),
            relax_constraints,
            pending: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Buffers a table's rows and appends them on commit.
struct MemoryTableSink {
    db: Arc<Mutex<MemoryDatabase>>,
    table: String,
    relax_constraints: bool,
    pending: Vec<Row>,
}

impl MemoryTableSink {
    fn pending_has_key(&self, pk: &[String], key: &RowKey) -> bool {
        self.pending
            .iter()
            .any(|r| r.key(pk).as_ref() == Some(key))
    }

    fn pending_has_value(&self, column: &str, value: &SqlValue) -> bool {
        self.pending.iter().any(|r| r.get(column) == Some(value))
    }
}

#[async_trait]
impl TableSink for MemoryTableSink {
    async fn insert_row(&mut self, key: &RowKey, row: &Row) -> Result<()> {
        let db = self.db.lock().await;
        let reject = |message: String| SubsetError::insert(&self.table, key, message);

        let target = db
            .tables
            .get(&self.table)
            .ok_or_else(|| reject(format!("Table '{}' doesn't exist", self.table)))?;

        if let Some(unknown) = row
            .column_names()
            .find(|n| !target.columns.iter().any(|c| c.name.eq_ignore_ascii_case(n)))
        {
            return Err(reject(format!("Unknown column '{}' in 'field list'", unknown)));
        }

        let values: Vec<SqlValue> = target
            .columns
            .iter()
            .map(|c| {
                row.get(&c.name)
                    .cloned()
                    .unwrap_or(SqlValue::Null(crate::core::SqlNullType::String))
            })
            .collect();
        let stored = Row::new(self.table.clone(), target.columns.clone(), values);

        if !target.primary_key.is_empty() {
            if let Some(pk) = stored.key(&target.primary_key) {
                if target.has_key(&pk) || self.pending_has_key(&target.primary_key, &pk) {
                    return Err(reject(format!(
                        "Duplicate entry '{}' for key 'PRIMARY'",
                        pk
                    )));
                }
            }
        }

        if !self.relax_constraints {
            for edge in db.foreign_keys.iter().filter(|e| e.child_table == self.table) {
                let Some(value) = stored.get(&edge.child_column) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                let in_parent = db
                    .tables
                    .get(&edge.parent_table)
                    .is_some_and(|p| p.has_value(&edge.parent_column, value));
                let in_batch =
                    edge.is_self_reference() && self.pending_has_value(&edge.parent_column, value);
                if !in_parent && !in_batch {
                    return Err(reject(format!(
                        "Cannot add or update a child row: a foreign key constraint fails ({})",
                        edge
                    )));
                }
            }
        }

        drop(db);
        self.pending.push(stored);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTableSink {
            db, table, pending, ..
        } = *self;
        let mut db = db.lock().await;
        let rows = db.tables.get_mut(&table).ok_or_else(|| {
            SubsetError::insert(&table, "-", format!("Table '{}' doesn't exist", table))
        })?;
        rows.rows.extend(pending);
        Ok(())
    }
}
