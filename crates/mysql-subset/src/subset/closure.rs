//! Breadth-first referential closure over the source.
//!
//! Starting from the seed rows of the root table, every collected row pulls
//! in the rows it references (its parents, one point lookup per foreign key)
//! and the rows that reference it (its children, one filtered scan per
//! incoming foreign key). A row is enqueued exactly once: the first time its
//! key is added to the collected set. Cycles terminate because a second
//! discovery of the same key is a no-op.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::{Row, RowKey, SchemaIntrospector, SourceReader, SqlValue};
use crate::error::{Result, SubsetError};
use crate::graph::RelationshipGraph;

use super::report::DanglingReference;

/// Rows of one table, keyed by primary key, in discovery order.
#[derive(Debug, Default)]
pub struct TableRows {
    rows: Vec<(RowKey, Row)>,
    index: HashMap<RowKey, usize>,
}

impl TableRows {
    /// Add a row unless its key is already present. Returns whether it was new.
    fn insert(&mut self, key: RowKey, row: Row) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.rows.len());
        self.rows.push((key, row));
        true
    }

    pub fn get(&self, key: &RowKey) -> Option<&Row> {
        self.index.get(key).map(|&i| &self.rows[i].1)
    }

    pub fn contains(&self, key: &RowKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows with their keys, in the order they were first discovered.
    pub fn iter(&self) -> impl Iterator<Item = (&RowKey, &Row)> {
        self.rows.iter().map(|(k, r)| (k, r))
    }
}

/// The closed set of rows to copy, grouped by table.
#[derive(Debug, Default)]
pub struct Closure {
    /// Tables in the order their first row was discovered.
    order: Vec<String>,
    tables: HashMap<String, TableRows>,
    dangling: Vec<DanglingReference>,
    queries: usize,
}

impl Closure {
    fn insert(&mut self, table: &str, key: RowKey, row: Row) -> bool {
        if !self.tables.contains_key(table) {
            self.order.push(table.to_string());
        }
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(key, row)
    }

    fn get(&self, table: &str, key: &RowKey) -> Option<&Row> {
        self.tables.get(table).and_then(|t| t.get(key))
    }

    /// Tables with at least one collected row, in discovery order.
    pub fn tables(&self) -> &[String] {
        &self.order
    }

    /// Collected rows of `table`, if any.
    pub fn rows(&self, table: &str) -> Option<&TableRows> {
        self.tables.get(table)
    }

    /// Number of collected rows in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map(TableRows::len).unwrap_or(0)
    }

    /// Whether `table` contains a row with `key`.
    pub fn contains(&self, table: &str, key: &RowKey) -> bool {
        self.tables.get(table).is_some_and(|t| t.contains(key))
    }

    /// Total number of collected rows.
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(TableRows::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_rows() == 0
    }

    /// Per-table row counts, in discovery order.
    pub fn counts(&self) -> Vec<(String, usize)> {
        self.order
            .iter()
            .map(|t| (t.clone(), self.len(t)))
            .collect()
    }

    /// References whose parent row was missing in the source.
    pub fn dangling(&self) -> &[DanglingReference] {
        &self.dangling
    }

    /// Number of parent and child fetch queries issued.
    pub fn queries(&self) -> usize {
        self.queries
    }
}

struct QueueItem {
    table: String,
    key: RowKey,
    depth: usize,
}

/// A related-row lookup derived from one dequeued row.
enum Lookup {
    Parent {
        table: String,
        column: String,
        parent_column: String,
        value: SqlValue,
    },
    Children {
        table: String,
        column: String,
        value: SqlValue,
    },
}

/// Builds a [`Closure`] from seed rows.
///
/// Generic over the source so the same traversal runs against a trait object
/// or a concrete driver.
pub struct ClosureBuilder<'a, S: SchemaIntrospector + SourceReader + ?Sized> {
    source: &'a S,
    graph: &'a RelationshipGraph,
    allow_keyless: bool,
    primary_keys: HashMap<String, Arc<[String]>>,
}

impl<'a, S: SchemaIntrospector + SourceReader + ?Sized> ClosureBuilder<'a, S> {
    pub fn new(source: &'a S, graph: &'a RelationshipGraph) -> Self {
        Self {
            source,
            graph,
            allow_keyless: false,
            primary_keys: HashMap::new(),
        }
    }

    /// Key rows of tables without a primary key by their full value tuple
    /// instead of failing.
    pub fn allow_keyless_tables(mut self, allow: bool) -> Self {
        self.allow_keyless = allow;
        self
    }

    /// Record a primary key that is already known, skipping its lookup.
    pub fn with_primary_key(mut self, table: impl Into<String>, pk: Vec<String>) -> Self {
        self.primary_keys.insert(table.into(), Arc::from(pk));
        self
    }

    /// Traverse from `seeds` (rows of `root_table`) until no new row is found.
    ///
    /// A source fetch error aborts the traversal. A missing parent row is
    /// recorded as a [`DanglingReference`] and traversal continues.
    pub async fn build(mut self, root_table: &str, seeds: Vec<Row>) -> Result<Closure> {
        let mut closure = Closure::default();
        let mut queue: VecDeque<QueueItem> = VecDeque::new();

        for row in seeds {
            self.admit(&mut closure, &mut queue, root_table, row, 0)
                .await?;
        }
        info!(
            "Seeded {} with {} rows",
            root_table,
            closure.len(root_table)
        );

        let mut level = 0;
        while let Some(item) = queue.pop_front() {
            if item.depth > level {
                level = item.depth;
                debug!(
                    "Closure depth {}: {} rows collected, {} queued",
                    level,
                    closure.total_rows(),
                    queue.len() + 1
                );
            }

            let lookups = self.lookups_for(&closure, &item)?;
            for lookup in lookups {
                self.follow(&mut closure, &mut queue, &item, lookup).await?;
            }
        }

        info!(
            "Closure complete: {} rows across {} tables ({} queries, {} dangling references)",
            closure.total_rows(),
            closure.tables().len(),
            closure.queries,
            closure.dangling.len()
        );
        Ok(closure)
    }

    /// Related-row lookups for a dequeued row, read from its collected copy.
    /// NULL foreign key values produce no lookup.
    fn lookups_for(&self, closure: &Closure, item: &QueueItem) -> Result<Vec<Lookup>> {
        let row = closure.get(&item.table, &item.key).ok_or_else(|| {
            SubsetError::Schema(format!(
                "queued row {} {} missing from collected set",
                item.table, item.key
            ))
        })?;

        let mut lookups = Vec::new();

        for parent in self.graph.parents_of(&item.table) {
            let value = column_value(row, &parent.column)?;
            if value.is_null() {
                continue;
            }
            lookups.push(Lookup::Parent {
                table: parent.parent_table.clone(),
                column: parent.column.clone(),
                parent_column: parent.parent_column.clone(),
                value: value.clone(),
            });
        }

        for child in self.graph.children_of(&item.table) {
            let value = column_value(row, &child.column)?;
            if value.is_null() {
                continue;
            }
            lookups.push(Lookup::Children {
                table: child.child_table.clone(),
                column: child.child_column.clone(),
                value: value.clone(),
            });
        }

        Ok(lookups)
    }

    async fn follow(
        &mut self,
        closure: &mut Closure,
        queue: &mut VecDeque<QueueItem>,
        item: &QueueItem,
        lookup: Lookup,
    ) -> Result<()> {
        let depth = item.depth + 1;
        match lookup {
            Lookup::Parent {
                table,
                column,
                parent_column,
                value,
            } => {
                closure.queries += 1;
                match self
                    .source
                    .fetch_one_by_column(&table, &parent_column, &value)
                    .await?
                {
                    Some(parent) => {
                        self.admit(closure, queue, &table, parent, depth).await?;
                    }
                    None => {
                        warn!(
                            "Dangling reference: {}.{} = {} (row {}) has no match in {}.{}",
                            item.table, column, value, item.key, table, parent_column
                        );
                        closure.dangling.push(DanglingReference {
                            table: item.table.clone(),
                            key: item.key.to_string(),
                            column,
                            parent_table: table,
                            parent_column,
                            value: value.to_string(),
                        });
                    }
                }
            }
            Lookup::Children {
                table,
                column,
                value,
            } => {
                closure.queries += 1;
                let children = self.source.fetch_by_column(&table, &column, &value).await?;
                for child in children {
                    self.admit(closure, queue, &table, child, depth).await?;
                }
            }
        }
        Ok(())
    }

    /// Add `row` to the closure and enqueue it if its key is new.
    async fn admit(
        &mut self,
        closure: &mut Closure,
        queue: &mut VecDeque<QueueItem>,
        table: &str,
        row: Row,
        depth: usize,
    ) -> Result<()> {
        let pk = self.primary_key(table).await?;
        let key = row.key(&pk).ok_or_else(|| {
            SubsetError::Schema(format!(
                "row of {} lacks primary key column(s) {}",
                table,
                pk.join(", ")
            ))
        })?;

        if closure.insert(table, key.clone(), row) {
            queue.push_back(QueueItem {
                table: table.to_string(),
                key,
                depth,
            });
        }
        Ok(())
    }

    /// Memoized primary key lookup. An empty key is fatal unless keyless
    /// tables are allowed.
    async fn primary_key(&mut self, table: &str) -> Result<Arc<[String]>> {
        if let Some(pk) = self.primary_keys.get(table) {
            return Ok(pk.clone());
        }

        let pk: Arc<[String]> = Arc::from(self.source.primary_key(table).await?);
        if pk.is_empty() {
            if !self.allow_keyless {
                return Err(SubsetError::NoPrimaryKey(table.to_string()));
            }
            warn!(
                "Table {} has no primary key; deduplicating its rows by full value",
                table
            );
        } else {
            debug!("Primary key of {}: {}", table, pk.join(", "));
        }

        self.primary_keys.insert(table.to_string(), pk.clone());
        Ok(pk)
    }
}

fn column_value<'r>(row: &'r Row, column: &str) -> Result<&'r SqlValue> {
    row.get(column).ok_or_else(|| {
        SubsetError::Schema(format!(
            "foreign key column {}.{} not present in fetched row",
            row.table(),
            column
        ))
    })
}
