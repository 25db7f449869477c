//! Machine-readable records of everything the run skipped.

use serde::{Deserialize, Serialize};

/// A non-null foreign key value whose referenced row is missing in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DanglingReference {
    /// Table of the referencing row.
    pub table: String,
    /// Key of the referencing row.
    pub key: String,
    /// Referencing column.
    pub column: String,
    pub parent_table: String,
    pub parent_column: String,
    /// The value that matched no parent row.
    pub value: String,
}

/// A collected row the target rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub table: String,
    pub key: String,
    pub reason: String,
}

/// Load outcome for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLoad {
    pub table: String,
    pub attempted: usize,
    pub inserted: usize,
    pub skipped: usize,
    /// Whether foreign key checks were disabled for this table's batch.
    pub relaxed_constraints: bool,
}

/// Outcome of materializing a closure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializeReport {
    /// Per-table results, in load order.
    pub tables: Vec<TableLoad>,
    pub skipped_rows: Vec<SkippedRow>,
}

impl MaterializeReport {
    /// Total rows inserted across all tables.
    pub fn rows_inserted(&self) -> usize {
        self.tables.iter().map(|t| t.inserted).sum()
    }

    /// Total rows skipped across all tables.
    pub fn rows_skipped(&self) -> usize {
        self.skipped_rows.len()
    }

    /// Inserted count for `table`, or 0 if it was not loaded.
    pub fn inserted(&self, table: &str) -> usize {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.inserted)
            .unwrap_or(0)
    }
}
