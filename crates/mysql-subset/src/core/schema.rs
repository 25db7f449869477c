//! Schema metadata and row types.
//!
//! A [`Row`] is a structured record: its values are positional and paired
//! with the column metadata of the result set that produced it, so every
//! column (including NULL ones) is present explicitly.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::value::SqlValue;

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared data type (e.g. "int", "varchar", "datetime").
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, is_nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable,
        }
    }
}

/// A fetched row, tagged with its owning table. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    table: String,
    columns: Arc<[Column]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Build a row. `values` must be positionally aligned with `columns`.
    pub fn new(table: impl Into<String>, columns: Arc<[Column]>, values: Vec<SqlValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self {
            table: table.into(),
            columns,
            values,
        }
    }

    /// Owning table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Column metadata, in result-set order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Values, aligned with [`Row::columns`].
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Column names, in result-set order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Value of a column, or `None` if the row has no such column.
    /// MySQL column names are case-insensitive.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    /// Derive the row key for the given primary key columns.
    ///
    /// An empty `pk` keys the row by its full value tuple.
    pub fn key(&self, pk: &[String]) -> Option<RowKey> {
        if pk.is_empty() {
            return Some(RowKey(self.values.clone()));
        }
        pk.iter()
            .map(|c| self.get(c).cloned())
            .collect::<Option<Vec<_>>>()
            .map(RowKey)
    }
}

/// Identity of a row within its table: its values in primary-key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey(pub Vec<SqlValue>);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

/// A single-column foreign key: `child_table.child_column -> parent_table.parent_column`.
///
/// Composite foreign keys are represented as one edge per column pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    /// Table holding the foreign key.
    pub child_table: String,

    /// Referencing column.
    pub child_column: String,

    /// Referenced table.
    pub parent_table: String,

    /// Referenced column.
    pub parent_column: String,
}

impl ForeignKeyEdge {
    pub fn new(
        child_table: impl Into<String>,
        child_column: impl Into<String>,
        parent_table: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        Self {
            child_table: child_table.into(),
            child_column: child_column.into(),
            parent_table: parent_table.into(),
            parent_column: parent_column.into(),
        }
    }

    /// Whether the key references its own table.
    pub fn is_self_reference(&self) -> bool {
        self.child_table == self.parent_table
    }
}

impl fmt::Display for ForeignKeyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.child_table, self.child_column, self.parent_table, self.parent_column
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlNullType;

    fn customer(id: i64, city: Option<&str>) -> Row {
        let columns: Arc<[Column]> = Arc::from(vec![
            Column::new("id", "int", false),
            Column::new("city", "varchar", true),
        ]);
        let city = city
            .map(SqlValue::from)
            .unwrap_or(SqlValue::Null(SqlNullType::String));
        Row::new("customers", columns, vec![SqlValue::from(id), city])
    }

    #[test]
    fn test_row_get_is_case_insensitive() {
        let row = customer(1, Some("Springfield"));
        assert_eq!(row.get("CITY"), Some(&SqlValue::from("Springfield")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_null_is_explicit() {
        let row = customer(1, None);
        assert!(row.get("city").unwrap().is_null());
    }

    #[test]
    fn test_row_key_in_pk_order() {
        let row = customer(9, Some("Springfield"));
        let key = row.key(&["city".to_string(), "id".to_string()]).unwrap();
        assert_eq!(
            key,
            RowKey(vec![SqlValue::from("Springfield"), SqlValue::from(9)])
        );
        assert_eq!(key.to_string(), "('Springfield', 9)");
    }

    #[test]
    fn test_row_key_missing_column() {
        let row = customer(9, None);
        assert!(row.key(&["nope".to_string()]).is_none());
    }

    #[test]
    fn test_row_key_without_pk_uses_full_row() {
        let row = customer(3, Some("Ogdenville"));
        let key = row.key(&[]).unwrap();
        assert_eq!(key.0.len(), 2);
    }

    #[test]
    fn test_edge_display_and_self_reference() {
        let edge = ForeignKeyEdge::new("employees", "manager_id", "employees", "id");
        assert!(edge.is_self_reference());
        assert_eq!(edge.to_string(), "employees.manager_id -> employees.id");
    }
}
