//! MySQL SQL text.
//!
//! Every statement that carries a value is parameterized with `?`; only
//! identifiers are interpolated, and those are backtick-quoted.

/// Primary key columns of a table, or a single NULL row when the table
/// exists without one, or no rows when the table does not exist.
pub const PRIMARY_KEY_QUERY: &str = r#"
    SELECT CAST(k.COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME
    FROM INFORMATION_SCHEMA.TABLES t
    LEFT JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k
        ON k.TABLE_SCHEMA = t.TABLE_SCHEMA
        AND k.TABLE_NAME = t.TABLE_NAME
        AND k.CONSTRAINT_NAME = 'PRIMARY'
    WHERE t.TABLE_SCHEMA = ? AND t.TABLE_NAME = ?
    ORDER BY k.ORDINAL_POSITION
"#;

/// Every single-column foreign key pair in a schema.
// CAST to CHAR: information_schema may return VARBINARY under some collations.
pub const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME,
        CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
        CAST(REFERENCED_TABLE_NAME AS CHAR(255)) AS REFERENCED_TABLE_NAME,
        CAST(REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME
    FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = ?
        AND REFERENCED_TABLE_NAME IS NOT NULL
        AND REFERENCED_TABLE_SCHEMA = TABLE_SCHEMA
    ORDER BY TABLE_NAME, CONSTRAINT_NAME, ORDINAL_POSITION
"#;

/// Base tables of a schema.
pub const LIST_TABLES_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

pub const DISABLE_FOREIGN_KEY_CHECKS: &str = "SET FOREIGN_KEY_CHECKS = 0";
pub const ENABLE_FOREIGN_KEY_CHECKS: &str = "SET FOREIGN_KEY_CHECKS = 1";

/// MySQL statement builder.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    pub fn new() -> Self {
        Self
    }

    /// Backtick-quote an identifier, doubling embedded backticks.
    pub fn quote_ident(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// `schema`.`table`
    pub fn qualify(&self, schema: &str, table: &str) -> String {
        format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
    }

    /// `SELECT *` filtered on one column, optionally capped at one row.
    pub fn select_by_column(
        &self,
        schema: &str,
        table: &str,
        column: &str,
        single: bool,
    ) -> String {
        let mut sql = format!(
            "SELECT * FROM {} WHERE {} = ?",
            self.qualify(schema, table),
            self.quote_ident(column)
        );
        if single {
            sql.push_str(" LIMIT 1");
        }
        sql
    }

    /// `SELECT *` where a column equals one of `count` values.
    /// A single value uses `=` rather than a one-element `IN`.
    pub fn select_in(&self, schema: &str, table: &str, column: &str, count: usize) -> String {
        if count <= 1 {
            return self.select_by_column(schema, table, column, false);
        }
        let placeholders = vec!["?"; count].join(", ");
        format!(
            "SELECT * FROM {} WHERE {} IN ({})",
            self.qualify(schema, table),
            self.quote_ident(column),
            placeholders
        )
    }

    /// Single-row INSERT naming every column explicitly.
    pub fn insert<'c>(
        &self,
        schema: &str,
        table: &str,
        columns: impl IntoIterator<Item = &'c str>,
    ) -> String {
        let cols: Vec<String> = columns.into_iter().map(|c| self.quote_ident(c)).collect();
        let placeholders = vec!["?"; cols.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualify(schema, table),
            cols.join(", "),
            placeholders
        )
    }

    pub fn truncate(&self, schema: &str, table: &str) -> String {
        format!("TRUNCATE TABLE {}", self.qualify(schema, table))
    }
}
