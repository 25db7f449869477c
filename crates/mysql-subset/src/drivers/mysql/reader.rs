//! MySQL source: catalog introspection and row fetches.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Pool, Value};
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::core::{ForeignKeyEdge, Row, SchemaIntrospector, SourceReader, SqlValue};
use crate::error::{Result, SubsetError};

use super::connection;
use super::convert::{rows_from_mysql, sql_value_to_mysql};
use super::dialect::{MysqlDialect, FOREIGN_KEYS_QUERY, PRIMARY_KEY_QUERY};

/// Reads catalog metadata and rows from the source database.
pub struct MysqlReader {
    pool: Pool,
    database: String,
    dialect: MysqlDialect,
}

impl MysqlReader {
    /// Connect to the source described by `config`.
    pub async fn new(config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::connect(config, "source").await?;
        Ok(Self {
            pool,
            database: config.database.clone(),
            dialect: MysqlDialect::new(),
        })
    }

    async fn conn(&self) -> Result<Conn> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| SubsetError::pool(e, "getting MySQL source connection"))
    }

    async fn query_rows(&self, table: &str, sql: String, params: Vec<Value>) -> Result<Vec<Row>> {
        debug!("{}", sql);
        let mut conn = self.conn().await?;
        let rows: Vec<mysql_async::Row> = conn
            .exec(sql, params)
            .await
            .map_err(|e| SubsetError::fetch(table, e))?;
        Ok(rows_from_mysql(table, rows))
    }

    /// Close the pool.
    pub async fn close(self) -> Result<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| SubsetError::pool(e, "closing MySQL source pool"))
    }
}

#[async_trait]
impl SchemaIntrospector for MysqlReader {
    async fn primary_key(&self, table: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let rows: Vec<Option<String>> = conn
            .exec(PRIMARY_KEY_QUERY, (self.database.as_str(), table))
            .await
            .map_err(|e| SubsetError::Schema(format!("loading primary key of {}: {}", table, e)))?;

        if rows.is_empty() {
            return Err(SubsetError::Schema(format!(
                "table {} not found in source database {}",
                table, self.database
            )));
        }
        Ok(rows.into_iter().flatten().collect())
    }

    async fn foreign_keys(&self) -> Result<Vec<ForeignKeyEdge>> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, String, String, String)> = conn
            .exec(FOREIGN_KEYS_QUERY, (self.database.as_str(),))
            .await
            .map_err(|e| SubsetError::Schema(format!("loading foreign keys: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(child, col, parent, pcol)| ForeignKeyEdge::new(child, col, parent, pcol))
            .collect())
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn fetch_seed(&self, table: &str, column: &str, values: &[String]) -> Result<Vec<Row>> {
        let sql = self
            .dialect
            .select_in(&self.database, table, column, values.len());
        let params = values
            .iter()
            .map(|v| Value::Bytes(v.as_bytes().to_vec()))
            .collect();
        self.query_rows(table, sql, params).await
    }

    async fn fetch_one_by_column(
        &self,
        table: &str,
        column: &str,
        value: &SqlValue,
    ) -> Result<Option<Row>> {
        let sql = self
            .dialect
            .select_by_column(&self.database, table, column, true);
        let rows = self
            .query_rows(table, sql, vec![sql_value_to_mysql(value)])
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_by_column(
        &self,
        table: &str,
        column: &str,
        value: &SqlValue,
    ) -> Result<Vec<Row>> {
        let sql = self
            .dialect
            .select_by_column(&self.database, table, column, false);
        self.query_rows(table, sql, vec![sql_value_to_mysql(value)])
            .await
    }

    async fn ping(&self) -> Result<()> {
        connection::ping(&self.pool, "source").await
    }
}
