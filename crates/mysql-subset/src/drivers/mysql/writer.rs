//! MySQL target: clearing tables and loading rows.
//!
//! Each table loads in its own transaction with one parameterized INSERT per
//! row, so a rejected row fails alone while the rest of the table commits.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Pool, Transaction, TxOpts};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::core::{Row, RowKey, TableSink, TargetWriter};
use crate::error::{Result, SubsetError};

use super::connection;
use super::convert::sql_value_to_mysql;
use super::dialect::{
    MysqlDialect, DISABLE_FOREIGN_KEY_CHECKS, ENABLE_FOREIGN_KEY_CHECKS, LIST_TABLES_QUERY,
};

/// Writes subset rows into the target database.
pub struct MysqlWriter {
    pool: Pool,
    database: String,
    dialect: MysqlDialect,
}

impl MysqlWriter {
    /// Connect to the target described by `config`.
    pub async fn new(config: &ConnectionConfig) -> Result<Self> {
        let pool = connection::connect(config, "target").await?;
        Ok(Self {
            pool,
            database: config.database.clone(),
            dialect: MysqlDialect::new(),
        })
    }

    /// Close the pool.
    pub async fn close(self) -> Result<()> {
        self.pool
            .disconnect()
            .await
            .map_err(|e| SubsetError::pool(e, "closing MySQL target pool"))
    }
}

#[async_trait]
impl TargetWriter for MysqlWriter {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| SubsetError::pool(e, "getting MySQL target connection"))?;
        conn.exec(LIST_TABLES_QUERY, (self.database.as_str(),))
            .await
            .map_err(|e| SubsetError::Schema(format!("listing target tables: {}", e)))
    }

    async fn clear_tables(&self, tables: &[String]) -> Result<Vec<String>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| SubsetError::pool(e, "getting MySQL target connection"))?;

        conn.query_drop(DISABLE_FOREIGN_KEY_CHECKS)
            .await
            .map_err(|e| SubsetError::pool(e, "disabling foreign key checks for clear"))?;

        let mut cleared = Vec::with_capacity(tables.len());
        for table in tables {
            match conn
                .query_drop(self.dialect.truncate(&self.database, table))
                .await
            {
                Ok(()) => {
                    debug!("Truncated {}", table);
                    cleared.push(table.clone());
                }
                Err(e) => warn!("Could not truncate {}: {}", table, e),
            }
        }

        conn.query_drop(ENABLE_FOREIGN_KEY_CHECKS)
            .await
            .map_err(|e| SubsetError::pool(e, "re-enabling foreign key checks after clear"))?;

        info!("Cleared {} of {} target tables", cleared.len(), tables.len());
        Ok(cleared)
    }

    async fn begin_table(
        &self,
        table: &str,
        relax_constraints: bool,
    ) -> Result<Box<dyn TableSink>> {
        let mut tx = self
            .pool
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| SubsetError::pool(e, format!("starting transaction for {}", table)))?;

        if relax_constraints {
            tx.query_drop(DISABLE_FOREIGN_KEY_CHECKS)
                .await
                .map_err(|e| SubsetError::pool(e, format!("relaxing constraints for {}", table)))?;
        }

        Ok(Box::new(MysqlTableSink {
            tx,
            table: table.to_string(),
            database: self.database.clone(),
            dialect: self.dialect.clone(),
            relax_constraints,
            statement: None,
        }))
    }

    async fn ping(&self) -> Result<()> {
        connection::ping(&self.pool, "target").await
    }
}

/// An open load transaction for one table.
struct MysqlTableSink {
    tx: Transaction<'static>,
    table: String,
    database: String,
    dialect: MysqlDialect,
    relax_constraints: bool,
    /// Last built INSERT and the column list it was built for.
    statement: Option<(Vec<String>, String)>,
}

impl MysqlTableSink {
    fn insert_sql(&mut self, row: &Row) -> String {
        if let Some((cols, sql)) = &self.statement {
            if cols.iter().map(String::as_str).eq(row.column_names()) {
                return sql.clone();
            }
        }
        let cols: Vec<String> = row.column_names().map(str::to_string).collect();
        let sql = self
            .dialect
            .insert(&self.database, &self.table, cols.iter().map(String::as_str));
        self.statement = Some((cols, sql.clone()));
        sql
    }
}

#[async_trait]
impl TableSink for MysqlTableSink {
    async fn insert_row(&mut self, key: &RowKey, row: &Row) -> Result<()> {
        let sql = self.insert_sql(row);
        let params: Vec<mysql_async::Value> = row.values().iter().map(sql_value_to_mysql).collect();
        self.tx
            .exec_drop(sql, params)
            .await
            .map_err(|e| SubsetError::insert(&self.table, key, e))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MysqlTableSink {
            mut tx,
            table,
            relax_constraints,
            ..
        } = *self;

        if relax_constraints {
            tx.query_drop(ENABLE_FOREIGN_KEY_CHECKS)
                .await
                .map_err(|e| SubsetError::insert(&table, "-", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| SubsetError::insert(&table, "-", format!("commit failed: {}", e)))
    }
}
