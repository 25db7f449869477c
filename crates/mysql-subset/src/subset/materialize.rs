//! Loading a closure into the target.

use tracing::{info, warn};

use crate::config::InsertOrder;
use crate::core::TargetWriter;
use crate::error::{Result, SubsetError};
use crate::graph::{InsertStep, RelationshipGraph};

use super::closure::Closure;
use super::report::{MaterializeReport, SkippedRow, TableLoad};

/// Writes every collected row to the target, one transaction per table.
///
/// A row the target rejects is logged, recorded and skipped; the rest of its
/// table still commits. Failing to open or commit a table's transaction
/// aborts the load.
pub struct Materializer<'a, T: TargetWriter + ?Sized> {
    target: &'a T,
    graph: &'a RelationshipGraph,
    order: InsertOrder,
}

impl<'a, T: TargetWriter + ?Sized> Materializer<'a, T> {
    pub fn new(target: &'a T, graph: &'a RelationshipGraph, order: InsertOrder) -> Self {
        Self {
            target,
            graph,
            order,
        }
    }

    /// Load order for `closure`'s tables.
    pub fn plan(&self, closure: &Closure) -> Vec<InsertStep> {
        self.graph.insert_plan(closure.tables(), self.order)
    }

    pub async fn materialize(&self, closure: &Closure) -> Result<MaterializeReport> {
        let mut report = MaterializeReport::default();

        for step in self.plan(closure) {
            let Some(rows) = closure.rows(&step.table) else {
                continue;
            };

            info!(
                "Inserting {} rows into {}{}",
                rows.len(),
                step.table,
                if step.relax_constraints {
                    " (foreign key checks disabled)"
                } else {
                    ""
                }
            );

            let mut sink = self
                .target
                .begin_table(&step.table, step.relax_constraints)
                .await?;

            let mut load = TableLoad {
                table: step.table.clone(),
                attempted: rows.len(),
                inserted: 0,
                skipped: 0,
                relaxed_constraints: step.relax_constraints,
            };

            for (key, row) in rows.iter() {
                match sink.insert_row(key, row).await {
                    Ok(()) => load.inserted += 1,
                    Err(e) => {
                        let reason = match e {
                            SubsetError::Insert { message, .. } => message,
                            other => other.to_string(),
                        };
                        warn!("Skipping {} row {}: {}", step.table, key, reason);
                        load.skipped += 1;
                        report.skipped_rows.push(SkippedRow {
                            table: step.table.clone(),
                            key: key.to_string(),
                            reason,
                        });
                    }
                }
            }

            sink.commit().await?;
            report.tables.push(load);
        }

        info!(
            "Materialized {} rows ({} skipped)",
            report.rows_inserted(),
            report.rows_skipped()
        );
        Ok(report)
    }
}
