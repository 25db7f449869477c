//! Subset orchestrator - main workflow coordinator.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Config;
use crate::core::{SourceDatabase, TargetWriter};
use crate::drivers::{MysqlReader, MysqlWriter};
use crate::error::{Result, SubsetError};
use crate::graph::{InsertStep, RelationshipGraph};
use crate::subset::{ClosureBuilder, DanglingReference, Materializer, SkippedRow};

/// Subset orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceDatabase>,
    target: Arc<dyn TargetWriter>,
}

/// Per-table counts for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table: String,
    pub collected: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Result of a subset run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: completed, completed_with_skips, dry_run or no_seed_rows.
    pub status: String,

    pub dry_run: bool,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    pub root_table: String,

    /// Rows matched by the seed filter.
    pub seed_rows: usize,

    /// Tables in load order.
    pub tables: Vec<TableSummary>,

    pub insert_plan: Vec<InsertStep>,

    pub rows_collected: usize,
    pub rows_inserted: usize,
    pub rows_skipped: usize,

    /// Parent and child lookups issued while building the closure.
    pub fetch_queries: usize,

    pub dangling_references: Vec<DanglingReference>,
    pub skipped_rows: Vec<SkippedRow>,
}

impl SubsetResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Reachability of source and target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator {
    /// Connect to the MySQL source and target named in `config`.
    pub async fn new(config: Config) -> Result<Self> {
        let source = MysqlReader::new(&config.source).await?;
        let target = MysqlWriter::new(&config.target).await?;
        Ok(Self::with_drivers(
            config,
            Arc::new(source),
            Arc::new(target),
        ))
    }

    /// Use already-constructed drivers.
    pub fn with_drivers(
        config: Config,
        source: Arc<dyn SourceDatabase>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Discover the source's foreign keys and build the relationship graph.
    pub async fn relationship_graph(&self) -> Result<RelationshipGraph> {
        let edges = self.source.foreign_keys().await?;
        let graph = RelationshipGraph::from_edges(edges);
        info!(
            "Discovered {} foreign key relationships across {} tables",
            graph.edge_count(),
            graph.tables().len()
        );
        Ok(graph)
    }

    /// Run the subset.
    ///
    /// With `dry_run`, the closure is built and reported but the target is
    /// neither cleared nor written.
    pub async fn run(&self, dry_run: bool) -> Result<SubsetResult> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let subset = &self.config.subset;

        info!("Starting subset run: {}", run_id);

        // Phase 1: Clear target
        if subset.clear_target && !dry_run {
            info!("Phase 1: Clearing target database");
            let tables = self.target.list_tables().await?;
            self.target.clear_tables(&tables).await?;
        } else {
            info!("Phase 1: Leaving target contents in place");
        }

        // Phase 2: Relationships
        info!("Phase 2: Discovering relationships");
        let graph = self.relationship_graph().await?;
        let root = self.resolve_root(&graph);
        let root = root.as_str();

        let root_pk = self.source.primary_key(root).await?;
        if root_pk.is_empty() && !subset.allow_keyless_tables {
            return Err(SubsetError::NoPrimaryKey(root.to_string()));
        }

        // Phase 3: Seed
        let cities = self.config.city_filter.values();
        info!(
            "Phase 3: Seeding {} where {} in {:?}",
            root, self.config.filter_column, cities
        );
        let seeds = self
            .source
            .fetch_seed(root, &self.config.filter_column, cities)
            .await?;
        let seed_rows = seeds.len();

        let mut result = SubsetResult {
            run_id,
            status: String::new(),
            dry_run,
            duration_seconds: 0.0,
            started_at,
            completed_at: started_at,
            root_table: root.to_string(),
            seed_rows,
            tables: Vec::new(),
            insert_plan: Vec::new(),
            rows_collected: 0,
            rows_inserted: 0,
            rows_skipped: 0,
            fetch_queries: 0,
            dangling_references: Vec::new(),
            skipped_rows: Vec::new(),
        };

        if seeds.is_empty() {
            warn!(
                "No rows in {} match {} filter {:?}; nothing to copy",
                root, self.config.filter_column, cities
            );
            result.status = "no_seed_rows".to_string();
            return Ok(finish(result, timer));
        }

        // Phase 4: Closure
        info!("Phase 4: Building referential closure");
        let closure = ClosureBuilder::new(self.source.as_ref(), &graph)
            .allow_keyless_tables(subset.allow_keyless_tables)
            .with_primary_key(root, root_pk)
            .build(root, seeds)
            .await?;

        for (table, count) in closure.counts() {
            info!("  {}: {} rows", table, count);
        }

        let materializer = Materializer::new(self.target.as_ref(), &graph, subset.insert_order);
        result.insert_plan = materializer.plan(&closure);
        result.rows_collected = closure.total_rows();
        result.fetch_queries = closure.queries();
        result.dangling_references = closure.dangling().to_vec();

        if dry_run {
            info!("Dry run: skipping materialization");
            result.tables = result
                .insert_plan
                .iter()
                .map(|step| TableSummary {
                    table: step.table.clone(),
                    collected: closure.len(&step.table),
                    inserted: 0,
                    skipped: 0,
                })
                .collect();
            result.status = "dry_run".to_string();
            return Ok(finish(result, timer));
        }

        // Phase 5: Materialize
        info!("Phase 5: Materializing subset into target");
        let report = materializer.materialize(&closure).await?;

        result.tables = report
            .tables
            .iter()
            .map(|load| TableSummary {
                table: load.table.clone(),
                collected: closure.len(&load.table),
                inserted: load.inserted,
                skipped: load.skipped,
            })
            .collect();
        result.rows_inserted = report.rows_inserted();
        result.rows_skipped = report.rows_skipped();
        result.status = if report.skipped_rows.is_empty() {
            "completed".to_string()
        } else {
            "completed_with_skips".to_string()
        };
        result.skipped_rows = report.skipped_rows;

        let result = finish(result, timer);
        info!(
            "Subset complete: {} rows inserted, {} skipped, {} dangling references in {:.2}s",
            result.rows_inserted,
            result.rows_skipped,
            result.dangling_references.len(),
            result.duration_seconds
        );
        Ok(result)
    }

    /// Match the configured root table to the catalog's spelling.
    fn resolve_root(&self, graph: &RelationshipGraph) -> String {
        let configured = self.config.root_table.as_str();
        match graph.resolve_table(configured) {
            Some(name) => {
                if name != configured {
                    info!("Root table {} resolved to {}", configured, name);
                }
                name.to_string()
            }
            None => {
                warn!(
                    "Root table {} has no foreign key relationships; only seed rows will be copied",
                    configured
                );
                configured.to_string()
            }
        }
    }

    /// Check that source and target are reachable.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.source.ping().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.ping().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        Ok(HealthCheckResult {
            source_connected: source.is_ok(),
            source_latency_ms,
            target_connected: target.is_ok(),
            target_latency_ms,
            healthy: source.is_ok() && target.is_ok(),
            source_error: source.err().map(|e| e.to_string()),
            target_error: target.err().map(|e| e.to_string()),
        })
    }
}

fn finish(mut result: SubsetResult, timer: Instant) -> SubsetResult {
    result.completed_at = Utc::now();
    result.duration_seconds = timer.elapsed().as_secs_f64();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, ForeignKeyEdge};
    use crate::drivers::{MemoryDatabase, MemorySource, MemoryTarget};

    fn config(clear_target: bool) -> Config {
        let mut config = Config::from_yaml(
            r#"
source: { host: src, database: shop, user: u }
target: { host: dst, database: shop_copy, user: u }
root_table: customers
city_filter: Springfield
"#,
        )
        .unwrap();
        config.subset.clear_target = clear_target;
        config
    }

    fn shop() -> MemoryDatabase {
        let mut db = MemoryDatabase::new();
        db.create_table(
            "customers",
            vec![
                Column::new("id", "int", false),
                Column::new("city", "varchar", true),
            ],
            &["id"],
        );
        db.create_table(
            "orders",
            vec![
                Column::new("id", "int", false),
                Column::new("customer_id", "int", false),
            ],
            &["id"],
        );
        db.add_foreign_key(ForeignKeyEdge::new("orders", "customer_id", "customers", "id"));
        db.insert("customers", vec![1.into(), "Springfield".into()]).unwrap();
        db.insert("customers", vec![2.into(), "Capital City".into()]).unwrap();
        db.insert("orders", vec![7.into(), 1.into()]).unwrap();
        db.insert("orders", vec![8.into(), 2.into()]).unwrap();
        db
    }

    fn orchestrator(clear_target: bool) -> (Orchestrator, MemoryTarget) {
        let db = shop();
        let target = MemoryTarget::new(&db);
        let orchestrator = Orchestrator::with_drivers(
            config(clear_target),
            Arc::new(MemorySource::new(db)),
            Arc::new(target.clone()),
        );
        (orchestrator, target)
    }

    #[tokio::test]
    async fn test_run_copies_closure() {
        let (orchestrator, target) = orchestrator(true);
        let result = orchestrator.run(false).await.unwrap();

        assert_eq!(result.status, "completed");
        assert_eq!(result.seed_rows, 1);
        assert_eq!(result.rows_collected, 2);
        assert_eq!(result.rows_inserted, 2);
        assert_eq!(target.row_count("customers").await, 1);
        assert_eq!(target.row_count("orders").await, 1);
        assert_eq!(result.tables[0].table, "customers");
    }

    #[tokio::test]
    async fn test_dry_run_leaves_target_untouched() {
        let (orchestrator, target) = orchestrator(true);
        target
            .preload("customers", vec![99.into(), "Elsewhere".into()])
            .await
            .unwrap();

        let result = orchestrator.run(true).await.unwrap();

        assert_eq!(result.status, "dry_run");
        assert_eq!(result.rows_collected, 2);
        assert_eq!(result.rows_inserted, 0);
        assert_eq!(target.row_count("customers").await, 1);
        assert_eq!(result.tables.len(), 2);
    }

    #[tokio::test]
    async fn test_no_seed_rows() {
        let (mut orchestrator, _) = orchestrator(true);
        orchestrator.config.city_filter = vec!["Nowhere".to_string()].into();

        let result = orchestrator.run(false).await.unwrap();
        assert_eq!(result.status, "no_seed_rows");
        assert_eq!(result.rows_collected, 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let (orchestrator, _) = orchestrator(true);
        let health = orchestrator.health_check().await.unwrap();
        assert!(health.healthy);
        assert!(health.source_error.is_none());
    }

    #[tokio::test]
    async fn test_result_serializes() {
        let (orchestrator, _) = orchestrator(false);
        let result = orchestrator.run(false).await.unwrap();
        let json = result.to_json().unwrap();
        assert!(json.contains("\"status\": \"completed\""));
        assert!(json.contains("\"run_id\""));
    }

    #[tokio::test]
    async fn test_result_json_round_trip() {
        let (orchestrator, _) = orchestrator(true);
        let result = orchestrator.run(false).await.unwrap();

        let back: SubsetResult = serde_json::from_str(&result.to_json().unwrap()).unwrap();

        assert_eq!(back.run_id, result.run_id);
        assert_eq!(back.status, "completed");
        assert_eq!(back.insert_plan, result.insert_plan);
        assert_eq!(back.started_at, result.started_at);
        assert_eq!(back.rows_inserted, 2);
        assert_eq!(back.tables.len(), 2);
    }

    #[tokio::test]
    async fn test_root_table_name_ignores_case() {
        let db = shop();
        let target = MemoryTarget::new(&db);
        let mut config = config(true);
        config.root_table = "Customers".into();
        let orchestrator = Orchestrator::with_drivers(
            config,
            Arc::new(MemorySource::new(db)),
            Arc::new(target.clone()),
        );

        let result = orchestrator.run(false).await.unwrap();

        assert_eq!(result.root_table, "customers");
        assert_eq!(result.rows_collected, 2);
        assert_eq!(target.row_count("orders").await, 1);
    }
}
