//! End-to-end subset runs against the in-memory driver.

use std::sync::Arc;

use mysql_subset::core::SourceReader;
use mysql_subset::drivers::{MemoryDatabase, MemorySource, MemoryTarget};
use mysql_subset::{
    ClosureBuilder, Column, Config, ForeignKeyEdge, InsertOrder, Materializer, Orchestrator,
    RelationshipGraph, RowKey, SqlNullType, SqlValue, SubsetError,
};

fn config(root_table: &str, cities: &[&str], order: InsertOrder) -> Config {
    let mut config = Config::from_yaml(&format!(
        r#"
source: {{ host: prod-db, database: shop, user: reader }}
target: {{ host: localhost, database: shop_subset, user: writer }}
root_table: {}
city_filter: Springfield
"#,
        root_table
    ))
    .unwrap();
    config.city_filter = cities
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .into();
    config.subset.insert_order = order;
    config
}

fn null_int() -> SqlValue {
    SqlValue::Null(SqlNullType::I64)
}

fn int_col(name: &str, nullable: bool) -> Column {
    Column::new(name, "int", nullable)
}

/// customers -> orders -> order_details -> products -> suppliers.
///
/// Springfield: customers 1-3, two orders each (101-106), two details per
/// order over products 1-6 (each used twice), products 2n-1 and 2n from
/// supplier n. Shelbyville: customers 4-5 with orders 107-108 over
/// products 7-8 from supplier 4.
fn shop() -> MemoryDatabase {
    let mut db = MemoryDatabase::new();
    db.create_table(
        "suppliers",
        vec![int_col("id", false), Column::new("name", "varchar", false)],
        &["id"],
    );
    db.create_table(
        "products",
        vec![
            int_col("id", false),
            int_col("supplier_id", true),
            Column::new("name", "varchar", false),
        ],
        &["id"],
    );
    db.create_table(
        "customers",
        vec![
            int_col("id", false),
            Column::new("name", "varchar", false),
            Column::new("city", "varchar", true),
        ],
        &["id"],
    );
    db.create_table(
        "orders",
        vec![int_col("id", false), int_col("customer_id", true)],
        &["id"],
    );
    db.create_table(
        "order_details",
        vec![
            int_col("order_id", false),
            int_col("product_id", false),
            int_col("quantity", false),
        ],
        &["order_id", "product_id"],
    );

    db.add_foreign_key(ForeignKeyEdge::new("products", "supplier_id", "suppliers", "id"));
    db.add_foreign_key(ForeignKeyEdge::new("orders", "customer_id", "customers", "id"));
    db.add_foreign_key(ForeignKeyEdge::new("order_details", "order_id", "orders", "id"));
    db.add_foreign_key(ForeignKeyEdge::new("order_details", "product_id", "products", "id"));

    for s in 1..=4 {
        db.insert("suppliers", vec![s.into(), format!("Supplier {}", s).into()])
            .unwrap();
    }
    for p in 1..=8 {
        db.insert(
            "products",
            vec![p.into(), ((p + 1) / 2).into(), format!("Product {}", p).into()],
        )
        .unwrap();
    }

    let customers = [
        (1, "Marge", "Springfield"),
        (2, "Ned", "Springfield"),
        (3, "Apu", "Springfield"),
        (4, "Snake", "Shelbyville"),
        (5, "Lenny", "Shelbyville"),
    ];
    for (id, name, city) in customers {
        db.insert("customers", vec![id.into(), name.into(), city.into()])
            .unwrap();
    }

    for k in 0..6 {
        let order = 101 + k;
        db.insert("orders", vec![order.into(), (k / 2 + 1).into()])
            .unwrap();
        let first = k % 6 + 1;
        let second = (k + 1) % 6 + 1;
        db.insert("order_details", vec![order.into(), first.into(), 1.into()])
            .unwrap();
        db.insert("order_details", vec![order.into(), second.into(), 2.into()])
            .unwrap();
    }
    db.insert("orders", vec![107.into(), 4.into()]).unwrap();
    db.insert("orders", vec![108.into(), 5.into()]).unwrap();
    db.insert("order_details", vec![107.into(), 7.into(), 1.into()])
        .unwrap();
    db.insert("order_details", vec![108.into(), 8.into(), 1.into()])
        .unwrap();
    db
}

fn orchestrator(db: MemoryDatabase, config: Config) -> (Orchestrator, MemoryTarget) {
    let target = MemoryTarget::new(&db);
    let orchestrator = Orchestrator::with_drivers(
        config,
        Arc::new(MemorySource::new(db)),
        Arc::new(target.clone()),
    );
    (orchestrator, target)
}

fn count(result: &mysql_subset::SubsetResult, table: &str) -> (usize, usize) {
    result
        .tables
        .iter()
        .find(|t| t.table == table)
        .map(|t| (t.collected, t.inserted))
        .unwrap_or((0, 0))
}

#[tokio::test]
async fn springfield_closure_is_complete_and_minimal() {
    let db = shop();
    let (orchestrator, target) = orchestrator(
        db,
        config("customers", &["Springfield"], InsertOrder::Topological),
    );

    let result = orchestrator.run(false).await.unwrap();

    assert_eq!(result.status, "completed");
    assert_eq!(result.seed_rows, 3);
    assert_eq!(count(&result, "customers"), (3, 3));
    assert_eq!(count(&result, "orders"), (6, 6));
    assert_eq!(count(&result, "order_details"), (12, 12));
    assert_eq!(count(&result, "products"), (6, 6));
    assert_eq!(count(&result, "suppliers"), (3, 3));
    assert_eq!(result.rows_collected, 30);
    assert!(result.dangling_references.is_empty());
    assert!(result.skipped_rows.is_empty());

    // Every loaded detail's order and product made it too.
    let snapshot = target.snapshot().await;
    for detail in snapshot.rows("order_details") {
        let order = detail.get("order_id").unwrap();
        let product = detail.get("product_id").unwrap();
        assert!(snapshot.rows("orders").iter().any(|o| o.get("id") == Some(order)));
        assert!(snapshot
            .rows("products")
            .iter()
            .any(|p| p.get("id") == Some(product)));
    }
    assert!(!snapshot
        .rows("customers")
        .iter()
        .any(|c| c.get("city") == Some(&SqlValue::from("Shelbyville"))));
}

#[tokio::test]
async fn multiple_cities_seed_with_in_list() {
    let (orchestrator, _) = orchestrator(
        shop(),
        config(
            "customers",
            &["Springfield", "Shelbyville"],
            InsertOrder::Topological,
        ),
    );
    let result = orchestrator.run(false).await.unwrap();
    assert_eq!(result.seed_rows, 5);
    assert_eq!(count(&result, "suppliers"), (4, 4));
    assert_eq!(result.rows_inserted, result.rows_collected);
}

#[tokio::test]
async fn dangling_reference_is_reported_not_fatal() {
    let mut db = shop();
    // Springfield order 101 references a product that was deleted.
    db.insert("order_details", vec![101.into(), 99.into(), 1.into()])
        .unwrap();
    let (orchestrator, _) = orchestrator(
        db,
        config("customers", &["Springfield"], InsertOrder::Topological),
    );

    let result = orchestrator.run(false).await.unwrap();

    assert_eq!(count(&result, "order_details").0, 13);
    assert_eq!(result.dangling_references.len(), 1);
    let dangling = &result.dangling_references[0];
    assert_eq!(dangling.table, "order_details");
    assert_eq!(dangling.key, "(101, 99)");
    assert_eq!(dangling.parent_table, "products");
    assert_eq!(dangling.value, "99");

    // The target enforces the foreign key, so that one row is skipped.
    assert_eq!(result.status, "completed_with_skips");
    assert_eq!(result.skipped_rows.len(), 1);
    assert_eq!(result.skipped_rows[0].key, "(101, 99)");
    assert_eq!(count(&result, "order_details").1, 12);
}

#[tokio::test]
async fn self_referencing_table_terminates_and_loads() {
    let mut db = MemoryDatabase::new();
    db.create_table(
        "employees",
        vec![int_col("id", false), int_col("manager_id", true)],
        &["id"],
    );
    db.create_table(
        "customers",
        vec![
            int_col("id", false),
            Column::new("city", "varchar", true),
            int_col("support_rep_id", true),
        ],
        &["id"],
    );
    db.add_foreign_key(ForeignKeyEdge::new("employees", "manager_id", "employees", "id"));
    db.add_foreign_key(ForeignKeyEdge::new("customers", "support_rep_id", "employees", "id"));

    // 1 manages 2 and 4; 2 manages 3. 5 is unrelated.
    db.insert("employees", vec![1.into(), null_int()]).unwrap();
    db.insert("employees", vec![2.into(), 1.into()]).unwrap();
    db.insert("employees", vec![3.into(), 2.into()]).unwrap();
    db.insert("employees", vec![4.into(), 1.into()]).unwrap();
    db.insert("employees", vec![5.into(), null_int()]).unwrap();
    db.insert("customers", vec![10.into(), "Springfield".into(), 3.into()])
        .unwrap();

    let (orchestrator, target) = orchestrator(
        db,
        config("customers", &["Springfield"], InsertOrder::Topological),
    );
    let result = orchestrator.run(false).await.unwrap();

    assert_eq!(count(&result, "employees"), (4, 4));
    assert!(result.skipped_rows.is_empty());
    assert_eq!(result.insert_plan[0].table, "employees");
    assert!(result.insert_plan[0].relax_constraints);
    assert_eq!(target.row_count("employees").await, 4);
}

#[tokio::test]
async fn cross_table_cycle_terminates_and_loads() {
    // departments.head_id -> employees, employees.department_id -> departments.
    let mut db = MemoryDatabase::new();
    db.create_table(
        "departments",
        vec![
            int_col("id", false),
            Column::new("city", "varchar", true),
            int_col("head_id", true),
        ],
        &["id"],
    );
    db.create_table(
        "employees",
        vec![int_col("id", false), int_col("department_id", true)],
        &["id"],
    );
    db.add_foreign_key(ForeignKeyEdge::new("departments", "head_id", "employees", "id"));
    db.add_foreign_key(ForeignKeyEdge::new("employees", "department_id", "departments", "id"));

    db.insert("departments", vec![1.into(), "Springfield".into(), 11.into()])
        .unwrap();
    db.insert("departments", vec![2.into(), "Shelbyville".into(), 21.into()])
        .unwrap();
    db.insert("employees", vec![11.into(), 1.into()]).unwrap();
    db.insert("employees", vec![12.into(), 1.into()]).unwrap();
    db.insert("employees", vec![21.into(), 2.into()]).unwrap();

    let source = MemorySource::new(db.clone());
    let graph = RelationshipGraph::from_edges(db.foreign_keys().to_vec());
    let seeds = source
        .fetch_seed("departments", "city", &["Springfield".to_string()])
        .await
        .unwrap();
    let closure = ClosureBuilder::new(&source, &graph)
        .build("departments", seeds)
        .await
        .unwrap();
    assert_eq!(closure.len("departments"), 1);
    assert_eq!(closure.len("employees"), 2);
    assert!(!closure.contains("employees", &RowKey(vec![21.into()])));

    let (orchestrator, target) = orchestrator(
        db,
        config("departments", &["Springfield"], InsertOrder::Topological),
    );
    let result = orchestrator.run(false).await.unwrap();

    let plan: Vec<(&str, bool)> = result
        .insert_plan
        .iter()
        .map(|s| (s.table.as_str(), s.relax_constraints))
        .collect();
    assert_eq!(plan, [("departments", true), ("employees", false)]);
    assert_eq!(count(&result, "departments"), (1, 1));
    assert_eq!(count(&result, "employees"), (2, 2));
    assert!(result.skipped_rows.is_empty());
    assert_eq!(result.status, "completed");
    assert_eq!(target.row_count("departments").await, 1);
    assert_eq!(target.row_count("employees").await, 2);
}

#[tokio::test]
async fn increasing_edge_counts_load_without_skips() {
    // a <- b <- c <- d, where each table also references every earlier one.
    let mut db = MemoryDatabase::new();
    db.create_table("a", vec![int_col("id", false), Column::new("city", "varchar", true)], &["id"]);
    db.create_table("b", vec![int_col("id", false), int_col("a_id", false)], &["id"]);
    db.create_table(
        "c",
        vec![int_col("id", false), int_col("a_id", false), int_col("b_id", false)],
        &["id"],
    );
    db.create_table(
        "d",
        vec![
            int_col("id", false),
            int_col("a_id", false),
            int_col("b_id", false),
            int_col("c_id", false),
        ],
        &["id"],
    );
    for edge in [
        ("b", "a_id", "a"),
        ("c", "a_id", "a"),
        ("c", "b_id", "b"),
        ("d", "a_id", "a"),
        ("d", "b_id", "b"),
        ("d", "c_id", "c"),
    ] {
        db.add_foreign_key(ForeignKeyEdge::new(edge.0, edge.1, edge.2, "id"));
    }
    db.insert("a", vec![1.into(), "Springfield".into()]).unwrap();
    db.insert("b", vec![1.into(), 1.into()]).unwrap();
    db.insert("c", vec![1.into(), 1.into(), 1.into()]).unwrap();
    db.insert("d", vec![1.into(), 1.into(), 1.into(), 1.into()]).unwrap();

    let (orchestrator, _) = orchestrator(db, config("a", &["Springfield"], InsertOrder::EdgeCount));
    let result = orchestrator.run(false).await.unwrap();

    let order: Vec<&str> = result.insert_plan.iter().map(|s| s.table.as_str()).collect();
    assert_eq!(order, ["a", "b", "c", "d"]);
    assert_eq!(result.rows_inserted, 4);
    assert!(result.skipped_rows.is_empty());
}

#[tokio::test]
async fn rerun_into_cleared_target_is_idempotent() {
    let (orchestrator, target) = orchestrator(
        shop(),
        config("customers", &["Springfield"], InsertOrder::Topological),
    );

    let first = orchestrator.run(false).await.unwrap();
    let second = orchestrator.run(false).await.unwrap();

    assert_eq!(first.tables, second.tables);
    assert!(second.skipped_rows.is_empty());
    assert_eq!(target.row_count("order_details").await, 12);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn rerun_without_clear_skips_duplicates() {
    let mut config = config("customers", &["Springfield"], InsertOrder::Topological);
    config.subset.clear_target = false;
    let (orchestrator, target) = orchestrator(shop(), config);

    orchestrator.run(false).await.unwrap();
    let second = orchestrator.run(false).await.unwrap();

    assert_eq!(second.rows_inserted, 0);
    assert_eq!(second.rows_skipped, 30);
    assert!(second.skipped_rows[0].reason.contains("Duplicate entry"));
    assert_eq!(target.row_count("customers").await, 3);
}

#[tokio::test]
async fn fetch_error_aborts_before_materializing() {
    let db = shop();
    let target = MemoryTarget::new(&db);
    let source = MemorySource::new(db).fail_fetches_on("order_details");
    let orchestrator = Orchestrator::with_drivers(
        config("customers", &["Springfield"], InsertOrder::Topological),
        Arc::new(source),
        Arc::new(target.clone()),
    );

    let err = orchestrator.run(false).await.unwrap_err();

    assert!(matches!(err, SubsetError::Fetch { ref table, .. } if table == "order_details"));
    assert_eq!(err.exit_code(), 4);
    for table in ["customers", "orders", "order_details", "products", "suppliers"] {
        assert_eq!(target.row_count(table).await, 0, "{} was written", table);
    }
}

#[tokio::test]
async fn keyless_table_requires_opt_in() {
    let mut db = shop();
    db.create_table(
        "order_notes",
        vec![int_col("order_id", false), Column::new("note", "text", true)],
        &[],
    );
    db.add_foreign_key(ForeignKeyEdge::new("order_notes", "order_id", "orders", "id"));
    db.insert("order_notes", vec![101.into(), "leave at door".into()])
        .unwrap();
    db.insert("order_notes", vec![101.into(), "leave at door".into()])
        .unwrap();

    let (strict, _) = orchestrator(
        db.clone(),
        config("customers", &["Springfield"], InsertOrder::Topological),
    );
    let err = strict.run(false).await.unwrap_err();
    assert!(matches!(err, SubsetError::NoPrimaryKey(ref t) if t == "order_notes"));

    let mut lenient_config = config("customers", &["Springfield"], InsertOrder::Topological);
    lenient_config.subset.allow_keyless_tables = true;
    let (lenient, target) = orchestrator(db, lenient_config);
    let result = lenient.run(false).await.unwrap();

    // Identical rows share a key and collapse to one.
    assert_eq!(count(&result, "order_notes"), (1, 1));
    assert_eq!(target.row_count("order_notes").await, 1);
}

#[tokio::test]
async fn closure_and_materializer_compose_directly() {
    let db = shop();
    let target = MemoryTarget::new(&db);
    let source = MemorySource::new(db);
    let graph = RelationshipGraph::from_edges(source.database().foreign_keys().to_vec());

    let seeds = source
        .fetch_seed("customers", "city", &["Springfield".to_string()])
        .await
        .unwrap();
    let closure = ClosureBuilder::new(&source, &graph)
        .build("customers", seeds)
        .await
        .unwrap();

    assert!(closure.contains("order_details", &RowKey(vec![101.into(), 1.into()])));
    assert!(!closure.contains("orders", &RowKey(vec![107.into()])));

    let report = Materializer::new(&target, &graph, InsertOrder::Topological)
        .materialize(&closure)
        .await
        .unwrap();
    assert_eq!(report.rows_inserted(), closure.total_rows());
}
