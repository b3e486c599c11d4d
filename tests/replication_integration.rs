//! Integration tests for table-to-table replication
//!
//! Source and destination are separate SQLite files in a scratch directory.

use etl_relay::database::{ConnectionRegistry, Database, DatabaseExtractor, Introspector};
use etl_relay::etl::{BoundSql, Extractor, Record};
use etl_relay::replication::{ReplicationEngine, ReplicationRequest, RunStatus, TaskState};
use etl_relay::schema::{GenericType, QualifiedName};
use etl_relay::{EtlRunner, ReplicationReport};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    registry: Arc<ConnectionRegistry>,
    source: Database,
    destination: Database,
}

fn sqlite_url(dir: &TempDir, file: &str) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join(file).display())
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let registry = ConnectionRegistry::new()
        .with_database("src", sqlite_url(&dir, "src.db"))
        .unwrap()
        .with_database("dest", sqlite_url(&dir, "dest.db"))
        .unwrap();
    let registry = Arc::new(registry);
    let source = registry.database("src").await.unwrap();
    let destination = registry.database("dest").await.unwrap();

    Fixture {
        dir,
        registry,
        source,
        destination,
    }
}

async fn execute(db: &Database, sql: &str) {
    let mut conn = db.acquire().await.unwrap();
    sqlx::query(sql).execute(&mut *conn).await.unwrap();
}

async fn fetch(db: &Database, sql: &str) -> Vec<Record> {
    let bound = BoundSql {
        sql: sql.to_string(),
        values: vec![],
    };
    let mut extractor = DatabaseExtractor::new(db.clone(), bound, 64);
    extractor.open().await.unwrap();
    let mut records = Vec::new();
    while let Some(record) = extractor.next_record().await.unwrap() {
        records.push(record);
    }
    extractor.close().await;
    records
}

async fn create_orders(db: &Database) {
    execute(
        db,
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, amount DECIMAL(10,2), name VARCHAR(50))",
    )
    .await;
    execute(
        db,
        "INSERT INTO orders (id, amount, name) VALUES (1, 12.5, 'first'), (2, 7.25, 'second'), (3, NULL, 'third')",
    )
    .await;
}

const ORDERS_ROWS: &str = "SELECT id, CAST(amount AS TEXT) AS amount, name FROM orders ORDER BY id";

fn request(pattern: &str, threads: usize) -> ReplicationRequest {
    ReplicationRequest {
        src_table_pattern: Some(pattern.to_string()),
        thread_count: threads,
        ..ReplicationRequest::new("src", "dest")
    }
}

async fn replicate(fx: &Fixture, request: &ReplicationRequest) -> ReplicationReport {
    ReplicationEngine::new(fx.registry.clone())
        .tables_to_tables(request)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_orders_table_is_recreated_and_copied() {
    let fx = fixture().await;
    create_orders(&fx.source).await;

    let report = replicate(&fx, &request("order%", 2)).await;

    assert_eq!(report.status(), RunStatus::AllSucceeded);
    assert_eq!(report.len(), 1);
    let task = report.table("orders").unwrap();
    assert!(matches!(task.state, TaskState::Copied { rows: 3 }));

    let described = Introspector::new(&fx.destination)
        .describe(&QualifiedName::table("orders"))
        .await
        .unwrap()
        .unwrap();
    let types: Vec<&GenericType> = described.columns.iter().map(|c| &c.data_type).collect();
    assert_eq!(
        types,
        vec![
            &GenericType::Integer,
            &GenericType::Decimal {
                precision: Some(10),
                scale: 2
            },
            &GenericType::Varchar { length: 50 },
        ]
    );
    assert_eq!(described.primary_key, vec!["id".to_string()]);

    assert_eq!(
        fetch(&fx.source, ORDERS_ROWS).await,
        fetch(&fx.destination, ORDERS_ROWS).await
    );
}

#[tokio::test]
async fn test_unsupported_type_fails_only_its_table() {
    let fx = fixture().await;
    for table in ["alpha", "beta", "gamma"] {
        execute(
            &fx.source,
            &format!("CREATE TABLE {} (id INTEGER PRIMARY KEY, label TEXT)", table),
        )
        .await;
        execute(
            &fx.source,
            &format!("INSERT INTO {} (id, label) VALUES (1, 'x'), (2, 'y')", table),
        )
        .await;
    }
    execute(
        &fx.source,
        "CREATE TABLE shapes (id INTEGER PRIMARY KEY, outline GEOMETRY)",
    )
    .await;

    let report = replicate(&fx, &request("%", 2)).await;

    assert_eq!(report.status(), RunStatus::Partial);
    assert_eq!(report.len(), 4);
    assert_eq!(report.succeeded(), 3);
    for table in ["alpha", "beta", "gamma"] {
        assert!(matches!(
            report.table(table).unwrap().state,
            TaskState::Copied { rows: 2 }
        ));
    }
    match &report.table("shapes").unwrap().state {
        TaskState::DdlFailed(e) => assert_eq!(e.kind(), "UnsupportedTypeError"),
        other => panic!("expected DdlFailed, got {}", other),
    }

    let missing = Introspector::new(&fx.destination)
        .describe(&QualifiedName::table("shapes"))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_repeated_replication_is_idempotent() {
    let fx = fixture().await;
    create_orders(&fx.source).await;
    let request = request("orders", 1);

    replicate(&fx, &request).await;
    let first = fetch(&fx.destination, ORDERS_ROWS).await;
    let report = replicate(&fx, &request).await;
    let second = fetch(&fx.destination, ORDERS_ROWS).await;

    assert_eq!(report.status(), RunStatus::AllSucceeded);
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_small_batches_copy_every_row() {
    let fx = fixture().await;
    execute(
        &fx.source,
        "CREATE TABLE events (id INTEGER PRIMARY KEY, kind VARCHAR(10), happened DATETIME, flag BOOLEAN)",
    )
    .await;
    for id in 1..=47 {
        execute(
            &fx.source,
            &format!(
                "INSERT INTO events VALUES ({}, 'k{}', '2024-01-{:02} 10:00:00', {})",
                id,
                id % 3,
                id % 28 + 1,
                id % 2
            ),
        )
        .await;
    }

    let request = ReplicationRequest {
        batch_size: 5,
        fetch_size: 4,
        ..request("events", 1)
    };
    let report = replicate(&fx, &request).await;

    assert!(matches!(
        report.table("events").unwrap().state,
        TaskState::Copied { rows: 47 }
    ));
    let rows = "SELECT id, kind, CAST(happened AS TEXT) AS happened, CAST(flag AS INTEGER) AS flag FROM events ORDER BY id";
    assert_eq!(
        fetch(&fx.source, rows).await,
        fetch(&fx.destination, rows).await
    );
}

#[tokio::test]
async fn test_ddl_only_leaves_empty_tables() {
    let fx = fixture().await;
    create_orders(&fx.source).await;

    let request = ReplicationRequest {
        copy_data: false,
        ..request("orders", 1)
    };
    let report = replicate(&fx, &request).await;

    assert_eq!(report.status(), RunStatus::AllSucceeded);
    assert!(matches!(
        report.table("orders").unwrap().state,
        TaskState::DdlApplied
    ));
    assert!(fetch(&fx.destination, ORDERS_ROWS).await.is_empty());
}

#[tokio::test]
async fn test_no_matching_tables_is_empty() {
    let fx = fixture().await;
    create_orders(&fx.source).await;

    let report = replicate(&fx, &request("invoice%", 4)).await;
    assert_eq!(report.status(), RunStatus::Empty);
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_unknown_database_fails_run() {
    let fx = fixture().await;
    let request = ReplicationRequest::new("src", "warehouse");

    let err = ReplicationEngine::new(fx.registry.clone())
        .tables_to_tables(&request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ConnectionError");
}

#[tokio::test]
async fn test_elapsed_timeout_reports_incomplete() {
    let fx = fixture().await;
    for table in ["order_lines", "order_notes"] {
        execute(
            &fx.source,
            &format!("CREATE TABLE {} (id INTEGER PRIMARY KEY, qty INTEGER)", table),
        )
        .await;
        execute(
            &fx.source,
            &format!(
                "INSERT INTO {} (id, qty) WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 500) SELECT x, x * 2 FROM n",
                table
            ),
        )
        .await;
    }

    // One commit per row keeps both copies running well past the deadline
    let request = ReplicationRequest {
        timeout: Some(Duration::ZERO),
        batch_size: 1,
        ..request("order%", 2)
    };
    let report = replicate(&fx, &request).await;

    assert_eq!(report.len(), 2);
    assert!(
        report
            .tasks()
            .all(|task| matches!(task.state, TaskState::Incomplete))
    );
    assert_eq!(report.status(), RunStatus::AllFailed);

    // Unfinished tasks still describe their tables
    let lines = report.table("order_lines").unwrap();
    assert_eq!(lines.source.column_names(), vec!["id", "qty"]);
    assert_eq!(
        lines.destination.as_ref().map(|d| d.columns.len()),
        Some(2)
    );
}

#[tokio::test]
#[serial]
async fn test_replicate_business_type_with_env_urls() {
    let fx = fixture().await;
    create_orders(&fx.source).await;

    // SAFETY: serialized with the other environment-touching tests
    unsafe {
        std::env::set_var("RELAY_REPLICATION_DIR", fx.dir.path());
    }
    std::fs::write(
        fx.dir.path().join("databases.yml"),
        "databases:\n  src:\n    url: sqlite://${RELAY_REPLICATION_DIR}/src.db?mode=rwc\n  dest:\n    url: sqlite://${RELAY_REPLICATION_DIR}/dest.db?mode=rwc\n",
    )
    .unwrap();
    std::fs::write(
        fx.dir.path().join("orders.yml"),
        "extract:\n  database: src\n  table_pattern: orders\nload:\n  database: dest\n  auto_create_table: true\n  thread_count: 2\n  batch_size: 2\n",
    )
    .unwrap();

    let runner = EtlRunner::from_config_dir(fx.dir.path()).unwrap();
    let report = runner.replicate("orders", None).await.unwrap();
    runner.connections().close_all().await;

    assert_eq!(report.status(), RunStatus::AllSucceeded);
    assert_eq!(report.rows_copied(), 3);
    assert_eq!(
        fetch(&fx.source, ORDERS_ROWS).await,
        fetch(&fx.destination, ORDERS_ROWS).await
    );

    unsafe {
        std::env::remove_var("RELAY_REPLICATION_DIR");
    }
}

async fn create_labelled(db: &Database, table: &str, labels: &[&str]) {
    execute(
        db,
        &format!("CREATE TABLE {} (id INTEGER PRIMARY KEY, label TEXT)", table),
    )
    .await;
    for (id, label) in (1..).zip(labels) {
        execute(
            db,
            &format!("INSERT INTO {} (id, label) VALUES ({}, '{}')", table, id, label),
        )
        .await;
    }
}

#[tokio::test]
async fn test_copy_onto_itself_is_refused() {
    let fx = fixture().await;
    create_orders(&fx.source).await;

    let request = ReplicationRequest {
        src_table_pattern: Some("orders".into()),
        ..ReplicationRequest::new("src", "src")
    };
    let report = replicate(&fx, &request).await;

    assert_eq!(report.status(), RunStatus::AllFailed);
    match &report.table("orders").unwrap().state {
        TaskState::DdlFailed(e) => {
            assert_eq!(e.kind(), "DDLError");
            assert!(e.to_string().contains("source table"));
        }
        other => panic!("expected DdlFailed, got {}", other),
    }
    assert_eq!(fetch(&fx.source, ORDERS_ROWS).await.len(), 3);
}

#[tokio::test]
async fn test_copy_workers_stay_within_thread_count() {
    let fx = fixture().await;
    for table in ["t1", "t2", "t3", "t4", "t5", "t6"] {
        execute(
            &fx.source,
            &format!("CREATE TABLE {} (id INTEGER PRIMARY KEY, qty INTEGER)", table),
        )
        .await;
        execute(
            &fx.source,
            &format!(
                "INSERT INTO {} (id, qty) WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 40) SELECT x, x FROM n",
                table
            ),
        )
        .await;
    }

    let request = ReplicationRequest {
        batch_size: 4,
        ..request("t%", 2)
    };
    let report = replicate(&fx, &request).await;

    assert_eq!(report.status(), RunStatus::AllSucceeded);
    assert_eq!(report.rows_copied(), 240);
    assert!(report.peak_workers() >= 1);
    assert!(
        report.peak_workers() <= 2,
        "{} copies ran at once",
        report.peak_workers()
    );
}

#[tokio::test]
async fn test_ddl_failure_leaves_siblings_copied() {
    let fx = fixture().await;
    for table in ["alpha", "beta", "gamma"] {
        create_labelled(&fx.source, table, &["x", "y"]).await;
    }
    // DROP TABLE refuses to remove a view
    execute(&fx.destination, "CREATE VIEW beta AS SELECT 1 AS id").await;

    let report = replicate(&fx, &request("%", 2)).await;

    assert_eq!(report.status(), RunStatus::Partial);
    match &report.table("beta").unwrap().state {
        TaskState::DdlFailed(e) => assert_eq!(e.kind(), "DDLError"),
        other => panic!("expected DdlFailed, got {}", other),
    }
    for table in ["alpha", "gamma"] {
        assert!(matches!(
            report.table(table).unwrap().state,
            TaskState::Copied { rows: 2 }
        ));
    }
}

#[tokio::test]
async fn test_constraint_violation_fails_only_its_copy() {
    let fx = fixture().await;
    create_labelled(&fx.source, "alpha", &["x", "y"]).await;
    create_labelled(&fx.source, "beta", &["x", "x", "z"]).await;
    create_labelled(&fx.source, "gamma", &["x", "y"]).await;

    execute(
        &fx.destination,
        "CREATE TABLE alpha (id INTEGER PRIMARY KEY, label TEXT)",
    )
    .await;
    execute(
        &fx.destination,
        "CREATE TABLE beta (id INTEGER PRIMARY KEY, label TEXT UNIQUE)",
    )
    .await;
    execute(
        &fx.destination,
        "CREATE TABLE gamma (id INTEGER PRIMARY KEY, label TEXT)",
    )
    .await;

    let request = ReplicationRequest {
        drop_and_create: false,
        batch_size: 1,
        ..request("%", 3)
    };
    let report = replicate(&fx, &request).await;

    assert_eq!(report.status(), RunStatus::Partial);
    match &report.table("beta").unwrap().state {
        TaskState::CopyFailed(e) => assert_eq!(e.kind(), "LoadError"),
        other => panic!("expected CopyFailed, got {}", other),
    }
    for table in ["alpha", "gamma"] {
        assert!(matches!(
            report.table(table).unwrap().state,
            TaskState::Copied { rows: 2 }
        ));
    }
    // The batch before the duplicate stays committed
    assert_eq!(
        fetch(&fx.destination, "SELECT id FROM beta").await.len(),
        1
    );
}
