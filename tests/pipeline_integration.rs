//! Integration tests for business-type pipelines
//!
//! These tests run complete extract → transform → load flows through
//! `EtlRunner` against SQLite files and NDJSON files in scratch directories.

use etl_relay::database::{ConnectionRegistry, Database, DatabaseExtractor};
use etl_relay::etl::{BoundSql, Extractor, Record, Transformer, Value};
use etl_relay::storage::Input;
use etl_relay::{EtlRunner, RunOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const REGIONS: [&str; 4] = ["EU", "US", "US", "APAC"];

/// Scratch config directory with an `erp` database holding 20 customers,
/// 5 of them in the EU
async fn setup() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("erp.db").display());
    std::fs::write(
        dir.path().join("databases.yml"),
        format!("databases:\n  erp:\n    url: \"{}\"\n    max_connections: 2\n", url),
    )
    .unwrap();

    let registry = ConnectionRegistry::new().with_database("erp", url).unwrap();
    let db = registry.database("erp").await.unwrap();

    execute(
        &db,
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name VARCHAR(40) NOT NULL, region VARCHAR(8))",
    )
    .await;
    execute(
        &db,
        "CREATE TABLE customer_copy (id INTEGER PRIMARY KEY, full_name TEXT, source_system TEXT)",
    )
    .await;
    for id in 1..=20 {
        let region = REGIONS[(id - 1) % REGIONS.len()];
        execute(
            &db,
            &format!(
                "INSERT INTO customers (id, name, region) VALUES ({}, 'customer {}', '{}')",
                id, id, region
            ),
        )
        .await;
    }

    (dir, db)
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
    let mut extractor = DatabaseExtractor::new(db.clone(), bound, 16);
    extractor.open().await.unwrap();
    let mut records = Vec::new();
    while let Some(record) = extractor.next_record().await.unwrap() {
        records.push(record);
    }
    extractor.close().await;
    records
}

fn write_business_type(dir: &TempDir, name: &str, content: &str) {
    std::fs::write(dir.path().join(format!("{}.yml", name)), content).unwrap();
}

fn read_ndjson(path: &std::path::Path) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Drops every record and counts how many it saw
struct DropAll {
    seen: Arc<AtomicUsize>,
}

impl Transformer for DropAll {
    fn transform(&self, _record: Record) -> etl_relay::Result<Option<Record>> {
        self.seen.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

#[tokio::test]
async fn test_named_parameter_selects_region() {
    let (dir, _db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id, name, region FROM customers WHERE region = :region ORDER BY id"
  parameters:
    region: US
load:
  kind: ndjson
"#,
    );
    let output = dir.path().join("eu.ndjson");

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let written = runner
        .run(
            "customers",
            RunOptions::new().parameter("region", "EU").output(&output),
        )
        .await
        .unwrap();

    assert_eq!(written, 5);
    let rows = read_ndjson(&output);
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|row| row["region"] == "EU"));
    assert_eq!(rows[0]["id"], 1);
    assert_eq!(rows[4]["id"], 17);
}

#[tokio::test]
async fn test_configured_parameter_is_default() {
    let (dir, _db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id FROM customers WHERE region = :region"
  parameters:
    region: US
load:
  kind: ndjson
"#,
    );
    let output = dir.path().join("us.ndjson");

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let written = runner
        .run("customers", RunOptions::new().output(&output))
        .await
        .unwrap();
    assert_eq!(written, 10);
}

#[tokio::test]
async fn test_missing_parameter_is_extraction_error() {
    let (dir, _db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id FROM customers WHERE region = :region"
load:
  kind: ndjson
"#,
    );

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let err = runner
        .run(
            "customers",
            RunOptions::new().output(dir.path().join("out.ndjson")),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ExtractionError");
}

#[tokio::test]
async fn test_drop_all_transformer_consumes_stream() {
    let (dir, db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id, name AS full_name FROM customers"
load:
  database: erp
  table: customer_copy
"#,
    );
    let seen = Arc::new(AtomicUsize::new(0));

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let written = runner
        .run(
            "customers",
            RunOptions::new().transformer(DropAll { seen: seen.clone() }),
        )
        .await
        .unwrap();

    assert_eq!(written, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 20);
    assert!(fetch(&db, "SELECT id FROM customer_copy").await.is_empty());
}

#[tokio::test]
async fn test_configured_column_mapping() {
    let (dir, db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id, name, region FROM customers ORDER BY id"
transform:
  columns:
    - source: name
      target: full_name
    - source: region
      drop: true
    - target: source_system
      constant: erp
  drop_when:
    - column: region
      equals: APAC
load:
  database: erp
  table: customer_copy
  batch_size: 3
"#,
    );

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let written = runner
        .run("customers", RunOptions::new())
        .await
        .unwrap();
    assert_eq!(written, 15);

    let rows = fetch(
        &db,
        "SELECT id, full_name, source_system FROM customer_copy ORDER BY id",
    )
    .await;
    assert_eq!(rows.len(), 15);
    assert_eq!(rows[0].get("full_name"), Some(&Value::from("customer 1")));
    assert_eq!(rows[0].get("source_system"), Some(&Value::from("erp")));
    assert!(rows.iter().all(|row| row.get("id") != Some(&Value::Int(4))));
}

#[tokio::test]
async fn test_ndjson_input_into_database() {
    let (dir, db) = setup().await;
    write_business_type(
        &dir,
        "feed",
        r#"
extract:
  kind: ndjson
load:
  database: erp
  table: customer_copy
"#,
    );
    let input = Input::Text(
        "{\"id\": 100, \"full_name\": \"Ada\", \"source_system\": \"feed\"}\n\
         \n\
         {\"id\": 101, \"full_name\": null, \"source_system\": \"feed\"}\n"
            .to_string(),
    );

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let written = runner
        .run("feed", RunOptions::new().input(input))
        .await
        .unwrap();
    assert_eq!(written, 2);

    let rows = fetch(&db, "SELECT id, full_name FROM customer_copy ORDER BY id").await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("full_name"), Some(&Value::from("Ada")));
    assert_eq!(rows[1].get("full_name"), Some(&Value::Null));
}

#[tokio::test]
async fn test_unknown_column_fails_load_and_keeps_destination() {
    let (dir, db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id, name, region FROM customers"
load:
  database: erp
  table: customer_copy
"#,
    );

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let err = runner
        .run("customers", RunOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "LoadError");
    assert!(fetch(&db, "SELECT id FROM customer_copy").await.is_empty());
}

#[tokio::test]
async fn test_missing_destination_table_is_load_error() {
    let (dir, _db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id FROM customers"
load:
  database: erp
  table: nowhere
"#,
    );

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let err = runner
        .run("customers", RunOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "LoadError");
}

#[tokio::test]
async fn test_unknown_business_type_is_configuration_error() {
    let (dir, _db) = setup().await;
    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let err = runner
        .run("invoices", RunOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "ConfigurationError");
}

#[tokio::test]
async fn test_transform_from_override_file_only() {
    let (dir, db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id, name, region FROM customers WHERE region = 'EU'"
load:
  database: erp
  table: customer_copy
"#,
    );
    let override_file = dir.path().join("mapping.yml");
    std::fs::write(
        &override_file,
        r#"
transform:
  columns:
    - source: name
      target: full_name
    - source: region
      drop: true
"#,
    )
    .unwrap();

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let written = runner
        .run(
            "customers",
            RunOptions::new().override_file(&override_file),
        )
        .await
        .unwrap();
    assert_eq!(written, 5);

    let rows = fetch(&db, "SELECT id, full_name FROM customer_copy ORDER BY id").await;
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0].get("full_name"), Some(&Value::from("customer 1")));
}

#[tokio::test]
async fn test_mapping_error_names_business_type() {
    let (dir, _db) = setup().await;
    write_business_type(
        &dir,
        "customers",
        r#"
extract:
  database: erp
  sql: "SELECT id FROM customers"
transform:
  columns:
    - source: nickname
      target: full_name
load:
  kind: ndjson
"#,
    );

    let runner = EtlRunner::from_config_dir(dir.path()).unwrap();
    let err = runner
        .run(
            "customers",
            RunOptions::new().output(dir.path().join("out.ndjson")),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "TransformError");
    assert!(err.to_string().contains("'customers'"), "{}", err);
}
