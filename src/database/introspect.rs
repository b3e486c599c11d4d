//! Table and column metadata discovery
//!
//! One set of catalog queries per dialect: `information_schema` views for
//! PostgreSQL and MySQL, `sqlite_master` and `pragma_table_info` for SQLite.
//! Every query casts its output columns to plain text or integers so the
//! driver-neutral row type can decode them.

use super::row::fetch_values;
use super::types::{TypeSize, classify};
use super::{Database, Dialect};
use crate::error::{EtlError, Result};
use crate::etl::Value;
use crate::schema::{ColumnDescriptor, QualifiedName, TableDescriptor};

const PG_TABLES: &str = r#"
    SELECT CAST(table_catalog AS TEXT), CAST(table_schema AS TEXT), CAST(table_name AS TEXT)
    FROM information_schema.tables
    WHERE table_type = 'BASE TABLE'
      AND table_schema NOT IN ('pg_catalog', 'information_schema')
      AND table_schema LIKE COALESCE($1, current_schema())
      AND table_name LIKE $2
      AND table_catalog = COALESCE($3, current_database())
    ORDER BY 2, 3
"#;

const PG_COLUMNS: &str = r#"
    SELECT
        CAST(column_name AS TEXT),
        CAST(CASE WHEN data_type = 'USER-DEFINED' THEN udt_name ELSE data_type END AS TEXT),
        CAST(character_maximum_length AS INTEGER),
        CAST(numeric_precision AS INTEGER),
        CAST(numeric_scale AS INTEGER),
        CAST(is_nullable AS TEXT),
        CAST(ordinal_position AS INTEGER)
    FROM information_schema.columns
    WHERE table_schema = COALESCE($1, current_schema()) AND table_name = $2
    ORDER BY ordinal_position
"#;

const PG_PRIMARY_KEY: &str = r#"
    SELECT CAST(kcu.column_name AS TEXT)
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
     AND tc.table_name = kcu.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
      AND tc.table_schema = COALESCE($1, current_schema())
      AND tc.table_name = $2
    ORDER BY kcu.ordinal_position
"#;

const MYSQL_TABLES: &str = r#"
    SELECT CAST(TABLE_SCHEMA AS CHAR), CAST(TABLE_NAME AS CHAR)
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_TYPE = 'BASE TABLE'
      AND TABLE_SCHEMA LIKE COALESCE(?, DATABASE())
      AND TABLE_NAME LIKE ?
    ORDER BY 1, 2
"#;

const MYSQL_COLUMNS: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR),
        CAST(COLUMN_TYPE AS CHAR),
        CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED),
        CAST(NUMERIC_PRECISION AS SIGNED),
        CAST(NUMERIC_SCALE AS SIGNED),
        CAST(IS_NULLABLE AS CHAR),
        CAST(ORDINAL_POSITION AS SIGNED)
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const MYSQL_PRIMARY_KEY: &str = r#"
    SELECT CAST(COLUMN_NAME AS CHAR)
    FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE
    WHERE CONSTRAINT_NAME = 'PRIMARY'
      AND TABLE_SCHEMA = COALESCE(?, DATABASE())
      AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const SQLITE_TABLES: &str = r#"
    SELECT name FROM sqlite_master
    WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name LIKE ?
    ORDER BY name
"#;

const SQLITE_COLUMNS: &str =
    r#"SELECT cid, name, type, "notnull", pk FROM pragma_table_info(?) ORDER BY cid"#;

/// Reads table metadata from one database
pub struct Introspector<'a> {
    db: &'a Database,
}

impl<'a> Introspector<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    fn error(&self, e: impl Into<crate::error::BoxError>) -> EtlError {
        EtlError::extraction(format!("introspecting {}", self.db.name()), e)
    }

    async fn query(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Vec<Value>>> {
        let mut conn = self.db.acquire().await?;
        fetch_values(&mut conn, sql, params)
            .await
            .map_err(|e| self.error(e))
    }

    /// Names of the base tables matching the patterns
    ///
    /// Patterns use SQL `LIKE` syntax. A missing schema pattern means the
    /// connection's current schema; a missing table pattern matches every
    /// table. SQLite has no catalogs or schemas and ignores both.
    pub async fn list_tables(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
    ) -> Result<Vec<QualifiedName>> {
        let table_pattern = Value::from(table_pattern.unwrap_or("%"));
        let schema_pattern = Value::from(schema_pattern);

        let names = match self.db.dialect() {
            Dialect::Postgres => self
                .query(PG_TABLES, vec![schema_pattern, table_pattern, Value::from(catalog)])
                .await?
                .into_iter()
                .map(|row| {
                    QualifiedName::new(text(&row, 0), text(&row, 1), text(&row, 2).unwrap_or_default())
                })
                .collect(),
            Dialect::MySql => self
                .query(MYSQL_TABLES, vec![schema_pattern, table_pattern])
                .await?
                .into_iter()
                .map(|row| QualifiedName::new(None, text(&row, 0), text(&row, 1).unwrap_or_default()))
                .collect(),
            Dialect::Sqlite => {
                if catalog.is_some() || !schema_pattern.is_null() {
                    log::debug!("SQLite has no catalogs or schemas; ignoring those filters");
                }
                self.query(SQLITE_TABLES, vec![table_pattern])
                    .await?
                    .into_iter()
                    .map(|row| QualifiedName::table(text(&row, 0).unwrap_or_default()))
                    .collect()
            }
        };
        Ok(names)
    }

    /// Columns and primary key of one table, `None` if it does not exist
    pub async fn describe(&self, name: &QualifiedName) -> Result<Option<TableDescriptor>> {
        let (columns, primary_key) = match self.db.dialect() {
            Dialect::Postgres => self.describe_catalog(name, PG_COLUMNS, PG_PRIMARY_KEY).await?,
            Dialect::MySql => {
                self.describe_catalog(name, MYSQL_COLUMNS, MYSQL_PRIMARY_KEY)
                    .await?
            }
            Dialect::Sqlite => self.describe_sqlite(name).await?,
        };

        if columns.is_empty() {
            return Ok(None);
        }
        log::debug!(
            "Described {}.{}: {} columns, primary key ({})",
            self.db.name(),
            name,
            columns.len(),
            primary_key.join(", ")
        );
        Ok(Some(TableDescriptor {
            name: name.clone(),
            columns,
            primary_key,
        }))
    }

    async fn describe_catalog(
        &self,
        name: &QualifiedName,
        columns_sql: &str,
        primary_key_sql: &str,
    ) -> Result<(Vec<ColumnDescriptor>, Vec<String>)> {
        let params = || {
            vec![
                Value::from(name.schema.clone()),
                Value::from(name.table.as_str()),
            ]
        };

        let columns = self
            .query(columns_sql, params())
            .await?
            .into_iter()
            .map(|row| {
                let native = text(&row, 1).unwrap_or_default();
                let size = TypeSize {
                    length: int(&row, 2),
                    precision: int(&row, 3),
                    scale: int(&row, 4),
                };
                ColumnDescriptor {
                    name: text(&row, 0).unwrap_or_default(),
                    data_type: classify(&native, size),
                    native_type: native,
                    nullable: text(&row, 5).is_none_or(|n| n.eq_ignore_ascii_case("YES")),
                    ordinal: int(&row, 6).and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
                }
            })
            .collect();

        let primary_key = self
            .query(primary_key_sql, params())
            .await?
            .into_iter()
            .filter_map(|row| text(&row, 0))
            .collect();

        Ok((columns, primary_key))
    }

    async fn describe_sqlite(
        &self,
        name: &QualifiedName,
    ) -> Result<(Vec<ColumnDescriptor>, Vec<String>)> {
        let rows = self
            .query(SQLITE_COLUMNS, vec![Value::from(name.table.as_str())])
            .await?;

        let mut keyed: Vec<(i64, String)> = Vec::new();
        let columns = rows
            .into_iter()
            .map(|row| {
                let column_name = text(&row, 1).unwrap_or_default();
                let native = text(&row, 2).unwrap_or_default();
                if let Some(position) = int(&row, 4).filter(|pk| *pk > 0) {
                    keyed.push((position, column_name.clone()));
                }
                ColumnDescriptor {
                    data_type: classify(&native, TypeSize::default()),
                    native_type: native,
                    nullable: int(&row, 3) != Some(1),
                    ordinal: int(&row, 0)
                        .and_then(|cid| u32::try_from(cid + 1).ok())
                        .unwrap_or(0),
                    name: column_name,
                }
            })
            .collect();

        keyed.sort();
        let primary_key = keyed.into_iter().map(|(_, column)| column).collect();
        Ok((columns, primary_key))
    }

    /// Describe every table matching the patterns
    ///
    /// The result is sorted by qualified name and free of duplicates. Tables
    /// that disappear between listing and describing are skipped.
    pub async fn snapshot(
        &self,
        catalog: Option<&str>,
        schema_pattern: Option<&str>,
        table_pattern: Option<&str>,
    ) -> Result<Vec<TableDescriptor>> {
        let mut names = self.list_tables(catalog, schema_pattern, table_pattern).await?;
        names.sort();
        names.dedup();

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            match self.describe(&name).await? {
                Some(table) => tables.push(table),
                None => log::warn!("Table {} vanished during introspection, skipping", name),
            }
        }
        Ok(tables)
    }
}

fn text(row: &[Value], index: usize) -> Option<String> {
    match row.get(index)? {
        Value::Text(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn int(row: &[Value], index: usize) -> Option<i64> {
    match row.get(index)? {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}
