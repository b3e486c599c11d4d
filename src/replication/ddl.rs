//! DDL and copy statements for replicated tables

use crate::database::{Database, Dialect};
use crate::error::{EtlError, Result};
use crate::schema::TableDescriptor;

pub fn drop_table_sql(dialect: Dialect, table: &TableDescriptor) -> String {
    format!("DROP TABLE IF EXISTS {}", dialect.qualify(&table.name))
}

/// CREATE TABLE with every column's native type, nullability and the
/// primary key
pub fn create_table_sql(dialect: Dialect, table: &TableDescriptor) -> String {
    let mut definitions: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("    {} {}{}", dialect.quote_ident(&c.name), c.native_type, null)
        })
        .collect();

    if !table.primary_key.is_empty() {
        let keys = table
            .primary_key
            .iter()
            .map(|k| dialect.quote_ident(k))
            .collect::<Vec<_>>()
            .join(", ");
        definitions.push(format!("    PRIMARY KEY ({})", keys));
    }

    format!(
        "CREATE TABLE {} (\n{}\n)",
        dialect.qualify(&table.name),
        definitions.join(",\n")
    )
}

/// SELECT reading every column of a source table in ordinal order
pub fn select_table_sql(dialect: Dialect, table: &TableDescriptor) -> String {
    let columns = table
        .columns
        .iter()
        .map(|c| dialect.select_expr(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {} FROM {}", columns, dialect.qualify(&table.name))
}

/// Drop the destination table if present, then create it
///
/// # Errors
/// `DDLError` naming the table
pub async fn recreate_table(db: &Database, table: &TableDescriptor) -> Result<()> {
    let dialect = db.dialect();
    let qualified = format!("{}.{}", db.name(), table.name);
    let mut conn = db.acquire().await?;

    for sql in [drop_table_sql(dialect, table), create_table_sql(dialect, table)] {
        log::debug!("[{}] {}", qualified, sql);
        sqlx::query(&sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| EtlError::ddl(&qualified, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, GenericType, QualifiedName};

    fn table() -> TableDescriptor {
        TableDescriptor {
            name: QualifiedName::table("orders"),
            columns: vec![
                ColumnDescriptor {
                    name: "id".into(),
                    data_type: GenericType::Integer,
                    native_type: "INTEGER".into(),
                    nullable: false,
                    ordinal: 1,
                },
                ColumnDescriptor {
                    name: "created".into(),
                    data_type: GenericType::DateTime,
                    native_type: "DATETIME".into(),
                    nullable: true,
                    ordinal: 2,
                },
            ],
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql(Dialect::Sqlite, &table()),
            "CREATE TABLE \"orders\" (\n    \"id\" INTEGER NOT NULL,\n    \"created\" DATETIME,\n    PRIMARY KEY (\"id\")\n)"
        );
    }

    #[test]
    fn test_create_without_primary_key() {
        let mut t = table();
        t.primary_key.clear();
        let sql = create_table_sql(Dialect::MySql, &t);
        assert!(!sql.contains("PRIMARY KEY"));
        assert!(sql.starts_with("CREATE TABLE `orders`"));
    }

    #[test]
    fn test_drop_and_select_sql() {
        assert_eq!(
            drop_table_sql(Dialect::Postgres, &table()),
            "DROP TABLE IF EXISTS \"orders\""
        );
        assert_eq!(
            select_table_sql(Dialect::Sqlite, &table()),
            "SELECT \"id\", CAST(\"created\" AS TEXT) AS \"created\" FROM \"orders\""
        );
    }
}
