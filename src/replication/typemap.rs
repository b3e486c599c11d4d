//! Destination table descriptors computed from source metadata

use crate::database::Dialect;
use crate::error::{EtlError, Result};
use crate::schema::{ColumnDescriptor, TableDescriptor};

/// Compute the destination descriptor for a source table
///
/// Table and column names, column order, nullability and primary key carry
/// over unchanged; the catalog and schema are replaced and every generic
/// type is mapped to the destination dialect's native type.
///
/// # Errors
/// `UnsupportedTypeError` naming the first column without a mapping
pub fn map_table(
    source: &TableDescriptor,
    dialect: Dialect,
    catalog: Option<&str>,
    schema: Option<&str>,
) -> Result<TableDescriptor> {
    let name = source
        .name
        .relocate(catalog.map(str::to_string), schema.map(str::to_string));

    let columns = source
        .columns
        .iter()
        .map(|column| {
            let native_type = dialect.native_type(&column.data_type).ok_or_else(|| {
                EtlError::UnsupportedType {
                    table: source.name.to_string(),
                    column: column.name.clone(),
                    type_name: column.native_type.clone(),
                }
            })?;
            Ok(ColumnDescriptor {
                native_type,
                ..column.clone()
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(TableDescriptor {
        name,
        columns,
        primary_key: source.primary_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GenericType, QualifiedName};

    fn orders(extra: Option<(&str, GenericType)>) -> TableDescriptor {
        let mut columns = vec![
            ColumnDescriptor {
                name: "id".into(),
                data_type: GenericType::Integer,
                native_type: "INTEGER".into(),
                nullable: false,
                ordinal: 1,
            },
            ColumnDescriptor {
                name: "amount".into(),
                data_type: GenericType::Decimal {
                    precision: Some(10),
                    scale: 2,
                },
                native_type: "DECIMAL(10,2)".into(),
                nullable: true,
                ordinal: 2,
            },
        ];
        if let Some((name, data_type)) = extra {
            columns.push(ColumnDescriptor {
                name: name.into(),
                native_type: data_type.to_string(),
                data_type,
                nullable: true,
                ordinal: 3,
            });
        }
        TableDescriptor {
            name: QualifiedName::new(None, Some("sales".into()), "orders"),
            columns,
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn test_map_to_postgres() {
        let dest = map_table(&orders(None), Dialect::Postgres, None, Some("mirror")).unwrap();
        assert_eq!(dest.name.to_string(), "mirror.orders");
        assert_eq!(dest.columns[0].native_type, "INTEGER");
        assert_eq!(dest.columns[1].native_type, "NUMERIC(10,2)");
        assert!(!dest.columns[0].nullable);
        assert_eq!(dest.primary_key, vec!["id"]);
    }

    #[test]
    fn test_unsupported_column_names_table_and_column() {
        let source = orders(Some(("outline", GenericType::Other("GEOMETRY".into()))));
        let err = map_table(&source, Dialect::Sqlite, None, None).unwrap_err();
        match err {
            EtlError::UnsupportedType {
                table,
                column,
                type_name,
            } => {
                assert_eq!(table, "sales.orders");
                assert_eq!(column, "outline");
                assert_eq!(type_name, "GEOMETRY");
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
