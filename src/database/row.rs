//! Conversions between driver rows and [`Value`]s

use crate::etl::{Record, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Row, TypeInfo, ValueRef};

/// Decode one column by the runtime type of its value
pub(crate) fn decode_value(row: &AnyRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index)?),
        "SMALLINT" => Value::Int(row.try_get::<i16, _>(index)?.into()),
        "INTEGER" => Value::Int(row.try_get::<i32, _>(index)?.into()),
        "BIGINT" => Value::Int(row.try_get::<i64, _>(index)?),
        "REAL" => Value::Double(row.try_get::<f32, _>(index)?.into()),
        "DOUBLE" => Value::Double(row.try_get::<f64, _>(index)?),
        "TEXT" => Value::Text(row.try_get::<String, _>(index)?),
        "BLOB" => Value::Bytes(row.try_get::<Vec<u8>, _>(index)?),
        other => {
            return Err(sqlx::Error::Decode(
                format!("column {} has undecodable type {}", index, other).into(),
            ));
        }
    };
    Ok(value)
}

/// Column names of a row, in select-list order
pub(crate) fn column_names(row: &AnyRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Decode a whole row into a record with the given column names
pub(crate) fn decode_record(row: &AnyRow, columns: &[String]) -> Result<Record, sqlx::Error> {
    let values = (0..columns.len())
        .map(|i| decode_value(row, i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Record::from_columns(columns, values))
}

/// Bind a value as the next positional parameter
pub(crate) fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: Value,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Double(d) => query.bind(d),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
    }
}

/// Run a query and decode every row
///
/// Used for metadata queries whose results are small.
pub(crate) async fn fetch_values(
    conn: &mut sqlx::AnyConnection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<Vec<Value>>, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for value in params {
        query = bind_value(query, value);
    }
    let rows = query.fetch_all(conn).await?;
    rows.iter()
        .map(|row| {
            (0..row.columns().len())
                .map(|i| decode_value(row, i))
                .collect::<Result<Vec<_>, _>>()
        })
        .collect()
}
