//! Batched multi-row INSERT sink

use super::Database;
use super::row::bind_value;
use crate::error::{EtlError, Result};
use crate::etl::{Record, RecordSink, Value};
use crate::schema::{ColumnDescriptor, GenericType, TableDescriptor};
use async_trait::async_trait;
use sqlx::Any;
use sqlx::Connection;
use sqlx::pool::PoolConnection;
use std::sync::Arc;

/// Writes records into one table in committed batches
///
/// Each batch of `batch_size` rows is split into as few multi-row INSERT
/// statements as the dialect's bind limit allows and committed in its own
/// transaction. A failed batch is rolled back; earlier batches stay
/// committed. The column order of the first record fixes the INSERT column
/// list for the rest of the stream.
pub struct BatchWriter {
    db: Database,
    table: Arc<TableDescriptor>,
    batch_size: usize,
    conn: Option<PoolConnection<Any>>,
    columns: Vec<String>,
    pending: Vec<Vec<Value>>,
    written: u64,
    batches: u64,
}

impl BatchWriter {
    /// `table` describes the destination; an empty column list disables
    /// column checks and write-side casts
    pub fn new(db: Database, table: Arc<TableDescriptor>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            db,
            table,
            batch_size,
            conn: None,
            columns: Vec::new(),
            pending: Vec::with_capacity(batch_size),
            written: 0,
            batches: 0,
        }
    }

    fn context(&self) -> String {
        format!("writing {}.{}", self.db.name(), self.table.name)
    }

    /// Committed rows so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn fix_columns(&mut self, record: &Record) -> Result<()> {
        let columns: Vec<String> = record.columns().map(str::to_string).collect();
        if !self.table.columns.is_empty() {
            if let Some(unknown) = columns.iter().find(|c| self.table.column(c).is_none()) {
                return Err(EtlError::load(
                    self.context(),
                    format!("column '{}' does not exist in the destination", unknown),
                ));
            }
        }
        log::debug!("[{}] columns: {}", self.context(), columns.join(", "));
        self.columns = columns;
        Ok(())
    }

    fn align(&self, record: Record) -> Result<Vec<Value>> {
        if record.columns().eq(self.columns.iter().map(String::as_str)) {
            return Ok(record.into_values());
        }
        if let Some(extra) = record.columns().find(|c| !self.columns.iter().any(|k| k == c)) {
            return Err(EtlError::load(
                self.context(),
                format!("record has column '{}' not present in the first record", extra),
            ));
        }
        Ok(self
            .columns
            .iter()
            .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
            .collect())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let context = self.context();
        let dialect = self.db.dialect();

        if self.conn.is_none() {
            self.conn = Some(self.db.acquire().await?);
        }
        let Some(conn) = self.conn.as_mut() else {
            return Err(EtlError::load(context, "no destination connection"));
        };

        let described: Vec<Option<&ColumnDescriptor>> =
            self.columns.iter().map(|c| self.table.column(c)).collect();
        let rows_per_statement = (dialect.max_bind_params() / self.columns.len().max(1)).max(1);
        let rows = std::mem::take(&mut self.pending);
        let count = rows.len();

        let mut tx = conn
            .begin()
            .await
            .map_err(|e| EtlError::load(&context, e))?;

        let mut rows = rows.into_iter().peekable();
        while rows.peek().is_some() {
            let chunk: Vec<Vec<Value>> = rows.by_ref().take(rows_per_statement).collect();
            let sql = dialect.insert_sql(&self.table.name, &self.columns, &described, chunk.len());
            let mut query = sqlx::query(&sql);
            for row in chunk {
                for (value, column) in row.into_iter().zip(&described) {
                    query = bind_value(query, coerce(value, *column));
                }
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| EtlError::load(&context, e))?;
        }

        tx.commit().await.map_err(|e| EtlError::load(&context, e))?;

        self.written += count as u64;
        self.batches += 1;
        log::debug!(
            "[{}] committed batch {} ({} rows, {} total)",
            context,
            self.batches,
            count,
            self.written
        );
        Ok(())
    }
}

/// Adjust a value to what the destination column accepts
fn coerce(value: Value, column: Option<&ColumnDescriptor>) -> Value {
    match (value, column.map(|c| &c.data_type)) {
        (Value::Int(i), Some(GenericType::Boolean)) => Value::Bool(i != 0),
        (Value::Bool(b), Some(GenericType::Integer | GenericType::BigInt)) => Value::Int(i64::from(b)),
        (value, _) => value,
    }
}

#[async_trait]
impl RecordSink for BatchWriter {
    async fn write(&mut self, record: Record) -> Result<()> {
        if self.columns.is_empty() {
            self.fix_columns(&record)?;
        }
        let row = self.align(record)?;
        self.pending.push(row);
        if self.pending.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<u64> {
        self.flush().await?;
        self.conn = None;
        Ok(self.written)
    }

    async fn abort(&mut self) {
        if !self.pending.is_empty() {
            log::debug!(
                "[{}] discarding {} unflushed rows",
                self.context(),
                self.pending.len()
            );
        }
        self.pending.clear();
        self.conn = None;
    }
}
