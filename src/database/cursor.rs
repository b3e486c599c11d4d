//! Forward-only query cursor backed by a producer task
//!
//! The producer holds its own pooled connection and streams decoded rows into
//! a bounded channel, so at most `capacity` records are buffered ahead of the
//! consumer regardless of the result size.

use super::Database;
use super::row::{bind_value, column_names, decode_record};
use crate::error::{EtlError, Result};
use crate::etl::{BoundSql, Record};
use futures::TryStreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct RecordCursor {
    rx: mpsc::Receiver<Result<Record>>,
    producer: Option<JoinHandle<()>>,
    context: String,
}

impl RecordCursor {
    /// Start streaming the results of `bound` from `db`
    pub fn spawn(db: Database, bound: BoundSql, capacity: usize, context: String) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task_context = context.clone();

        let producer = tokio::spawn(async move {
            let mut conn = match db.acquire().await {
                Ok(conn) => conn,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            };

            log::debug!("[{}] {}", task_context, bound.sql);
            let mut query = sqlx::query(&bound.sql);
            for value in bound.values.iter().cloned() {
                query = bind_value(query, value);
            }

            let mut rows = query.fetch(&mut *conn);
            let mut columns: Option<Arc<Vec<String>>> = None;
            loop {
                let item = match rows.try_next().await {
                    Ok(Some(row)) => {
                        let names = columns.get_or_insert_with(|| Arc::new(column_names(&row)));
                        decode_record(&row, names)
                            .map_err(|e| EtlError::extraction(&task_context, e))
                    }
                    Ok(None) => break,
                    Err(e) => Err(EtlError::extraction(&task_context, e)),
                };
                let failed = item.is_err();
                // A closed channel means the consumer went away
                if tx.send(item).await.is_err() || failed {
                    break;
                }
            }
        });

        Self {
            rx,
            producer: Some(producer),
            context,
        }
    }

    /// Next record, `None` after the last one
    pub async fn next(&mut self) -> Result<Option<Record>> {
        match self.rx.recv().await {
            Some(item) => item.map(Some),
            None => {
                // The channel also closes when the producer panics
                match self.producer.take() {
                    Some(handle) => match handle.await {
                        Ok(()) => Ok(None),
                        Err(e) => Err(EtlError::extraction(&self.context, e)),
                    },
                    None => Ok(None),
                }
            }
        }
    }

    /// Stop the producer and release its connection
    pub fn close(&mut self) {
        self.rx.close();
        if let Some(handle) = self.producer.take() {
            handle.abort();
        }
    }
}

impl Drop for RecordCursor {
    fn drop(&mut self) {
        self.close();
    }
}
