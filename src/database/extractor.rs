//! Extractor reading the result of one SQL query

use super::{Database, RecordCursor};
use crate::config::ExtractConfig;
use crate::error::{EtlError, Result};
use crate::etl::{BoundSql, Extractor, Record, Value, bind_named};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Streams the rows of a query through a [`RecordCursor`]
///
/// `open` waits for the first row (or the end of the result) so a query that
/// fails to execute fails the open rather than the first read.
pub struct DatabaseExtractor {
    db: Database,
    bound: BoundSql,
    fetch_size: usize,
    context: String,
    cursor: Option<RecordCursor>,
    peeked: Option<Record>,
}

impl DatabaseExtractor {
    pub fn new(db: Database, bound: BoundSql, fetch_size: usize) -> Self {
        let context = format!("reading {}", db.name());
        Self {
            db,
            bound,
            fetch_size,
            context,
            cursor: None,
            peeked: None,
        }
    }

    /// Label used in log lines and error contexts
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Build from an extract configuration
    ///
    /// `parameters` override the configured defaults by name.
    ///
    /// # Errors
    /// `ConfigurationError` without `sql`, `ExtractionError` for a
    /// placeholder with no value
    pub fn from_config(
        db: Database,
        business_type: &str,
        config: &ExtractConfig,
        parameters: &BTreeMap<String, Value>,
    ) -> Result<Self> {
        let sql = config.sql.as_deref().ok_or_else(|| {
            EtlError::configuration(business_type, "extract.sql is required for a database source")
        })?;

        let mut merged = config.parameters.clone();
        merged.extend(parameters.iter().map(|(k, v)| (k.clone(), v.clone())));

        let dialect = db.dialect();
        let bound = bind_named(sql, &merged, |n| dialect.placeholder(n)).map_err(|name| {
            EtlError::extraction(
                format!("business type '{}'", business_type),
                format!("no value for placeholder :{}", name),
            )
        })?;

        Ok(Self::new(db, bound, config.fetch_size)
            .with_context(format!("{} from {}", business_type, config.database.as_deref().unwrap_or("?"))))
    }

    pub fn bound_sql(&self) -> &BoundSql {
        &self.bound
    }
}

#[async_trait]
impl Extractor for DatabaseExtractor {
    async fn open(&mut self) -> Result<()> {
        let mut cursor = RecordCursor::spawn(
            self.db.clone(),
            self.bound.clone(),
            self.fetch_size,
            self.context.clone(),
        );
        match cursor.next().await {
            Ok(first) => {
                self.peeked = first;
                self.cursor = Some(cursor);
                Ok(())
            }
            Err(e) => {
                cursor.close();
                Err(e)
            }
        }
    }

    async fn next_record(&mut self) -> Result<Option<Record>> {
        if let Some(record) = self.peeked.take() {
            return Ok(Some(record));
        }
        match self.cursor.as_mut() {
            Some(cursor) => cursor.next().await,
            None => Err(EtlError::extraction(
                &self.context,
                "extractor read before open",
            )),
        }
    }

    async fn close(&mut self) {
        self.peeked = None;
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
    }

    fn describe(&self) -> String {
        self.context.clone()
    }
}
