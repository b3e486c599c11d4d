//! Loader writing one record stream into one table

use super::{BatchWriter, Database, Introspector};
use crate::config::LoadConfig;
use crate::error::{EtlError, Result};
use crate::etl::{Extractor, Loader, Transformer, drive};
use crate::schema::QualifiedName;
use async_trait::async_trait;
use std::sync::Arc;

/// Database destination for single-stream pipelines
///
/// The destination table must exist; its metadata drives the write-side
/// conversions. Rows are committed every `batch_size` records.
pub struct DatabaseLoader {
    db: Database,
    table: QualifiedName,
    batch_size: usize,
}

impl DatabaseLoader {
    pub fn new(db: Database, table: QualifiedName, batch_size: usize) -> Self {
        Self {
            db,
            table,
            batch_size,
        }
    }

    /// Build from a load configuration
    ///
    /// # Errors
    /// `ConfigurationError` without `table`
    pub fn from_config(db: Database, business_type: &str, config: &LoadConfig) -> Result<Self> {
        let table = config.table.as_deref().ok_or_else(|| {
            EtlError::configuration(business_type, "load.table is required for a database sink")
        })?;
        let name = QualifiedName::new(
            config.catalog.clone(),
            config.schema_pattern.clone(),
            table,
        );
        Ok(Self::new(db, name, config.batch_size))
    }

    pub fn table(&self) -> &QualifiedName {
        &self.table
    }
}

#[async_trait]
impl Loader for DatabaseLoader {
    async fn load(
        &mut self,
        extractor: &mut dyn Extractor,
        transformer: &dyn Transformer,
    ) -> Result<u64> {
        let described = match Introspector::new(&self.db).describe(&self.table).await {
            Ok(Some(table)) => table,
            Ok(None) => {
                extractor.close().await;
                return Err(EtlError::load(
                    format!("writing {}.{}", self.db.name(), self.table),
                    "destination table does not exist",
                ));
            }
            Err(e) => {
                extractor.close().await;
                return Err(e);
            }
        };

        let mut writer = BatchWriter::new(self.db.clone(), Arc::new(described), self.batch_size);
        drive(extractor, transformer, &mut writer).await
    }
}
