//! Per-table unit of replication work

use super::ddl::select_table_sql;
use crate::database::{BatchWriter, Database, DatabaseExtractor};
use crate::error::EtlError;
use crate::etl::{BoundSql, IdentityTransformer, drive};
use crate::schema::{QualifiedName, TableDescriptor};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of one table
///
/// `Pending → {DdlApplied | DdlFailed} → {Copied | CopyFailed}`, or
/// `Incomplete` when the run stopped waiting for it.
#[derive(Debug)]
pub enum TaskState {
    Pending,
    DdlApplied,
    DdlFailed(EtlError),
    Copied { rows: u64 },
    CopyFailed(EtlError),
    Incomplete,
}

impl TaskState {
    /// Whether the table ended in a state the run asked for
    ///
    /// A table is only left `Pending` by a run that asked for neither DDL
    /// nor data.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            TaskState::Pending | TaskState::DdlApplied | TaskState::Copied { .. }
        )
    }

    pub fn error(&self) -> Option<&EtlError> {
        match self {
            TaskState::DdlFailed(e) | TaskState::CopyFailed(e) => Some(e),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::DdlApplied => "ddl-applied",
            TaskState::DdlFailed(_) => "ddl-failed",
            TaskState::Copied { .. } => "copied",
            TaskState::CopyFailed(_) => "copy-failed",
            TaskState::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Copied { rows } => write!(f, "copied {} rows", rows),
            TaskState::DdlFailed(e) | TaskState::CopyFailed(e) => {
                write!(f, "{} ({}: {})", self.label(), e.kind(), e)
            }
            other => f.write_str(other.label()),
        }
    }
}

/// Copy settings shared by every task of a run
#[derive(Debug, Clone, Copy)]
pub struct CopySettings {
    pub batch_size: usize,
    pub fetch_size: usize,
}

/// One source table, its computed destination and where it got to
#[derive(Debug)]
pub struct CopyTask {
    pub source: TableDescriptor,
    pub destination: Option<TableDescriptor>,
    pub state: TaskState,
}

impl CopyTask {
    pub fn new(source: TableDescriptor) -> Self {
        Self {
            source,
            destination: None,
            state: TaskState::Pending,
        }
    }

    pub fn name(&self) -> &QualifiedName {
        &self.source.name
    }

    /// Stream every source row into the destination table
    ///
    /// Holds one source and one destination connection for its lifetime.
    /// The first row-level error ends the task as `CopyFailed`; batches
    /// committed before it stay in the destination.
    pub async fn copy(mut self, source: Database, destination: Database, settings: CopySettings) -> Self {
        let Some(target) = self.destination.clone() else {
            self.state = TaskState::CopyFailed(EtlError::load(
                self.source.name.to_string(),
                "no destination descriptor",
            ));
            return self;
        };

        let bound = BoundSql {
            sql: select_table_sql(source.dialect(), &self.source),
            values: Vec::new(),
        };
        let context = format!("copying {}.{}", source.name(), self.source.name);
        let mut extractor =
            DatabaseExtractor::new(source, bound, settings.fetch_size).with_context(context);
        let mut writer = BatchWriter::new(destination, Arc::new(target), settings.batch_size);

        self.state = match drive(&mut extractor, &IdentityTransformer, &mut writer).await {
            Ok(rows) => TaskState::Copied { rows },
            Err(e) => {
                log::warn!(
                    "Copy of {} failed after {} committed rows: {}",
                    self.source.name,
                    writer.written(),
                    e
                );
                TaskState::CopyFailed(e)
            }
        };
        self
    }
}
