//! Schema and data replication between databases
//!
//! [`ReplicationEngine::tables_to_tables`] snapshots the source tables that
//! match a set of patterns, maps their column types to the destination
//! dialect, optionally re-creates each destination table and copies the rows
//! on a bounded worker pool. Each table is an independent unit of work and
//! its outcome is reported separately in a [`ReplicationReport`].

mod ddl;
mod engine;
mod report;
mod task;
mod typemap;

pub use ddl::{create_table_sql, drop_table_sql, recreate_table, select_table_sql};
pub use engine::{ReplicationEngine, ReplicationRequest};
pub use report::{ReplicationReport, RunStatus};
pub use task::{CopySettings, CopyTask, TaskState};
pub use typemap::map_table;
