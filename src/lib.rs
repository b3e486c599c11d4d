//! ETL Relay
//!
//! Business-type driven record pipelines and concurrent table replication
//! between SQL databases

pub mod adapters;
pub mod cli;
pub mod config;
pub mod database;
mod error;
pub mod etl;
pub mod replication;
pub mod runner;
pub mod schema;
pub mod storage;
pub mod transform;

// Re-exports for convenience
pub use config::ConfigResolver;
pub use database::{ConnectionRegistry, Database, Dialect};
pub use error::{BoxError, EtlError, Result};
pub use etl::{Extractor, IdentityTransformer, Loader, Pipeline, Record, Transformer, Value};
pub use replication::{ReplicationEngine, ReplicationReport, ReplicationRequest, TaskState};
pub use runner::{EtlRunner, RunOptions};
pub use schema::{GenericType, QualifiedName, TableDescriptor};
pub use storage::{NdjsonExtractor, NdjsonLoader};
