//! Concurrent table-to-table replication

use super::ddl::recreate_table;
use super::typemap::map_table;
use super::{CopySettings, CopyTask, ReplicationReport, TaskState};
use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_FETCH_SIZE, ExtractConfig, LoadConfig};
use crate::database::{ConnectionRegistry, Introspector};
use crate::error::{EtlError, Result};
use crate::schema::QualifiedName;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Parameters of one replication run
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationRequest {
    pub src_database: String,
    pub src_catalog: Option<String>,
    pub src_schema_pattern: Option<String>,
    pub src_table_pattern: Option<String>,
    pub dest_database: String,
    pub dest_catalog: Option<String>,
    pub dest_schema: Option<String>,
    /// Drop and re-create each destination table before copying
    pub drop_and_create: bool,
    pub copy_data: bool,
    /// Worker-pool size; 0 is treated as 1
    pub thread_count: usize,
    pub batch_size: usize,
    pub fetch_size: usize,
    /// Upper bound on the wait for copy workers
    pub timeout: Option<Duration>,
}

impl ReplicationRequest {
    pub fn new(src_database: impl Into<String>, dest_database: impl Into<String>) -> Self {
        Self {
            src_database: src_database.into(),
            src_catalog: None,
            src_schema_pattern: None,
            src_table_pattern: None,
            dest_database: dest_database.into(),
            dest_catalog: None,
            dest_schema: None,
            drop_and_create: true,
            copy_data: true,
            thread_count: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_size: DEFAULT_FETCH_SIZE,
            timeout: None,
        }
    }

    /// Build from the extract and load roles of a business type
    ///
    /// # Errors
    /// `ConfigurationError` when either role names no database
    pub fn from_configs(
        business_type: &str,
        extract: &ExtractConfig,
        load: &LoadConfig,
    ) -> Result<Self> {
        let src = extract.database.clone().ok_or_else(|| {
            EtlError::configuration(business_type, "extract.database is required for replication")
        })?;
        let dest = load.database.clone().ok_or_else(|| {
            EtlError::configuration(business_type, "load.database is required for replication")
        })?;

        Ok(Self {
            src_catalog: extract.catalog.clone(),
            src_schema_pattern: extract.schema_pattern.clone(),
            src_table_pattern: extract.table_pattern.clone(),
            dest_catalog: load.catalog.clone(),
            dest_schema: load.schema_pattern.clone(),
            drop_and_create: load.auto_create_table,
            copy_data: load.transmit_data,
            thread_count: load.thread_count,
            batch_size: load.batch_size,
            fetch_size: extract.fetch_size,
            timeout: load.timeout_secs.map(Duration::from_secs),
            ..Self::new(src, dest)
        })
    }
}

/// Copies matching tables between two registered databases
///
/// Steps:
/// 1. Resolve both databases
/// 2. Snapshot the matching source tables once
/// 3. Map each table's columns to destination types
/// 4. Optionally drop and re-create destination tables, one at a time
/// 5. Optionally copy data on a pool of `thread_count` workers
///
/// Failures in steps 3 to 5 stay with their table; the other tables carry
/// on. Only failures in steps 1 and 2 fail the run.
pub struct ReplicationEngine {
    registry: Arc<ConnectionRegistry>,
}

impl ReplicationEngine {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Run one replication
    ///
    /// # Errors
    /// `ConnectionError` when either database cannot be resolved, or the
    /// error of the source introspection
    pub async fn tables_to_tables(&self, request: &ReplicationRequest) -> Result<ReplicationReport> {
        let source = self.registry.database(&request.src_database).await?;
        let destination = self.registry.database(&request.dest_database).await?;

        let snapshot = Introspector::new(&source)
            .snapshot(
                request.src_catalog.as_deref(),
                request.src_schema_pattern.as_deref(),
                request.src_table_pattern.as_deref(),
            )
            .await?;

        log::info!(
            "Replicating {} tables from '{}' to '{}'",
            snapshot.len(),
            source.name(),
            destination.name()
        );

        let mut report = ReplicationReport::new();
        let mut runnable = Vec::new();
        let same_database = request.src_database == request.dest_database;

        for table in snapshot {
            let mut task = CopyTask::new(table);

            match map_table(
                &task.source,
                destination.dialect(),
                request.dest_catalog.as_deref(),
                request.dest_schema.as_deref(),
            ) {
                Ok(target) => task.destination = Some(target),
                Err(e) => {
                    log::warn!("Skipping {}: {}", task.name(), e);
                    task.state = TaskState::DdlFailed(e);
                    report.record(task);
                    continue;
                }
            }

            if same_database
                && task
                    .destination
                    .as_ref()
                    .is_some_and(|target| resolves_to(&target.name, &task.source.name))
            {
                let e = EtlError::ddl(
                    format!("{}.{}", destination.name(), task.name()),
                    "destination resolves to the source table; set a different destination schema",
                );
                log::error!("Skipping {}: {}", task.name(), e);
                task.state = TaskState::DdlFailed(e);
                report.record(task);
                continue;
            }

            if request.drop_and_create {
                let Some(target) = task.destination.as_ref() else {
                    continue;
                };
                match recreate_table(&destination, target).await {
                    Ok(()) => {
                        log::info!("Created {}.{}", destination.name(), target.name);
                        task.state = TaskState::DdlApplied;
                    }
                    Err(e) => {
                        log::warn!("Skipping {}: {}", task.name(), e);
                        task.state = TaskState::DdlFailed(e);
                        report.record(task);
                        continue;
                    }
                }
            }

            if request.copy_data {
                runnable.push(task);
            } else {
                report.record(task);
            }
        }

        if runnable.is_empty() {
            log::info!("Replication finished: {}", report.status());
            return Ok(report);
        }

        let shared_pool = same_database.then(|| source.max_connections());
        let workers = match copy_workers(request.thread_count, shared_pool) {
            Some(workers) => workers,
            None => {
                for mut task in runnable {
                    task.state = TaskState::CopyFailed(EtlError::connection(
                        source.name(),
                        "copying within one database needs max_connections of at least 2",
                    ));
                    report.record(task);
                }
                return Ok(report);
            }
        };
        if workers < request.thread_count {
            log::warn!(
                "Limiting copy workers to {}: each copy holds two connections of '{}'",
                workers,
                source.name()
            );
        }

        let semaphore = Arc::new(Semaphore::new(workers));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let settings = CopySettings {
            batch_size: request.batch_size.max(1),
            fetch_size: request.fetch_size.max(1),
        };
        log::info!("Copying {} tables with {} workers", runnable.len(), workers);

        let mut handles: Vec<(CopyTask, JoinHandle<CopyTask>)> = Vec::new();
        for task in runnable {
            let outline = CopyTask {
                source: task.source.clone(),
                destination: task.destination.clone(),
                state: TaskState::Pending,
            };
            let semaphore = semaphore.clone();
            let active = active.clone();
            let peak = peak.clone();
            let source = source.clone();
            let destination = destination.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let running = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(running, Ordering::SeqCst);
                log::debug!("Copying {} ({} workers busy)", task.name(), running);
                let task = task.copy(source, destination, settings).await;
                active.fetch_sub(1, Ordering::SeqCst);
                task
            });
            handles.push((outline, handle));
        }

        let deadline = request.timeout.map(|t| tokio::time::Instant::now() + t);
        let mut timed_out = false;

        for (mut outline, mut handle) in handles {
            let joined = match deadline {
                Some(deadline) if !timed_out => {
                    match tokio::time::timeout_at(deadline, &mut handle).await {
                        Ok(joined) => Some(joined),
                        Err(_) => {
                            log::warn!("Replication wait limit reached; unfinished tables are left running");
                            timed_out = true;
                            None
                        }
                    }
                }
                // Past the deadline only already-finished tasks are collected
                Some(_) if handle.is_finished() => Some(handle.await),
                Some(_) => None,
                None => Some(handle.await),
            };

            let name = outline.name().clone();
            match joined {
                Some(Ok(task)) => {
                    match &task.state {
                        TaskState::Copied { rows } => log::info!("{}: copied {} rows", name, rows),
                        other => log::warn!("{}: {}", name, other),
                    }
                    report.record(task);
                }
                Some(Err(e)) => {
                    log::error!("{}: copy worker failed: {}", name, e);
                    outline.state = TaskState::CopyFailed(EtlError::load(name.to_string(), e));
                    report.record(outline);
                }
                None => {
                    // Dropping the handle detaches the task
                    outline.state = TaskState::Incomplete;
                    report.record(outline);
                }
            }
        }

        report.set_peak_workers(peak.load(Ordering::SeqCst));
        log::info!(
            "Replication finished: {} ({} rows copied)",
            report.status(),
            report.rows_copied()
        );
        Ok(report)
    }
}

/// Whether a destination name addresses the source table within one database
///
/// A destination without a schema lands in the connection's current schema,
/// which is where an unqualified source lives as well.
fn resolves_to(destination: &QualifiedName, source: &QualifiedName) -> bool {
    if destination.table != source.table {
        return false;
    }
    match (&destination.schema, &source.schema) {
        (None, _) | (_, None) => true,
        (Some(dest), Some(src)) => dest == src,
    }
}

/// Size of the copy pool
///
/// Every copy holds a source and a destination connection at once, so a
/// pool shared by both sides fits at most half its size in workers. `None`
/// when a shared pool cannot serve even one copy.
fn copy_workers(thread_count: usize, shared_pool: Option<u32>) -> Option<usize> {
    let requested = thread_count.max(1);
    match shared_pool {
        None => Some(requested),
        Some(max_connections) => {
            let fits = usize::try_from(max_connections / 2).unwrap_or(usize::MAX);
            (fits > 0).then(|| requested.min(fits))
        }
    }
}
