//! Aggregate outcome of a replication run

use super::{CopyTask, TaskState};
use crate::schema::QualifiedName;
use std::collections::BTreeMap;
use std::fmt;

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// No table matched the patterns
    Empty,
    AllSucceeded,
    Partial,
    AllFailed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Empty => write!(f, "no tables matched"),
            RunStatus::AllSucceeded => write!(f, "all tables succeeded"),
            RunStatus::Partial => write!(f, "partially succeeded"),
            RunStatus::AllFailed => write!(f, "all tables failed"),
        }
    }
}

/// Outcome per source table, keyed by qualified name
#[derive(Debug, Default)]
pub struct ReplicationReport {
    tasks: BTreeMap<QualifiedName, CopyTask>,
    peak_workers: usize,
}

impl ReplicationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task: CopyTask) {
        self.tasks.insert(task.name().clone(), task);
    }

    /// Most copy workers seen running at the same time
    pub fn peak_workers(&self) -> usize {
        self.peak_workers
    }

    pub(crate) fn set_peak_workers(&mut self, peak: usize) {
        self.peak_workers = peak;
    }

    pub fn status(&self) -> RunStatus {
        let succeeded = self.succeeded();
        match (self.tasks.len(), succeeded) {
            (0, _) => RunStatus::Empty,
            (total, ok) if ok == total => RunStatus::AllSucceeded,
            (_, 0) => RunStatus::AllFailed,
            _ => RunStatus::Partial,
        }
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&CopyTask> {
        self.tasks.get(name)
    }

    /// Look a task up by table name alone
    pub fn table(&self, table: &str) -> Option<&CopyTask> {
        self.tasks.values().find(|t| t.name().table == table)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &CopyTask> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.tasks.values().filter(|t| t.state.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.tasks.len() - self.succeeded()
    }

    /// Rows copied across all tables
    pub fn rows_copied(&self) -> u64 {
        self.tasks
            .values()
            .map(|t| match t.state {
                TaskState::Copied { rows } => rows,
                _ => 0,
            })
            .sum()
    }
}
