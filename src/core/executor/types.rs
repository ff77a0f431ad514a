use std::time::Duration;

use serde::Serialize;

use crate::core::dispatch::QueryTask;

/// Tabular result of one query: column names plus rows of nullable text cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RowSet {
    /// Rows shorter than the header are padded with nulls, longer ones truncated.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cells of column `index`, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).and_then(|cell| cell.as_deref()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connection,
    QueryExecution,
    Cancelled,
    WorkerCrashed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("connection to {endpoint} failed: {message}")]
    Connection { endpoint: String, message: String },

    #[error("{0}")]
    QueryExecution(String),

    #[error("cancelled before completion")]
    Cancelled,
}

impl TaskError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Connection { .. } => FailureKind::Connection,
            TaskError::QueryExecution(_) => FailureKind::QueryExecution,
            TaskError::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// What happened to one task. Field order matters: the derived ordering is
/// what the aggregator sorts groups by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct QueryOutcome {
    pub task_id: String,
    pub endpoint: String,
    pub table: String,
    pub sql: String,
    pub success: bool,
    pub rows: Option<RowSet>,
    pub row_count: usize,
    pub elapsed: Duration,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
}

impl QueryOutcome {
    pub fn succeeded(task: &QueryTask, rows: RowSet, elapsed: Duration) -> Self {
        Self {
            task_id: task.task_id.clone(),
            endpoint: task.endpoint.name.clone(),
            table: task.table.clone(),
            sql: task.sql.clone(),
            success: true,
            row_count: rows.len(),
            rows: Some(rows),
            elapsed,
            error: None,
            failure: None,
        }
    }

    pub fn failed(task: &QueryTask, error: &TaskError, elapsed: Duration) -> Self {
        Self::failure(task, error.kind(), error.to_string(), elapsed)
    }

    pub fn failure(task: &QueryTask, kind: FailureKind, message: String, elapsed: Duration) -> Self {
        Self {
            task_id: task.task_id.clone(),
            endpoint: task.endpoint.name.clone(),
            table: task.table.clone(),
            sql: task.sql.clone(),
            success: false,
            rows: None,
            row_count: 0,
            elapsed,
            error: Some(message),
            failure: Some(kind),
        }
    }

    /// Successful and returned at least one row.
    pub fn has_data(&self) -> bool {
        self.success && self.row_count > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    DeadlineElapsed,
    Shutdown,
}

/// A task the collector stopped waiting for. It has no outcome.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AbandonedTask {
    pub task_id: String,
    pub endpoint: String,
    pub table: String,
    pub reason: AbandonReason,
}

impl AbandonedTask {
    pub fn new(task: &QueryTask, reason: AbandonReason) -> Self {
        Self {
            task_id: task.task_id.clone(),
            endpoint: task.endpoint.name.clone(),
            table: task.table.clone(),
            reason,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolRun {
    /// In completion order.
    pub outcomes: Vec<QueryOutcome>,
    pub abandoned: Vec<AbandonedTask>,
}
