//! Execution pool: runs query tasks concurrently under a worker budget.
//!
//! Every task gets its own connection (owned by the backend call) and its own
//! cancellation token. Failures become failed outcomes and never touch
//! sibling tasks. When a task's deadline passes, its token is cancelled so the
//! backend can stop the remote statement and drop the connection, and the
//! task is recorded as abandoned instead of producing an outcome.

mod postgres;
mod tls;
mod types;

#[cfg(test)]
pub(crate) mod scripted;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::PoolConfig;
use crate::core::dispatch::QueryTask;
use crate::core::registry::Endpoint;

pub use postgres::PostgresBackend;
pub use types::{
    AbandonReason, AbandonedTask, FailureKind, PoolRun, QueryOutcome, RowSet, TaskError,
};

/// Runs one SQL statement on one endpoint over a connection it opens and
/// closes itself. Implementations must watch `cancel` and return
/// [`TaskError::Cancelled`] promptly once it fires.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn execute(
        &self,
        endpoint: &Endpoint,
        sql: &str,
        cancel: CancellationToken,
    ) -> Result<RowSet, TaskError>;
}

pub struct ExecutionPool {
    backend: Arc<dyn QueryBackend>,
    max_workers: usize,
    task_timeout: Duration,
    cancel_grace: Duration,
}

impl ExecutionPool {
    pub fn new(backend: Arc<dyn QueryBackend>, config: &PoolConfig) -> Self {
        Self {
            backend,
            max_workers: config.max_workers.max(1),
            task_timeout: config.task_timeout(),
            cancel_grace: config.cancel_grace(),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    pub async fn run(&self, tasks: Vec<QueryTask>) -> PoolRun {
        self.run_until(tasks, CancellationToken::new()).await
    }

    /// Run `tasks`, giving up on everything still pending once `shutdown` fires.
    pub async fn run_until(&self, tasks: Vec<QueryTask>, shutdown: CancellationToken) -> PoolRun {
        let total = tasks.len();
        info!(
            "Running {} tasks with {} workers, {}s deadline per task",
            total,
            self.max_workers,
            self.task_timeout.as_secs_f64()
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut set = JoinSet::new();
        let mut in_flight: HashMap<tokio::task::Id, QueryTask> = HashMap::new();
        let mut run = PoolRun {
            outcomes: Vec::with_capacity(total),
            abandoned: Vec::new(),
        };

        for task in tasks {
            // Submission only waits here, when every worker is busy.
            let permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                run.abandoned
                    .push(AbandonedTask::new(&task, AbandonReason::Shutdown));
                continue;
            };

            let backend = Arc::clone(&self.backend);
            let cancel = shutdown.child_token();
            let timeout = self.task_timeout;
            let grace = self.cancel_grace;
            let owned = task.clone();
            let handle = set.spawn(async move {
                let _permit = permit;
                run_task(backend.as_ref(), &owned, cancel, timeout, grace).await
            });
            in_flight.insert(handle.id(), task);
        }

        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, Ok(outcome))) => {
                    in_flight.remove(&id);
                    run.outcomes.push(outcome);
                }
                Ok((id, Err(abandoned))) => {
                    in_flight.remove(&id);
                    warn!(
                        "Task {} ({} / {}) abandoned: {:?}, no outcome recorded",
                        abandoned.task_id, abandoned.endpoint, abandoned.table, abandoned.reason
                    );
                    run.abandoned.push(abandoned);
                }
                Err(join_err) => {
                    let Some(task) = in_flight.remove(&join_err.id()) else {
                        continue;
                    };
                    warn!("Worker for task {} crashed: {}", task.task_id, join_err);
                    run.outcomes.push(QueryOutcome::failure(
                        &task,
                        FailureKind::WorkerCrashed,
                        format!("worker crashed: {}", join_err),
                        Duration::ZERO,
                    ));
                }
            }
        }

        let failed = run.outcomes.iter().filter(|o| !o.success).count();
        info!(
            "Pool finished: {} outcomes ({} failed), {} abandoned, {} dispatched",
            run.outcomes.len(),
            failed,
            run.abandoned.len(),
            total
        );
        run
    }
}

async fn run_task(
    backend: &dyn QueryBackend,
    task: &QueryTask,
    cancel: CancellationToken,
    timeout: Duration,
    grace: Duration,
) -> Result<QueryOutcome, AbandonedTask> {
    let started = Instant::now();
    debug!(
        task_id = %task.task_id,
        endpoint = %task.endpoint.name,
        table = %task.table,
        "executing: {}",
        task.sql
    );

    let exec = backend.execute(&task.endpoint, &task.sql, cancel.clone());
    tokio::pin!(exec);
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    tokio::select! {
        result = &mut exec => {
            let elapsed = started.elapsed();
            match result {
                Ok(rows) => {
                    debug!(task_id = %task.task_id, rows = rows.len(), "succeeded in {:?}", elapsed);
                    Ok(QueryOutcome::succeeded(task, rows, elapsed))
                }
                // Only the run-level shutdown cancels a task before its deadline.
                Err(TaskError::Cancelled) => Err(AbandonedTask::new(task, AbandonReason::Shutdown)),
                Err(err) => {
                    debug!(task_id = %task.task_id, "failed in {:?}: {}", elapsed, err);
                    Ok(QueryOutcome::failed(task, &err, elapsed))
                }
            }
        }
        _ = &mut deadline => {
            cancel.cancel();
            if tokio::time::timeout(grace, &mut exec).await.is_err() {
                warn!(
                    "Task {} did not wind down within {:?} of cancellation",
                    task.task_id, grace
                );
            }
            Err(AbandonedTask::new(task, AbandonReason::DeadlineElapsed))
        }
    }
}
