//! One plan execution end to end: expand, run, aggregate, publish.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::aggregate::{AggregatedReport, ReportSlot, aggregate};
use crate::core::config::FleetConfig;
use crate::core::dispatch::{self, Expansion, UnmatchedTarget};
use crate::core::executor::{AbandonedTask, ExecutionPool, PostgresBackend};
use crate::core::plan::{Plan, RejectedSpec};
use crate::core::registry::{EndpointRegistry, SettingsSource};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub report: Arc<AggregatedReport>,
    pub dispatched: usize,
    pub rejected: Vec<RejectedSpec>,
    pub unmatched: Vec<UnmatchedTarget>,
    pub abandoned: Vec<AbandonedTask>,
    pub elapsed: Duration,
}

pub struct FleetQuery {
    registry: Arc<EndpointRegistry>,
    pool: ExecutionPool,
    slot: ReportSlot,
}

impl FleetQuery {
    pub fn new(registry: Arc<EndpointRegistry>, pool: ExecutionPool) -> Self {
        Self {
            registry,
            pool,
            slot: ReportSlot::new(),
        }
    }

    /// Resolve endpoints from `settings` and run tasks against PostgreSQL.
    pub fn from_config(config: &FleetConfig, settings: &dyn SettingsSource) -> Result<Self> {
        let registry = EndpointRegistry::resolve(&config.endpoints, &config.defaults, settings)
            .context("Failed to resolve endpoints")?;
        let backend = Arc::new(
            PostgresBackend::new(config.connection.clone())
                .context("Failed to set up TLS for PostgreSQL connections")?,
        );
        let pool = ExecutionPool::new(backend, &config.pool);
        Ok(Self::new(Arc::new(registry), pool))
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &ExecutionPool {
        &self.pool
    }

    pub fn latest_report(&self) -> Option<Arc<AggregatedReport>> {
        self.slot.latest()
    }

    /// Expansion only, nothing is executed.
    pub fn preview(&self, plan: &Plan) -> Expansion {
        dispatch::expand_detailed(&plan.specs, &self.registry)
    }

    pub async fn execute(&self, plan: &Plan) -> RunSummary {
        self.execute_until(plan, CancellationToken::new()).await
    }

    pub async fn execute_until(&self, plan: &Plan, shutdown: CancellationToken) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let Expansion { tasks, unmatched } = self.preview(plan);
        let dispatched = tasks.len();
        info!(
            %run_id,
            "Plan has {} specs ({} rejected), dispatching {} tasks",
            plan.specs.len(),
            plan.rejected.len(),
            dispatched
        );

        let run = self.pool.run_until(tasks, shutdown).await;
        let report = self
            .slot
            .publish(aggregate(run.outcomes).with_abandoned(&run.abandoned));

        if !run.abandoned.is_empty() {
            warn!(
                %run_id,
                "{} tasks were abandoned and are missing from the report",
                run.abandoned.len()
            );
        }
        let totals = report.totals();
        info!(
            %run_id,
            "Run complete: {} rows, {} successful, {} failed, {} empty",
            totals.total_rows,
            totals.successful,
            totals.failed,
            totals.empty
        );

        RunSummary {
            run_id,
            report,
            dispatched,
            rejected: plan.rejected.clone(),
            unmatched,
            abandoned: run.abandoned,
            elapsed: started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests;
