//! Fan-out: turn validated query specs into one task per (endpoint, table).
//!
//! Expansion is pure. Endpoint names that match nothing in the registry add
//! no tasks; they are reported back in [`Expansion::unmatched`] so callers
//! can log them, but never fail the plan.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::plan::{QuerySpec, TABLE_PLACEHOLDER, TargetServers};
use crate::core::registry::{Endpoint, EndpointRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTask {
    /// `t1`, `t2`, ... in dispatch order.
    pub task_id: String,
    pub spec_index: usize,
    pub endpoint: Arc<Endpoint>,
    pub table: String,
    pub sql: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedTarget {
    pub spec_index: usize,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Expansion {
    pub tasks: Vec<QueryTask>,
    pub unmatched: Vec<UnmatchedTarget>,
}

/// Substitute `{table}` and wrap bare filter fragments into a full SELECT.
pub fn effective_sql(template: &str, table: &str) -> String {
    let sql = template.replace(TABLE_PLACEHOLDER, table);
    if sql.to_uppercase().contains("FROM ") {
        sql
    } else {
        format!("SELECT * FROM {} WHERE {}", table, sql)
    }
}

pub fn expand(specs: &[QuerySpec], registry: &EndpointRegistry) -> Vec<QueryTask> {
    expand_detailed(specs, registry).tasks
}

pub fn expand_detailed(specs: &[QuerySpec], registry: &EndpointRegistry) -> Expansion {
    let mut expansion = Expansion::default();

    for (spec_index, spec) in specs.iter().enumerate() {
        let endpoints: Vec<&Arc<Endpoint>> = match spec.target_servers() {
            TargetServers::All => registry.endpoints().iter().collect(),
            TargetServers::Named(names) => names
                .iter()
                .filter_map(|name| {
                    let found = registry.find(name);
                    if found.is_none() {
                        warn!(
                            "Spec #{} targets unknown endpoint {:?}, no tasks created for it",
                            spec_index, name
                        );
                        expansion.unmatched.push(UnmatchedTarget {
                            spec_index,
                            name: name.clone(),
                        });
                    }
                    found
                })
                .collect(),
        };

        for endpoint in endpoints {
            for table in spec.target_tables() {
                let task_id = format!("t{}", expansion.tasks.len() + 1);
                let sql = effective_sql(spec.sql_template(), table);
                debug!(%task_id, endpoint = %endpoint.name, %table, "dispatching");
                expansion.tasks.push(QueryTask {
                    task_id,
                    spec_index,
                    endpoint: Arc::clone(endpoint),
                    table: table.clone(),
                    sql,
                });
            }
        }
    }

    expansion
}
