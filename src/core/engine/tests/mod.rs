
use std::sync::Arc;

use crate::core::config::PoolConfig;
use crate::core::engine::FleetQuery;
use crate::core::executor::ExecutionPool;
use crate::core::executor::scripted::ScriptedBackend;
use crate::core::registry::{Credentials, Endpoint, EndpointRegistry};

pub(super) const FLEET: [&str; 4] = ["DC4", "GB00", "CH00", "SG00"];

pub(super) fn engine(backend: Arc<ScriptedBackend>, timeout_secs: u64) -> FleetQuery {
    let endpoints = FLEET
        .iter()
        .map(|name| Endpoint {
            name: name.to_string(),
            aliases: vec![name.to_lowercase()],
            host: format!("{}.db.internal", name.to_lowercase()),
            port: 5432,
            database: "inventory".to_string(),
            credentials: Credentials::new("app_user_pg", "pw"),
        })
        .collect();
    let registry = EndpointRegistry::from_endpoints(endpoints).unwrap();
    let pool = ExecutionPool::new(
        backend,
        &PoolConfig {
            max_workers: 4,
            task_timeout_secs: timeout_secs,
            cancel_grace_ms: 100,
        },
    );
    FleetQuery::new(Arc::new(registry), pool)
}
