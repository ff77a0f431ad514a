//! In-memory backend for tests: canned replies per endpoint and SQL fragment.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{QueryBackend, RowSet, TaskError};
use crate::core::registry::Endpoint;

#[derive(Debug, Clone)]
pub enum Reply {
    Rows(RowSet),
    Fail(TaskError),
    /// Never finishes on its own; only cancellation ends it.
    Hang,
    Panic,
}

#[derive(Debug, Clone)]
struct Rule {
    endpoint: Option<String>,
    sql_contains: Option<String>,
    delay: Duration,
    reply: Reply,
}

#[derive(Default)]
pub struct ScriptedBackend {
    rules: Vec<Rule>,
    fallback: Option<Reply>,
    default_delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    cancelled: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used when no rule matches. Without one, unmatched calls return no rows.
    pub fn fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn on(mut self, endpoint: &str, sql_contains: &str, reply: Reply) -> Self {
        self.rules.push(Rule {
            endpoint: Some(endpoint.to_string()),
            sql_contains: Some(sql_contains.to_string()),
            delay: Duration::ZERO,
            reply,
        });
        self
    }

    pub fn on_endpoint(mut self, endpoint: &str, reply: Reply) -> Self {
        self.rules.push(Rule {
            endpoint: Some(endpoint.to_string()),
            sql_contains: None,
            delay: Duration::ZERO,
            reply,
        });
        self
    }

    /// Delay the most recently added rule.
    pub fn after(mut self, delay: Duration) -> Self {
        if let Some(rule) = self.rules.last_mut() {
            rule.delay = delay;
        }
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Endpoint names whose calls observed cancellation.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn lookup(&self, endpoint: &str, sql: &str) -> (Duration, Reply) {
        let matched = self.rules.iter().find(|rule| {
            rule.endpoint.as_deref().is_none_or(|e| e == endpoint)
                && rule.sql_contains.as_deref().is_none_or(|s| sql.contains(s))
        });
        match matched {
            Some(rule) => (rule.delay.max(self.default_delay), rule.reply.clone()),
            None => (
                self.default_delay,
                self.fallback
                    .clone()
                    .unwrap_or_else(|| Reply::Rows(RowSet::empty())),
            ),
        }
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueryBackend for ScriptedBackend {
    async fn execute(
        &self,
        endpoint: &Endpoint,
        sql: &str,
        cancel: CancellationToken,
    ) -> Result<RowSet, TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        let (delay, reply) = self.lookup(&endpoint.name, sql);

        let hang = matches!(reply, Reply::Hang);
        let wait = async move {
            if hang {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(delay).await;
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Ok(mut seen) = self.cancelled.lock() {
                    seen.push(endpoint.name.clone());
                }
                return Err(TaskError::Cancelled);
            }
            _ = wait => {}
        }

        match reply {
            Reply::Rows(rows) => Ok(rows),
            Reply::Fail(err) => Err(err),
            Reply::Panic => panic!("scripted panic on {}", endpoint.name),
            Reply::Hang => unreachable!("hang only ends through cancellation"),
        }
    }
}

/// Test helper: build a row set from string literals.
pub fn rows(columns: &[&str], data: &[&[&str]]) -> RowSet {
    RowSet::new(
        columns.iter().map(|c| c.to_string()).collect(),
        data.iter()
            .map(|row| row.iter().map(|cell| Some(cell.to_string())).collect())
            .collect(),
    )
}
