
use std::time::Duration;

use crate::core::executor::{AbandonReason, AbandonedTask, FailureKind, QueryOutcome, RowSet};

/// Successful outcome with `count` rows of hostname/status/size/ram.
pub(super) fn ok(task_id: &str, endpoint: &str, table: &str, count: usize) -> QueryOutcome {
    let columns = ["hostname", "database_status", "database_size", "ram"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    let rows = (0..count)
        .map(|i| {
            vec![
                Some(format!("{}-db{:02}", endpoint.to_lowercase(), i)),
                Some(if i % 3 == 0 { "DOWN" } else { "UP" }.to_string()),
                Some(format!("{}.5", i)),
                Some("16".to_string()),
            ]
        })
        .collect();
    let rows = RowSet::new(columns, rows);
    QueryOutcome {
        task_id: task_id.to_string(),
        endpoint: endpoint.to_string(),
        table: table.to_string(),
        sql: format!("SELECT * FROM {}", table),
        success: true,
        row_count: rows.len(),
        rows: Some(rows),
        elapsed: Duration::from_millis(120),
        error: None,
        failure: None,
    }
}

pub(super) fn failed(task_id: &str, endpoint: &str, table: &str) -> QueryOutcome {
    QueryOutcome {
        task_id: task_id.to_string(),
        endpoint: endpoint.to_string(),
        table: table.to_string(),
        sql: format!("SELECT * FROM {}", table),
        success: false,
        rows: None,
        row_count: 0,
        elapsed: Duration::from_millis(30),
        error: Some(format!("connection to {} failed: timeout expired", endpoint)),
        failure: Some(FailureKind::Connection),
    }
}

pub(super) fn timed_out(task_id: &str, endpoint: &str, table: &str) -> AbandonedTask {
    AbandonedTask {
        task_id: task_id.to_string(),
        endpoint: endpoint.to_string(),
        table: table.to_string(),
        reason: AbandonReason::DeadlineElapsed,
    }
}
