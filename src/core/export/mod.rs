//! Flat export of every row a run returned, with provenance columns.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::core::aggregate::AggregatedReport;

pub const SHEET_NAME: &str = "Query_Results";
pub const SOURCE_COLUMN: &str = "Source_Datacenter";
pub const TYPE_COLUMN: &str = "Database_Type";
pub const TIME_COLUMN: &str = "Query_Execution_Time";

const TITLE_QUESTION_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub datacenter: String,
    pub database_type: String,
    pub record_count: usize,
    pub execution_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportTable {
    pub title: String,
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub sources: Vec<SourceInfo>,
    pub total_rows: usize,
}

/// `oracle_tb` -> `ORACLE`.
pub fn database_type(table: &str) -> String {
    table.replace("_tb", "").to_uppercase()
}

fn seconds(elapsed: std::time::Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

impl ExportTable {
    /// `None` unless the report is large enough to be worth exporting.
    pub fn from_report(report: &AggregatedReport, question: Option<&str>) -> Option<Self> {
        if !report.export_eligible() {
            return None;
        }

        let with_data: Vec<_> = report.outcomes().filter(|o| o.has_data()).collect();

        let mut columns: Vec<String> = Vec::new();
        for outcome in &with_data {
            if let Some(rows) = &outcome.rows {
                for column in rows.columns() {
                    if !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
            }
        }

        let mut rows = Vec::new();
        let mut sources = Vec::new();
        for outcome in &with_data {
            let Some(set) = &outcome.rows else { continue };
            let db_type = database_type(&outcome.table);
            let elapsed = seconds(outcome.elapsed);
            let positions: Vec<Option<usize>> =
                columns.iter().map(|c| set.column_index(c)).collect();

            for row in set.rows() {
                let mut cells: Vec<Option<String>> = positions
                    .iter()
                    .map(|pos| pos.and_then(|i| row.get(i).cloned().flatten()))
                    .collect();
                cells.push(Some(outcome.endpoint.clone()));
                cells.push(Some(db_type.clone()));
                cells.push(Some(elapsed.clone()));
                rows.push(cells);
            }

            sources.push(SourceInfo {
                datacenter: outcome.endpoint.clone(),
                database_type: db_type,
                record_count: set.len(),
                execution_time: elapsed,
            });
        }

        if rows.is_empty() {
            return None;
        }

        columns.extend([SOURCE_COLUMN, TYPE_COLUMN, TIME_COLUMN].map(String::from));

        let mut title = format!("Database Query Results - {} records", rows.len());
        if let Some(question) = question.filter(|q| !q.trim().is_empty()) {
            let short: String = question.chars().take(TITLE_QUESTION_CHARS).collect();
            title.push_str(&format!(" | Query: {}...", short));
        }

        Some(Self {
            title,
            sheet_name: SHEET_NAME.to_string(),
            total_rows: rows.len(),
            columns,
            rows,
            sources,
        })
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_vec_pretty(self).context("Failed to serialize export")?;
        tokio::fs::write(path, body)
            .await
            .with_context(|| format!("Failed to write export to {}", path.display()))?;
        info!("Exported {} rows to {}", self.total_rows, path.display());
        Ok(())
    }
}
