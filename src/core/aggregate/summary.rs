//! Plain-text rendering of a report, the form handed to the analysis step.

use std::fmt::Write;

use super::{AggregatedReport, GroupEntry};

const SAMPLE_ROWS: usize = 5;

pub fn render_summary(report: &AggregatedReport) -> String {
    let totals = report.totals();
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Executed {} queries: {} successful, {} failed, {} empty",
        totals.outcomes, totals.successful, totals.failed, totals.empty
    );
    let _ = writeln!(out, "Total records: {}", totals.total_rows);

    for (endpoint, tables) in &report.endpoints {
        let _ = writeln!(out, "\n=== {} ===", endpoint);
        for (table, group) in tables {
            let _ = writeln!(out, "\n{}:", table);
            for entry in &group.entries {
                render_entry(&mut out, entry);
            }
        }
    }

    if !report.abandoned.is_empty() {
        let _ = writeln!(out, "\nAbandoned before completion:");
        for task in &report.abandoned {
            let _ = writeln!(out, "  - {} on {} ({})", task.table, task.endpoint, task.task_id);
        }
    }

    let missing = report.tables_without_data();
    if !missing.is_empty() {
        let _ = writeln!(out, "\nNo data found for:");
        for (endpoint, table) in missing {
            let _ = writeln!(out, "  - {} on {}", table, endpoint);
        }
    }

    out
}

fn render_entry(out: &mut String, entry: &GroupEntry) {
    let outcome = &entry.outcome;
    if !outcome.success {
        let _ = writeln!(
            out,
            "  - ERROR: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
        return;
    }
    let (Some(rows), Some(stats)) = (&outcome.rows, &entry.stats) else {
        let _ = writeln!(out, "  - No data returned (empty table)");
        return;
    };

    let _ = writeln!(out, "  - Records: {}", stats.row_count);
    let _ = writeln!(out, "  - Sample data:");
    for row in rows.rows().iter().take(SAMPLE_ROWS) {
        let cells: Vec<String> = rows
            .columns()
            .iter()
            .zip(row)
            .filter_map(|(column, cell)| cell.as_ref().map(|v| format!("{}={}", column, v)))
            .collect();
        let _ = writeln!(out, "    {}", cells.join(", "));
    }

    if stats.status_column.is_some() {
        let distribution: Vec<String> = stats
            .status_by_frequency()
            .into_iter()
            .map(|(status, count)| format!("{}: {}", status, count))
            .collect();
        let _ = writeln!(out, "  - Status distribution: {{{}}}", distribution.join(", "));
    }
    if let Some(size) = &stats.size {
        let _ = writeln!(
            out,
            "  - Total size: {:.2} GB, Average: {:.2} GB",
            size.sum, size.mean
        );
    }
    if let Some(ram) = &stats.ram {
        let _ = writeln!(out, "  - Average RAM: {:.2} GB", ram.mean);
    }
}
