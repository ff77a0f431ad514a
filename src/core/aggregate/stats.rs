//! Per-outcome statistics over text cells.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::executor::RowSet;

/// Columns treated as a status field, first match wins.
pub const STATUS_COLUMNS: &[&str] = &["database_status", "status"];
pub const SIZE_COLUMNS: &[&str] = &["database_size", "size"];
pub const RAM_COLUMNS: &[&str] = &["ram"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl NumericSummary {
    /// `None` when no value parses.
    pub fn from_values<'a>(cells: impl Iterator<Item = Option<&'a str>>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for value in cells.flatten().filter_map(parse_numeric) {
            count += 1;
            sum += value;
            min = min.min(value);
            max = max.max(value);
        }

        (count > 0).then(|| NumericSummary {
            count,
            sum,
            mean: sum / count as f64,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub non_null: usize,
    pub numeric: Option<NumericSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeStats {
    pub row_count: usize,
    pub status_column: Option<String>,
    pub status_distribution: BTreeMap<String, usize>,
    pub size: Option<NumericSummary>,
    pub ram: Option<NumericSummary>,
    pub columns: Vec<ColumnProfile>,
}

impl OutcomeStats {
    pub fn from_rows(rows: &RowSet) -> Self {
        let status_column = first_present(rows, STATUS_COLUMNS);
        let mut status_distribution = BTreeMap::new();
        if let Some(index) = status_column.and_then(|c| rows.column_index(c)) {
            for value in rows.column_values(index).flatten() {
                *status_distribution.entry(value.to_string()).or_insert(0) += 1;
            }
        }

        let columns = rows
            .columns()
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnProfile {
                name: name.clone(),
                non_null: rows.column_values(index).flatten().count(),
                numeric: NumericSummary::from_values(rows.column_values(index)),
            })
            .collect();

        Self {
            row_count: rows.len(),
            status_column: status_column.map(str::to_string),
            status_distribution,
            size: numeric_column(rows, SIZE_COLUMNS),
            ram: numeric_column(rows, RAM_COLUMNS),
            columns,
        }
    }

    /// Status counts, most frequent first.
    pub fn status_by_frequency(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = self
            .status_distribution
            .iter()
            .map(|(status, count)| (status.as_str(), *count))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        counts
    }
}

/// Parse a text cell as a finite number. Blank, non-numeric, NaN and
/// infinite values are excluded.
pub fn parse_numeric(cell: &str) -> Option<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn first_present<'a>(rows: &RowSet, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|candidate| rows.has_column(candidate))
}

fn numeric_column(rows: &RowSet, candidates: &[&str]) -> Option<NumericSummary> {
    let index = rows.column_index(first_present(rows, candidates)?)?;
    NumericSummary::from_values(rows.column_values(index))
}
