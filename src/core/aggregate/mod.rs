//! Result aggregation: group outcomes by endpoint and table, compute totals
//! and per-outcome statistics.
//!
//! [`aggregate`] is pure. Groups live in sorted maps and the outcomes inside a
//! group are sorted by their own contents, so the report never depends on the
//! order tasks happened to finish in.

mod slot;
mod stats;
mod summary;

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::executor::{AbandonedTask, QueryOutcome};

pub use slot::ReportSlot;
pub use stats::OutcomeStats;
pub use summary::render_summary;

/// Reports with this many rows or fewer are not offered for export.
pub const EXPORT_MIN_ROWS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupEntry {
    pub outcome: QueryOutcome,
    /// Present for successful outcomes that returned rows.
    pub stats: Option<OutcomeStats>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableGroup {
    pub entries: Vec<GroupEntry>,
}

impl TableGroup {
    pub fn has_data(&self) -> bool {
        self.entries.iter().any(|e| e.outcome.has_data())
    }

    pub fn total_rows(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.has_data())
            .map(|e| e.outcome.row_count)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Rows over successful, non-empty outcomes.
    pub total_rows: usize,
    pub successful: usize,
    pub failed: usize,
    /// Successful outcomes with zero rows.
    pub empty: usize,
    pub outcomes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedReport {
    pub endpoints: BTreeMap<String, BTreeMap<String, TableGroup>>,
    pub totals: Totals,
    /// Tasks that never produced an outcome, sorted by task id.
    pub abandoned: Vec<AbandonedTask>,
}

pub fn aggregate(outcomes: impl IntoIterator<Item = QueryOutcome>) -> AggregatedReport {
    let mut grouped: BTreeMap<String, BTreeMap<String, Vec<QueryOutcome>>> = BTreeMap::new();
    for outcome in outcomes {
        grouped
            .entry(outcome.endpoint.clone())
            .or_default()
            .entry(outcome.table.clone())
            .or_default()
            .push(outcome);
    }

    let mut totals = Totals::default();
    let endpoints = grouped
        .into_iter()
        .map(|(endpoint, tables)| {
            let tables = tables
                .into_iter()
                .map(|(table, mut outcomes)| {
                    outcomes.sort();
                    let entries = outcomes
                        .into_iter()
                        .map(|outcome| {
                            totals.outcomes += 1;
                            if !outcome.success {
                                totals.failed += 1;
                            } else {
                                totals.successful += 1;
                                if outcome.row_count == 0 {
                                    totals.empty += 1;
                                } else {
                                    totals.total_rows += outcome.row_count;
                                }
                            }
                            let stats = outcome
                                .rows
                                .as_ref()
                                .filter(|_| outcome.has_data())
                                .map(OutcomeStats::from_rows);
                            GroupEntry { outcome, stats }
                        })
                        .collect();
                    (table, TableGroup { entries })
                })
                .collect();
            (endpoint, tables)
        })
        .collect();

    AggregatedReport {
        endpoints,
        totals,
        abandoned: Vec::new(),
    }
}

impl AggregatedReport {
    /// Record tasks that were dispatched but never reported back. They add
    /// nothing to the totals but still count against data coverage.
    pub fn with_abandoned(mut self, abandoned: &[AbandonedTask]) -> Self {
        self.abandoned = abandoned.to_vec();
        self.abandoned.sort();
        self
    }

    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    pub fn is_empty(&self) -> bool {
        self.totals.outcomes == 0
    }

    pub fn export_eligible(&self) -> bool {
        self.totals.total_rows > EXPORT_MIN_ROWS
    }

    pub fn group(&self, endpoint: &str, table: &str) -> Option<&TableGroup> {
        self.endpoints.get(endpoint)?.get(table)
    }

    /// `(endpoint, table, group)` in report order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &str, &TableGroup)> {
        self.endpoints.iter().flat_map(|(endpoint, tables)| {
            tables
                .iter()
                .map(move |(table, group)| (endpoint.as_str(), table.as_str(), group))
        })
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.groups()
            .flat_map(|(_, _, group)| group.entries.iter().map(|e| &e.outcome))
    }

    /// `(endpoint, table)` pairs where no outcome succeeded with rows,
    /// including pairs whose tasks were all abandoned.
    pub fn tables_without_data(&self) -> Vec<(String, String)> {
        let mut missing: BTreeSet<(String, String)> = self
            .groups()
            .filter(|(_, _, group)| !group.has_data())
            .map(|(endpoint, table, _)| (endpoint.to_string(), table.to_string()))
            .collect();
        for task in &self.abandoned {
            let has_data = self
                .group(&task.endpoint, &task.table)
                .is_some_and(TableGroup::has_data);
            if !has_data {
                missing.insert((task.endpoint.clone(), task.table.clone()));
            }
        }
        missing.into_iter().collect()
    }

    /// For each column name, how many successful non-empty outcomes carry it.
    pub fn column_presence(&self) -> BTreeMap<String, usize> {
        let mut presence = BTreeMap::new();
        for outcome in self.outcomes().filter(|o| o.has_data()) {
            if let Some(rows) = &outcome.rows {
                for column in rows.columns() {
                    *presence.entry(column.clone()).or_insert(0) += 1;
                }
            }
        }
        presence
    }
}

#[cfg(test)]
mod tests;
