//! Query plans: the typed form of what the plan generator hands us.
//!
//! Parsing happens in two layers. A document that is not a JSON array of
//! query specs is rejected as a whole ([`PlanParseError`]). Each spec that
//! parses is then validated on its own; a spec that fails validation is
//! recorded in [`Plan::rejected`] and the rest of the plan goes ahead.

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ALL_SERVERS: &str = "all";
pub const TABLE_PLACEHOLDER: &str = "{table}";

#[derive(Debug, thiserror::Error)]
pub enum PlanParseError {
    #[error("plan text contains no JSON document")]
    NoJson,

    #[error("plan must be a JSON array of query specs")]
    NotAnArray,

    #[error("plan does not match the query spec schema: {0}")]
    Schema(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanValidationError {
    #[error("sql template is empty")]
    EmptySqlTemplate,

    #[error("target_tables is empty")]
    EmptyTargetTables,

    #[error("target_servers is empty")]
    EmptyTargetServers,

    #[error("{0:?} is not a plain table identifier")]
    InvalidTableName(String),
}

/// Target endpoints of a spec: every registered endpoint, or named ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetServers {
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTargets {
    One(String),
    Many(Vec<String>),
}

/// A query spec exactly as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct RawQuerySpec {
    #[serde(alias = "sql")]
    pub sql_template: String,
    pub target_tables: Vec<String>,
    pub target_servers: RawTargets,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub expected_result: String,
}

/// A validated query spec. Target tables and target servers are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySpec {
    sql_template: String,
    target_tables: Vec<String>,
    target_servers: TargetServers,
    reason: String,
    expected_result: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedSpec {
    /// Position of the spec in the submitted plan.
    pub index: usize,
    pub error: PlanValidationError,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub specs: Vec<QuerySpec>,
    pub rejected: Vec<RejectedSpec>,
}

impl TargetServers {
    fn from_raw(raw: RawTargets) -> Result<Self, PlanValidationError> {
        let names = match raw {
            RawTargets::One(name) => vec![name],
            RawTargets::Many(names) => names,
        };
        let names = dedup_trimmed(names);
        if names.is_empty() {
            return Err(PlanValidationError::EmptyTargetServers);
        }
        // Only a lone lowercase "all" is the sentinel; anywhere else it is a name.
        if let [only] = names.as_slice()
            && only == ALL_SERVERS
        {
            return Ok(TargetServers::All);
        }
        Ok(TargetServers::Named(names))
    }
}

impl QuerySpec {
    pub fn new(
        sql_template: impl Into<String>,
        target_tables: Vec<String>,
        target_servers: TargetServers,
        reason: impl Into<String>,
        expected_result: impl Into<String>,
    ) -> Result<Self, PlanValidationError> {
        let sql_template = sql_template.into().trim().to_string();
        if sql_template.is_empty() {
            return Err(PlanValidationError::EmptySqlTemplate);
        }

        let target_tables = dedup_trimmed(target_tables);
        if target_tables.is_empty() {
            return Err(PlanValidationError::EmptyTargetTables);
        }
        if let Some(bad) = target_tables.iter().find(|t| !is_table_identifier(t)) {
            return Err(PlanValidationError::InvalidTableName(bad.clone()));
        }

        let target_servers = match target_servers {
            TargetServers::All => TargetServers::All,
            TargetServers::Named(names) => TargetServers::from_raw(RawTargets::Many(names))?,
        };

        Ok(Self {
            sql_template,
            target_tables,
            target_servers,
            reason: reason.into(),
            expected_result: expected_result.into(),
        })
    }

    pub fn from_raw(raw: RawQuerySpec) -> Result<Self, PlanValidationError> {
        let servers = TargetServers::from_raw(raw.target_servers)?;
        Self::new(
            raw.sql_template,
            raw.target_tables,
            servers,
            raw.reason,
            raw.expected_result,
        )
    }

    pub fn sql_template(&self) -> &str {
        &self.sql_template
    }

    pub fn target_tables(&self) -> &[String] {
        &self.target_tables
    }

    pub fn target_servers(&self) -> &TargetServers {
        &self.target_servers
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn expected_result(&self) -> &str {
        &self.expected_result
    }
}

impl Plan {
    /// Parse generator output (raw JSON or a fenced ```json block).
    pub fn parse(text: &str) -> Result<Self, PlanParseError> {
        let block = extract_json_block(text).ok_or(PlanParseError::NoJson)?;
        if !block.starts_with('[') {
            return Err(PlanParseError::NotAnArray);
        }
        let raw: Vec<RawQuerySpec> = serde_json::from_str(block)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_raw(raw: Vec<RawQuerySpec>) -> Self {
        let mut plan = Plan::default();
        for (index, spec) in raw.into_iter().enumerate() {
            match QuerySpec::from_raw(spec) {
                Ok(spec) => plan.specs.push(spec),
                Err(error) => {
                    warn!("Rejecting query spec #{}: {}", index, error);
                    plan.rejected.push(RejectedSpec { index, error });
                }
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Locate the JSON document in generator output. Tries a fenced ```json
/// block, then any fenced block, then the trimmed text itself when it starts
/// like JSON.
pub(crate) fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    for fence in ["```json", "```"] {
        if let Some(start) = trimmed.find(fence) {
            let content_start = start + fence.len();
            if let Some(end) = trimmed[content_start..].find("```") {
                let block = trimmed[content_start..content_start + end].trim();
                if !block.is_empty() {
                    return Some(block);
                }
            }
        }
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }
    None
}

/// `name` or `schema.name`, ASCII letters, digits and underscores only.
pub fn is_table_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn dedup_trimmed(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !out.iter().any(|v| v == value) {
            out.push(value.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests;
