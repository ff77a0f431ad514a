//! Plan generation from natural-language questions.
//!
//! A [`PlanGenerator`] only produces text. That text goes through the same
//! strict parser as a plan file, so a generator can never smuggle in a spec
//! that skipped validation.

mod openai;

use std::fmt::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::config::TableCatalog;
use crate::core::plan::Plan;
use crate::core::registry::EndpointRegistry;

pub use openai::ChatCompletionsPlanner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPrompt {
    pub system: String,
    pub user: String,
}

#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(&self, prompt: &PlanPrompt) -> Result<String>;
}

pub fn build_system_prompt(registry: &EndpointRegistry, catalog: &TableCatalog) -> String {
    let mut prompt = String::from(
        "You are an expert SQL query generator for a fleet of PostgreSQL inventory databases.\n\n",
    );

    prompt.push_str("AVAILABLE TABLES AND COLUMNS:\n");
    for table in &catalog.tables {
        let _ = writeln!(prompt, "- {}: {}", table.name, table.columns.join(", "));
    }

    prompt.push_str("\nAVAILABLE DATACENTERS:\n");
    for endpoint in registry.endpoints() {
        if endpoint.aliases.is_empty() {
            let _ = writeln!(prompt, "- {}", endpoint.name);
        } else {
            let _ = writeln!(
                prompt,
                "- {} (also called: {})",
                endpoint.name,
                endpoint.aliases.join(", ")
            );
        }
    }

    let all_tables: Vec<String> = catalog
        .tables
        .iter()
        .map(|t| format!("\"{}\"", t.name))
        .collect();

    let _ = write!(
        prompt,
        r#"
RULES:
- Use standard PostgreSQL syntax only.
- ORDER BY must reference columns that appear in the SELECT list.
- Use ILIKE for case-insensitive matching.
- For server listings use SELECT DISTINCT hostname to avoid duplicates.
- Datacenter filtering is done by choosing target_servers. Never filter on a datacenter column.
- No datacenter mentioned: target_servers ["all"]. Otherwise use the canonical names above.
- No database type mentioned: target_tables [{all_tables}].
- You may write {{table}} in the SQL; it is replaced with each target table.

RESPONSE FORMAT: a JSON array, one object per query:
[
  {{
    "sql": "SELECT DISTINCT hostname, database_name, database_status FROM {{table}} ORDER BY hostname",
    "target_tables": ["oracle_tb"],
    "target_servers": ["all"],
    "reason": "why this query answers the question",
    "expected_result": "what the rows will show"
  }}
]
"#,
        all_tables = all_tables.join(", ")
    );

    prompt
}

pub fn build_user_prompt(question: &str) -> String {
    format!(
        "Generate SQL queries to answer this question:\n\"{}\"\n\nReturn only the JSON array, no other text.",
        question.trim()
    )
}

pub fn build_prompt(
    question: &str,
    registry: &EndpointRegistry,
    catalog: &TableCatalog,
) -> PlanPrompt {
    PlanPrompt {
        system: build_system_prompt(registry, catalog),
        user: build_user_prompt(question),
    }
}

/// Ask `generator` for a plan and parse its answer strictly.
pub async fn plan_for_question(
    generator: &dyn PlanGenerator,
    question: &str,
    registry: &EndpointRegistry,
    catalog: &TableCatalog,
) -> Result<Plan> {
    let prompt = build_prompt(question, registry, catalog);
    info!("Generating query plan for: {}", question.trim());

    let text = generator
        .generate(&prompt)
        .await
        .context("Plan generator request failed")?;
    debug!("Plan generator answered: {}", text);

    let plan = Plan::parse(&text).context("Plan generator returned an unusable plan")?;
    info!(
        "Generated plan with {} specs ({} rejected)",
        plan.specs.len(),
        plan.rejected.len()
    );
    Ok(plan)
}
