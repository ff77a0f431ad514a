use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use console::style;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::value_of;
use crate::core::aggregate::{EXPORT_MIN_ROWS, render_summary};
use crate::core::config::FleetConfig;
use crate::core::dispatch::UnmatchedTarget;
use crate::core::engine::{FleetQuery, RunSummary};
use crate::core::export::ExportTable;
use crate::core::plan::Plan;
use crate::core::planner::{ChatCompletionsPlanner, plan_for_question};
use crate::core::registry::EnvSettings;
use crate::core::terminal::{
    print_empty, print_error, print_info, print_status, print_step, print_success, print_warn,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct QueryCommandArgs {
    pub plan: Option<PathBuf>,
    pub question: Option<String>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub json: bool,
    pub summary: bool,
    pub export: Option<PathBuf>,
}

pub(crate) fn parse_query_command_args(args: &[String], start: usize) -> Result<QueryCommandArgs> {
    let mut parsed = QueryCommandArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--plan" | "-p" => {
                parsed.plan = Some(PathBuf::from(value_of(args, i)?));
                i += 2;
            }
            "--question" | "-q" => {
                parsed.question = Some(value_of(args, i)?.to_string());
                i += 2;
            }
            "--workers" | "-w" => {
                let value = value_of(args, i)?;
                parsed.workers = Some(
                    value
                        .parse()
                        .with_context(|| format!("Invalid --workers value '{}'", value))?,
                );
                i += 2;
            }
            "--timeout" | "-t" => {
                let value = value_of(args, i)?;
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid --timeout value '{}'", value))?;
                if secs == 0 {
                    bail!("--timeout must be at least 1 second");
                }
                parsed.timeout_secs = Some(secs);
                i += 2;
            }
            "--export" | "-e" => {
                parsed.export = Some(PathBuf::from(value_of(args, i)?));
                i += 2;
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            "--summary" => {
                parsed.summary = true;
                i += 1;
            }
            other => {
                // A bare word after `ask` is taken as the question.
                if parsed.question.is_none() && !other.starts_with('-') {
                    parsed.question = Some(other.to_string());
                    i += 1;
                } else {
                    bail!("Unexpected argument '{}'", other);
                }
            }
        }
    }
    Ok(parsed)
}

fn apply_overrides(config: &mut FleetConfig, args: &QueryCommandArgs) {
    if let Some(workers) = args.workers {
        config.pool.max_workers = workers.max(1);
    }
    if let Some(secs) = args.timeout_secs {
        config.pool.task_timeout_secs = secs;
    }
}

async fn read_plan(path: &Path) -> Result<Plan> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    Plan::parse(&text).with_context(|| format!("Failed to parse plan {}", path.display()))
}

fn require_plan(args: &QueryCommandArgs) -> Result<&Path> {
    match args.plan.as_deref() {
        Some(path) => Ok(path),
        None => bail!("Missing --plan <file>"),
    }
}

pub async fn preview_plan(config: &FleetConfig, rest: &[String]) -> Result<()> {
    let args = parse_query_command_args(rest, 0)?;
    let plan = read_plan(require_plan(&args)?).await?;
    let engine = FleetQuery::from_config(config, &EnvSettings)?;
    let expansion = engine.preview(&plan);

    if args.json {
        let tasks: Vec<_> = expansion
            .tasks
            .iter()
            .map(|t| {
                json!({
                    "task_id": t.task_id,
                    "spec_index": t.spec_index,
                    "endpoint": t.endpoint.name,
                    "table": t.table,
                    "sql": t.sql,
                })
            })
            .collect();
        let doc = json!({
            "tasks": tasks,
            "rejected": rejected_json(&plan),
            "unmatched": expansion
                .unmatched
                .iter()
                .map(|u| json!({"spec_index": u.spec_index, "name": u.name}))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    print_step(&format!(
        "Plan: {} specs accepted, {} rejected, {} tasks",
        plan.specs.len(),
        plan.rejected.len(),
        expansion.tasks.len()
    ));
    for (index, spec) in plan.specs.iter().enumerate() {
        if !spec.reason().is_empty() {
            print_info(&format!("Spec #{}: {}", index, spec.reason()));
        }
    }
    for task in &expansion.tasks {
        print_status(
            &format!("{} {}/{}", task.task_id, task.endpoint.name, task.table),
            &task.sql,
        );
    }
    for rejected in &plan.rejected {
        print_warn(&format!("Spec #{} rejected: {}", rejected.index, rejected.error));
    }
    for unmatched in &expansion.unmatched {
        warn_unmatched(unmatched, &engine);
    }
    Ok(())
}

pub async fn run_plan(mut config: FleetConfig, rest: &[String]) -> Result<()> {
    let args = parse_query_command_args(rest, 0)?;
    let plan = read_plan(require_plan(&args)?).await?;
    apply_overrides(&mut config, &args);
    let engine = FleetQuery::from_config(&config, &EnvSettings)?;
    execute_and_report(&engine, &plan, &args, None).await
}

pub async fn ask_question(mut config: FleetConfig, rest: &[String]) -> Result<()> {
    let args = parse_query_command_args(rest, 0)?;
    let Some(question) = args.question.clone().filter(|q| !q.trim().is_empty()) else {
        bail!("Missing --question <text>");
    };
    apply_overrides(&mut config, &args);
    let engine = FleetQuery::from_config(&config, &EnvSettings)?;
    let planner = ChatCompletionsPlanner::from_settings(config.planner.clone(), &EnvSettings)?;

    let plan = plan_for_question(&planner, &question, engine.registry(), &config.catalog).await?;
    if plan.is_empty() {
        bail!("The plan generator produced no usable queries. Try rephrasing the question.");
    }
    execute_and_report(&engine, &plan, &args, Some(&question)).await
}

async fn execute_and_report(
    engine: &FleetQuery,
    plan: &Plan,
    args: &QueryCommandArgs,
    question: Option<&str>,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, abandoning pending tasks");
            trigger.cancel();
        }
    });

    let summary = engine.execute_until(plan, shutdown).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&run_json(&summary, plan))?);
    } else {
        print_run(&summary, engine);
        if args.summary {
            println!("\n{}", render_summary(&summary.report));
        }
    }

    match &args.export {
        Some(path) => match ExportTable::from_report(&summary.report, question) {
            Some(table) => {
                table.write_json(path).await?;
                if !args.json {
                    print_success(&format!(
                        "Exported {} rows to {}",
                        table.total_rows,
                        path.display()
                    ));
                }
            }
            None => {
                let msg = export_skipped_message(summary.report.totals().total_rows);
                info!("{}", msg);
                if !args.json {
                    print_warn(&msg);
                }
            }
        },
        None if summary.report.export_eligible() && !args.json => {
            print_info(&format!(
                "{} rows returned. Pass --export <file> to save them as a table.",
                summary.report.totals().total_rows
            ));
        }
        None => {}
    }
    Ok(())
}

fn export_skipped_message(total_rows: usize) -> String {
    format!(
        "Export skipped: {} rows returned, export needs more than {}",
        total_rows, EXPORT_MIN_ROWS
    )
}

fn print_run(summary: &RunSummary, engine: &FleetQuery) {
    print_step(&format!(
        "Run {}: {} tasks on {} workers ({}s deadline) in {:.2}s",
        summary.run_id,
        summary.dispatched,
        engine.pool().max_workers(),
        engine.pool().task_timeout().as_secs(),
        summary.elapsed.as_secs_f64()
    ));

    for (endpoint, table, group) in summary.report.groups() {
        for entry in &group.entries {
            let outcome = &entry.outcome;
            let label = format!("{} {}", style(endpoint).bold(), table);
            let secs = outcome.elapsed.as_secs_f64();
            if !outcome.success {
                print_error(&format!(
                    "{}: {} ({:.2}s)",
                    label,
                    outcome.error.as_deref().unwrap_or("failed"),
                    secs
                ));
            } else if outcome.row_count == 0 {
                print_empty(&format!("{}: no rows ({:.2}s)", label, secs));
            } else {
                print_success(&format!(
                    "{}: {} rows ({:.2}s)",
                    label, outcome.row_count, secs
                ));
            }
        }
    }

    for abandoned in &summary.abandoned {
        print_warn(&format!(
            "{} {}/{} abandoned ({:?}), not in the report",
            abandoned.task_id, abandoned.endpoint, abandoned.table, abandoned.reason
        ));
    }
    for rejected in &summary.rejected {
        print_warn(&format!("Spec #{} rejected: {}", rejected.index, rejected.error));
    }
    for unmatched in &summary.unmatched {
        warn_unmatched(unmatched, engine);
    }
    for (endpoint, table) in summary.report.tables_without_data() {
        print_empty(&format!("No data found for {} on {}", table, endpoint));
    }

    let totals = summary.report.totals();
    print_status(
        "Totals",
        &format!(
            "{} rows, {} successful, {} failed, {} empty",
            totals.total_rows, totals.successful, totals.failed, totals.empty
        ),
    );
}

fn warn_unmatched(unmatched: &UnmatchedTarget, engine: &FleetQuery) {
    let hint = engine
        .registry()
        .match_alias(&unmatched.name)
        .map(|e| format!(", did you mean {}?", e.name))
        .unwrap_or_default();
    print_warn(&format!(
        "Spec #{} names unknown endpoint '{}'{}",
        unmatched.spec_index, unmatched.name, hint
    ));
}

fn rejected_json(plan: &Plan) -> Vec<serde_json::Value> {
    plan.rejected
        .iter()
        .map(|r| json!({"index": r.index, "error": r.error.to_string()}))
        .collect()
}

fn run_json(summary: &RunSummary, plan: &Plan) -> serde_json::Value {
    json!({
        "run_id": summary.run_id.to_string(),
        "dispatched": summary.dispatched,
        "elapsed_secs": summary.elapsed.as_secs_f64(),
        "totals": summary.report.totals(),
        "export_eligible": summary.report.export_eligible(),
        "tables_without_data": summary.report.tables_without_data(),
        "column_presence": summary.report.column_presence(),
        "report": &*summary.report,
        "abandoned": summary.abandoned,
        "rejected": rejected_json(plan),
        "unmatched": summary
            .unmatched
            .iter()
            .map(|u| json!({"spec_index": u.spec_index, "name": u.name}))
            .collect::<Vec<_>>(),
    })
}
