mod endpoints;
mod query;

use std::path::PathBuf;

use anyhow::{Result, bail};
use console::style;
use tracing::Level;

use crate::core::config::FleetConfig;
use crate::core::terminal::{self, GuideSection};
use crate::logging;

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Queries")
        .command("run", "Execute a query plan across the fleet")
        .command("ask", "Turn a question into a plan, then execute it")
        .command("plan", "Show the tasks a plan would create, without running it")
        .print();

    GuideSection::new("Fleet")
        .command("endpoints", "List the endpoints resolved from config and environment")
        .print();

    GuideSection::new("Run options")
        .command("--plan <file>", "Plan document (JSON array, or a fenced ```json block)")
        .command("--question <text>", "Question for `ask`")
        .command("--workers <n>", "Worker budget (default from [pool] max_workers)")
        .command("--timeout <secs>", "Per-task deadline (default from [pool] task_timeout_secs)")
        .command("--json", "Print the run as JSON on stdout")
        .command("--summary", "Print the plain-text analysis summary")
        .command("--export <file>", "Write the flat export table when the run is large enough")
        .print();

    GuideSection::new("Global options")
        .command("--config <file>", "Config file (default ./fleetquery.toml)")
        .command("--log-level <level>", "trace, debug, info, warn or error")
        .command("--log-file <file>", "Also append log lines to this file")
        .print();

    println!(
        "\n {} {} [global options] <command> [options]\n",
        style("Usage:").bold(),
        style("fleetquery").green()
    );
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub log_level: Level,
    pub log_file: Option<PathBuf>,
    pub command: Option<String>,
    /// Everything that is not a global option, command name excluded.
    pub rest: Vec<String>,
}

pub(crate) fn parse_global_args(args: &[String], start: usize) -> Result<GlobalArgs> {
    let mut parsed = GlobalArgs {
        config: None,
        log_level: Level::INFO,
        log_file: None,
        command: None,
        rest: Vec::new(),
    };
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                parsed.config = Some(PathBuf::from(value_of(args, i)?));
                i += 2;
            }
            "--log-level" => {
                parsed.log_level = logging::parse_level(value_of(args, i)?)?;
                i += 2;
            }
            "--log-file" => {
                parsed.log_file = Some(PathBuf::from(value_of(args, i)?));
                i += 2;
            }
            other => {
                if parsed.command.is_none() && !other.starts_with('-') {
                    parsed.command = Some(other.to_string());
                } else {
                    parsed.rest.push(other.to_string());
                }
                i += 1;
            }
        }
    }
    Ok(parsed)
}

/// The value following the flag at `i`.
pub(crate) fn value_of(args: &[String], i: usize) -> Result<&str> {
    match args.get(i + 1) {
        Some(value) => Ok(value.as_str()),
        None => bail!("Missing value for {}", args[i]),
    }
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let global = parse_global_args(&args, 1)?;

    let Some(command) = global.command.as_deref() else {
        print_help();
        return Ok(());
    };
    if matches!(command, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    logging::init_logging(global.log_level, global.log_file.as_deref())?;
    let config = FleetConfig::load(global.config.as_deref()).await?;

    match command {
        "endpoints" => endpoints::list_endpoints(&config),
        "plan" => query::preview_plan(&config, &global.rest).await,
        "run" => query::run_plan(config, &global.rest).await,
        "ask" => query::ask_question(config, &global.rest).await,
        other => {
            print_help();
            bail!("Unknown command '{}'", other)
        }
    }
}
