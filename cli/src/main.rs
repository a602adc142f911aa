//! CLI entrypoint for Copilot Ensemble
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;
mod output;

use anyhow::{Context, Result, bail};
use args::{Cli, OutputFormat};
use clap::Parser;
use ensemble_application::{Aggregator, Dispatcher, WorkerGate};
use ensemble_domain::{AggregationStrategy, ConfigIssue, Task, WorkerDescriptor};
use ensemble_infrastructure::{
    CliWorkerInvoker, ConfigLoader, FileConfig, SystemClock, ThreadRngJitter, TracingProgress,
};
use output::ConsoleFormatter;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting Copilot Ensemble");

    let Some(prompt) = cli.prompt.clone() else {
        bail!("Prompt is required. Use --show-config to inspect configuration sources.");
    };

    let config = load_config(&cli)?;
    report_issues(&config)?;

    // === Configuration ===
    let mut dispatch_config = config.dispatch_config();
    if let Some(max) = cli.max_concurrent {
        dispatch_config = dispatch_config.with_max_concurrent(max);
    }
    if let Some(retries) = cli.max_retries {
        dispatch_config = dispatch_config.with_max_retries(retries);
    }
    if let Some(secs) = cli.timeout {
        dispatch_config = dispatch_config.with_default_timeout(Duration::from_secs(secs));
    }
    if cli.fallback {
        dispatch_config = dispatch_config.with_fallback(true);
    }

    let mut aggregation_config = config.aggregation_config();
    if let Some(name) = &cli.strategy {
        let strategy: AggregationStrategy = name.parse().with_context(|| {
            format!(
                "Valid strategies: {}",
                AggregationStrategy::valid_names().join(", ")
            )
        })?;
        aggregation_config = aggregation_config.with_strategy(strategy);
    }
    if let Some(threshold) = cli.consensus_threshold {
        aggregation_config = aggregation_config.with_consensus_threshold(threshold);
    }

    let fallback = config.fallback_descriptor();
    if dispatch_config.fallback_to_llm && fallback.is_none() {
        warn!("Fallback requested but no [fallback] worker is configured; disabling it");
        dispatch_config = dispatch_config.with_fallback(false);
    }

    let workers = select_workers(config.worker_descriptors(), &cli.worker)?;
    let tasks = workers
        .iter()
        .map(|w| {
            let timeout = cli.timeout.map(Duration::from_secs).unwrap_or(w.timeout);
            Task::new(&w.id, &prompt, timeout)
        })
        .collect::<Result<Vec<_>, _>>()?;

    // === Dependency Injection ===
    let clock = Arc::new(SystemClock);
    let gate = Arc::new(WorkerGate::new(clock.clone()));
    for worker in workers.iter().filter(|w| w.adhoc) {
        gate.mark_as_adhoc(&worker.id);
    }

    let mut invoker = CliWorkerInvoker::new(workers);
    if let Some(fallback) = fallback {
        invoker = invoker.with_fallback(fallback);
    }

    let dispatcher = Dispatcher::new(Arc::new(invoker), gate, clock)
        .with_config(dispatch_config)
        .with_jitter(Arc::new(ThreadRngJitter))
        .with_progress(Arc::new(TracingProgress));
    let aggregator = Aggregator::new(dispatcher, aggregation_config);

    let result = aggregator.aggregate(tasks).await?;

    match cli.output {
        OutputFormat::Json => println!("{}", ConsoleFormatter::format_json(&result)),
        OutputFormat::Text => {
            if !result.primary_output.is_empty() {
                println!("{}", ConsoleFormatter::format_primary(&result));
            }
            if !cli.quiet || !result.success {
                eprint!("{}", ConsoleFormatter::format_summary(&result));
            }
        }
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Initialize logging based on verbosity level, optionally teeing into a file.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(EnvFilter::new(level))
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false);

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(Some(guard))
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    if cli.no_config {
        return Ok(ConfigLoader::load_defaults());
    }
    if let Some(path) = &cli.config
        && !path.exists()
    {
        bail!("Config file not found: {}", path.display());
    }
    ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")
}

/// Print warnings and fail on errors.
fn report_issues(config: &FileConfig) -> Result<()> {
    let issues: Vec<ConfigIssue> = config
        .validate()
        .into_iter()
        .chain(config.check_commands())
        .collect();
    for issue in issues.iter().filter(|i| !i.is_error()) {
        warn!("{}", issue.message);
    }
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error())
        .map(ToString::to_string)
        .collect();
    if !errors.is_empty() {
        bail!("Invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(())
}

/// Requested workers in request order, or the whole roster.
fn select_workers(
    roster: Vec<WorkerDescriptor>,
    requested: &[String],
) -> Result<Vec<WorkerDescriptor>> {
    if roster.is_empty() {
        bail!("No workers configured. Add [[workers]] entries to ensemble.toml.");
    }
    if requested.is_empty() {
        return Ok(roster);
    }
    requested
        .iter()
        .map(|id| {
            roster.iter().find(|w| &w.id == id).cloned().with_context(|| {
                let known: Vec<&str> = roster.iter().map(|w| w.id.as_str()).collect();
                format!("Unknown worker '{}'. Configured: {}", id, known.join(", "))
            })
        })
        .collect()
}
