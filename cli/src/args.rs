//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for aggregated results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The primary output, with a short summary on stderr
    Text,
    /// The full aggregated result as JSON
    Json,
}

/// CLI arguments for copilot-ensemble
#[derive(Parser, Debug)]
#[command(name = "copilot-ensemble")]
#[command(author, version, about = "Fan a prompt out to several AI CLI workers and aggregate the answers")]
#[command(long_about = r#"
Copilot Ensemble sends one prompt to several AI coding CLIs in parallel and
reduces their answers into one result.

Workers are guarded by per-worker circuit breakers, retried with exponential
backoff, and bounded by a pipeline deadline. Strategies:
  first_success  all_complete  voting  best_score  merge  smart_merge  consensus

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./ensemble.toml     Project-level config
3. ~/.config/copilot-ensemble/config.toml   Global config

Example:
  copilot-ensemble "Why does this test deadlock?"
  copilot-ensemble -w claude -w codex -s consensus "Review src/lib.rs"
  copilot-ensemble -s first_success --timeout 60 -o json "Summarize the diff"
"#)]
pub struct Cli {
    /// The prompt sent to every worker
    pub prompt: Option<String>,

    /// Workers to run (can be specified multiple times; default: all configured)
    #[arg(short, long, value_name = "ID")]
    pub worker: Vec<String>,

    /// Aggregation strategy
    #[arg(short, long, value_name = "NAME")]
    pub strategy: Option<String>,

    /// Maximum number of workers running at once
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Retries per worker for retryable failures
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Per-worker timeout in seconds (overrides the configured timeouts)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Similarity required for consensus (0.0 - 1.0)
    #[arg(long, value_name = "SCORE")]
    pub consensus_threshold: Option<f64>,

    /// Fall back to the configured generic worker when a worker is unavailable
    #[arg(long)]
    pub fallback: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress the summary printed with text output
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
