//! Console output for aggregated results

use colored::Colorize;
use ensemble_domain::core::string::preview;
use ensemble_domain::{AggregatedResult, WorkResult};

/// Formats aggregated results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// The primary output alone (stdout in text mode)
    pub fn format_primary(result: &AggregatedResult) -> String {
        result.primary_output.clone()
    }

    /// Format as JSON
    pub fn format_json(result: &AggregatedResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
    }

    /// Summary of how the result was reached (stderr in text mode)
    pub fn format_summary(result: &AggregatedResult) -> String {
        let mut output = String::new();

        let status = if !result.success {
            "FAILED".red().bold()
        } else if result.is_partial() {
            "PARTIAL".yellow().bold()
        } else {
            "OK".green().bold()
        };
        output.push_str(&format!(
            "{} {} {} ({}/{} succeeded, {:.1}s)\n",
            "──".dimmed(),
            status,
            result.strategy_used.as_str().cyan(),
            result.successful_count(),
            result.work_results.len(),
            result.execution_time.as_secs_f64()
        ));

        if let Some(winner) = &result.winning_worker_id {
            output.push_str(&format!("   {} {}\n", "winner:".dimmed(), winner));
        }

        if let Some(conflict) = &result.conflict_info {
            output.push_str(&format!(
                "   {} {} (similarity {:.2})\n",
                "conflict:".dimmed(),
                conflict.severity.as_str(),
                conflict.similarity_score
            ));
        }

        for work in &result.work_results {
            output.push_str(&Self::worker_line(work));
        }

        if let Some(error) = result.meta("error").and_then(|v| v.as_str()) {
            output.push_str(&format!("   {} {}\n", "error:".red(), error));
        }

        output
    }

    fn worker_line(work: &WorkResult) -> String {
        let mark = if work.success {
            "✓".green()
        } else {
            "✗".red()
        };
        let mut line = format!(
            "   {} {} {:.1}s",
            mark,
            work.worker_label(),
            work.execution_time.as_secs_f64()
        );
        if let Some(original) = &work.original_worker_id {
            line.push_str(&format!(" (fallback for {})", original));
        }
        if !work.success {
            line.push_str(&format!(
                " exit {}: {}",
                work.exit_code,
                preview(&work.error, 120)
            ));
        }
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_domain::{AggregationStrategy, Reduction};
    use std::time::Duration;

    fn result() -> AggregatedResult {
        let work = vec![
            WorkResult::success("claude", "answer"),
            WorkResult::failure("codex", "503 Service Unavailable\nretry later", 1),
        ];
        AggregatedResult::from_reduction(
            AggregationStrategy::AllComplete,
            Reduction::won_by(&work[0]),
            work,
            Duration::from_millis(1500),
        )
    }

    #[test]
    fn test_summary_lists_workers() {
        colored::control::set_override(false);
        let summary = ConsoleFormatter::format_summary(&result());
        assert!(summary.contains("PARTIAL all_complete (1/2 succeeded, 1.5s)"));
        assert!(summary.contains("winner: claude"));
        assert!(summary.contains("✗ codex 0.0s exit 1: 503 Service Unavailable\n"));
    }

    #[test]
    fn test_json_output() {
        let json = ConsoleFormatter::format_json(&result());
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["primary_output"], "answer");
        assert_eq!(value["strategy_used"], "all_complete");
        assert_eq!(value["work_results"].as_array().unwrap().len(), 2);
    }
}
