//! Worker roster from TOML (`[[workers]]` and `[fallback]`)

use ensemble_domain::{ConfigIssue, ConfigIssueCode, PROMPT_PLACEHOLDER, WorkerDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Raw worker entry from TOML
///
/// # Example
///
/// ```toml
/// [[workers]]
/// id = "claude"
/// command = "claude"
/// args = ["-p", "{prompt}"]
/// timeout_secs = 300
///
/// [[workers]]
/// id = "codex"
/// command = "codex"
/// args = ["exec", "-"]
/// stdin = true
///
/// [fallback]
/// id = "llm"
/// command = "llm"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileWorkerConfig {
    pub id: String,
    /// Executable; defaults to `id` when empty
    pub command: String,
    /// Arguments; `{prompt}` is replaced by the prompt text
    pub args: Vec<String>,
    /// Write the prompt to stdin instead of substituting it
    pub stdin: bool,
    /// Per-worker timeout; `[dispatch] default_timeout_secs` when unset
    pub timeout_secs: Option<u64>,
    pub adhoc: bool,
}

impl Default for FileWorkerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            command: String::new(),
            args: vec![PROMPT_PLACEHOLDER.to_string()],
            stdin: false,
            timeout_secs: None,
            adhoc: false,
        }
    }
}

impl FileWorkerConfig {
    pub fn command(&self) -> &str {
        if self.command.is_empty() {
            &self.id
        } else {
            &self.command
        }
    }

    pub fn to_descriptor(&self, default_timeout: Duration) -> WorkerDescriptor {
        let mut descriptor = WorkerDescriptor::new(&self.id, self.command())
            .with_args(self.args.clone())
            .with_timeout(
                self.timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(default_timeout),
            );
        if self.stdin {
            descriptor = descriptor.with_stdin_prompt();
        }
        if self.adhoc {
            descriptor = descriptor.adhoc();
        }
        descriptor
    }
}

/// Structural problems in the roster: empty ids, duplicate ids, zero timeouts.
pub fn roster_issues(workers: &[FileWorkerConfig]) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();

    for (index, worker) in workers.iter().enumerate() {
        if worker.id.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyWorkerId,
                format!("workers[{index}]: id cannot be empty"),
            ));
            continue;
        }
        if !seen.insert(worker.id.as_str()) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::DuplicateWorkerId {
                    id: worker.id.clone(),
                },
                format!("workers[{index}]: duplicate worker id '{}'", worker.id),
            ));
        }
        if worker.timeout_secs == Some(0) {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::OutOfRange {
                    field: format!("workers[{index}].timeout_secs"),
                },
                format!("workers[{index}].timeout_secs: must be greater than 0"),
            ));
        }
    }
    issues
}

/// Warnings for workers whose command is not on `PATH`.
pub fn missing_commands<'a>(
    workers: impl IntoIterator<Item = &'a FileWorkerConfig>,
) -> Vec<ConfigIssue> {
    workers
        .into_iter()
        .filter(|w| !w.id.trim().is_empty() && which::which(w.command()).is_err())
        .map(|w| {
            ConfigIssue::warning(
                ConfigIssueCode::CommandNotFound {
                    id: w.id.clone(),
                    command: w.command().to_string(),
                },
                format!("worker '{}': command '{}' not found on PATH", w.id, w.command()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(id: &str) -> FileWorkerConfig {
        FileWorkerConfig {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_worker_deserialize() {
        let toml_str = r#"
id = "codex"
args = ["exec", "-"]
stdin = true
timeout_secs = 300
"#;
        let file: FileWorkerConfig = toml::from_str(toml_str).unwrap();
        let desc = file.to_descriptor(Duration::from_secs(120));
        assert_eq!(desc.command, "codex");
        assert!(desc.prompt_via_stdin);
        assert_eq!(desc.timeout, Duration::from_secs(300));
        assert_eq!(desc.render_args("ignored"), vec!["exec", "-"]);
    }

    #[test]
    fn test_default_timeout_applies() {
        let desc = worker("gemini").to_descriptor(Duration::from_secs(45));
        assert_eq!(desc.timeout, Duration::from_secs(45));
        assert_eq!(desc.args, vec![PROMPT_PLACEHOLDER]);
    }

    #[test]
    fn test_roster_issues() {
        let workers = vec![worker("claude"), worker(""), worker("claude")];
        let issues = roster_issues(&workers);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].code, ConfigIssueCode::EmptyWorkerId);
        assert_eq!(
            issues[1].code,
            ConfigIssueCode::DuplicateWorkerId {
                id: "claude".to_string()
            }
        );
    }

    #[test]
    fn test_missing_commands_are_warnings() {
        let workers = vec![
            FileWorkerConfig {
                id: "shell".to_string(),
                command: "sh".to_string(),
                ..Default::default()
            },
            worker("definitely-not-an-installed-ai-cli"),
        ];
        let issues = missing_commands(&workers);
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }
}
