//! Worker descriptors supplied by the worker roster.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder substituted with the prompt text in worker arguments.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// How to invoke one worker.
///
/// The engine itself only needs `id` and `timeout`; `command`/`args` are
/// consumed by the subprocess adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerDescriptor {
    pub id: String,
    /// Executable name or path
    pub command: String,
    /// Arguments; occurrences of `{prompt}` are replaced by the prompt
    pub args: Vec<String>,
    /// Write the prompt to stdin instead of substituting it into args
    pub prompt_via_stdin: bool,
    #[serde(with = "crate::core::serde_duration")]
    pub timeout: Duration,
    /// Spawned for one task rather than long-lived; gets the lenient breaker policy
    pub adhoc: bool,
}

impl WorkerDescriptor {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            args: vec![PROMPT_PLACEHOLDER.to_string()],
            prompt_via_stdin: false,
            timeout: Duration::from_secs(120),
            adhoc: false,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_stdin_prompt(mut self) -> Self {
        self.prompt_via_stdin = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn adhoc(mut self) -> Self {
        self.adhoc = true;
        self
    }

    /// Arguments with `{prompt}` substituted.
    ///
    /// When the prompt goes through stdin the arguments are returned as-is.
    pub fn render_args(&self, prompt: &str) -> Vec<String> {
        if self.prompt_via_stdin {
            return self.args.clone();
        }
        self.args
            .iter()
            .map(|a| a.replace(PROMPT_PLACEHOLDER, prompt))
            .collect()
    }
}
