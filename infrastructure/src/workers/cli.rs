//! Subprocess workers
//!
//! Runs external AI CLI tools (claude, codex, gemini, ...) as child
//! processes. Each worker is described by a [`WorkerDescriptor`]; the prompt
//! is either substituted into the arguments or written to stdin.
//!
//! Children are spawned with `kill_on_drop(true)`, so when the dispatcher
//! drops an invocation future (timeout, first-success cancellation,
//! deadline) the process is killed with it.

use async_trait::async_trait;
use ensemble_application::{InvokeError, WorkerInvoker, WorkerOutput};
use ensemble_domain::{GENERIC_WORKER, WorkerDescriptor};
use std::collections::HashMap;
use std::process::{Output, Stdio};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors raised before a worker process produces an exit status
#[derive(Error, Debug)]
pub enum CliWorkerError {
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    #[error("No generic fallback worker configured")]
    NoFallback,

    #[error("Worker command not found: {0}")]
    CommandNotFound(String),

    #[error("Failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to talk to worker process: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker terminated by signal")]
    Signaled,
}

impl From<CliWorkerError> for InvokeError {
    fn from(err: CliWorkerError) -> Self {
        InvokeError::new(err.to_string())
    }
}

/// Invokes workers from a roster of subprocess descriptors.
pub struct CliWorkerInvoker {
    workers: HashMap<String, WorkerDescriptor>,
    /// Order the roster was given in
    order: Vec<String>,
    fallback: Option<WorkerDescriptor>,
}

impl CliWorkerInvoker {
    pub fn new(workers: Vec<WorkerDescriptor>) -> Self {
        let order = workers.iter().map(|w| w.id.clone()).collect();
        let workers = workers.into_iter().map(|w| (w.id.clone(), w)).collect();
        Self {
            workers,
            order,
            fallback: None,
        }
    }

    /// Descriptor used for the generic worker (`""`).
    pub fn with_fallback(mut self, fallback: WorkerDescriptor) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn descriptor(&self, worker_id: &str) -> Option<&WorkerDescriptor> {
        if worker_id == GENERIC_WORKER {
            return self.fallback.as_ref();
        }
        self.workers.get(worker_id)
    }

    /// Roster in configuration order.
    pub fn workers(&self) -> impl Iterator<Item = &WorkerDescriptor> {
        self.order.iter().filter_map(|id| self.workers.get(id))
    }

    /// Workers whose command resolves on `PATH`.
    pub fn available_workers(&self) -> Vec<&WorkerDescriptor> {
        self.workers()
            .filter(|w| which::which(&w.command).is_ok())
            .collect()
    }

    /// Workers whose command could not be found.
    pub fn unavailable_workers(&self) -> Vec<&WorkerDescriptor> {
        self.workers()
            .filter(|w| which::which(&w.command).is_err())
            .collect()
    }

    async fn run(descriptor: &WorkerDescriptor, prompt: &str) -> Result<Output, CliWorkerError> {
        let args = descriptor.render_args(prompt);
        debug!(
            "Spawning worker {}: {} ({} arg(s), stdin={})",
            descriptor.id,
            descriptor.command,
            args.len(),
            descriptor.prompt_via_stdin
        );

        let mut cmd = Command::new(&descriptor.command);
        cmd.args(&args)
            .stdin(if descriptor.prompt_via_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Linux: request kernel to send SIGTERM to child when parent dies.
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CliWorkerError::CommandNotFound(descriptor.command.clone())
            }
            _ => CliWorkerError::Spawn(e),
        })?;

        // stdin is fed while stdout/stderr drain; a child that writes before
        // reading would otherwise block on a full pipe
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        match fed {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("Worker {} closed stdin before reading the prompt", descriptor.id);
            }
            fed => fed?,
        }
        Ok(output)
    }
}

#[async_trait]
impl WorkerInvoker for CliWorkerInvoker {
    async fn invoke(&self, worker_id: &str, prompt: &str) -> Result<WorkerOutput, InvokeError> {
        let descriptor = self.descriptor(worker_id).ok_or_else(|| {
            if worker_id == GENERIC_WORKER {
                CliWorkerError::NoFallback
            } else {
                CliWorkerError::UnknownWorker(worker_id.to_string())
            }
        })?;

        let output = Self::run(descriptor, prompt).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();

        let Some(code) = output.status.code() else {
            warn!("Worker {} terminated by signal", descriptor.id);
            return Err(CliWorkerError::Signaled.into());
        };

        if code != 0 {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() { stdout } else { stderr };
            debug!("Worker {} exited with {}: {}", descriptor.id, code, message);
            return Err(InvokeError::new(message).with_exit_code(code));
        }

        Ok(WorkerOutput {
            output: stdout,
            exit_code: code,
        })
    }
}
