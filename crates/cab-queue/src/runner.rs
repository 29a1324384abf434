//! # Runners
//!
//! A runner turns a job's inputs into an artifact and a manifest on disk
//! and reports where it put them. It is free to reuse an existing artifact
//! for a fingerprint it has already computed.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ChildStdin, Command, Stdio};
use std::thread;

use cab_core::{JobId, JobInputs};
use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// What a runner is asked to compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub job_id: JobId,
    #[serde(flatten)]
    pub inputs: JobInputs,
}

/// Where the runner left its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub artifact: PathBuf,
    pub manifest: PathBuf,
}

/// Computes the artifact for a job.
///
/// Runners are called from worker threads, possibly concurrently.
pub trait Runner: Send + Sync {
    fn run(&self, request: &RunRequest) -> Result<RunOutput, RunnerError>;
}

impl<F> Runner for F
where
    F: Fn(&RunRequest) -> Result<RunOutput, RunnerError> + Send + Sync,
{
    fn run(&self, request: &RunRequest) -> Result<RunOutput, RunnerError> {
        self(request)
    }
}

/// Runs an external program once per job.
///
/// The [`RunRequest`] is written to the program's stdin as JSON; the
/// program must print a [`RunOutput`] JSON object on stdout and exit 0.
/// Anything on stderr is carried into the error when it does not.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Arguments passed to the program on every run.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Runner for CommandRunner {
    fn run(&self, request: &RunRequest) -> Result<RunOutput, RunnerError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| RunnerError::Failed(format!("cannot encode request: {e}")))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: self.program_name(),
                source,
            })?;

        // Feed stdin while stdout and stderr drain, so neither side can fill
        // a pipe and stall the other. The child is always reaped.
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || write_request(stdin, &payload));
            (child.wait_with_output(), writer.join())
        });
        let output = output?;
        written.map_err(|_| RunnerError::Panicked("stdin writer panicked".into()))??;

        if !output.status.success() {
            return Err(RunnerError::Exited {
                program: self.program_name(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            RunnerError::MalformedOutput(format!(
                "{e}; stdout was {:?}",
                String::from_utf8_lossy(&output.stdout)
            ))
        })
    }
}

fn write_request(stdin: Option<ChildStdin>, payload: &[u8]) -> io::Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };
    // A runner that never reads its input closes the pipe early.
    match stdin.write_all(payload) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}
