//! Typed external tool invocations.
//!
//! Every external process the pipeline touches (ffmpeg, ffprobe, magick) goes
//! through the [`ToolRunner`] trait, so stage logic is independent of how
//! processes are actually spawned and can be exercised in tests with scripted
//! runners instead of real binaries.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// A single external tool invocation: program name plus argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Program name or path, resolved through PATH by the runner.
    pub program: String,
    /// Arguments in order, already fully rendered.
    pub args: Vec<String>,
}

impl ToolInvocation {
    /// Create an invocation for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a path argument (rendered lossily for non-UTF-8 paths).
    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    /// Render the invocation as a single line for log output.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Exit status of a finished tool process.
///
/// `code` is `None` when the process was terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    code: Option<i32>,
}

impl ToolStatus {
    /// Status for a process that exited with the given code.
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Status for a process terminated by a signal.
    pub fn signaled() -> Self {
        Self { code: None }
    }

    /// True only for a clean zero exit.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<std::process::ExitStatus> for ToolStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Captured output of a tool run to completion.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ToolStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Capability for running external tools.
///
/// `run` is for short invocations whose full output is inspected afterwards;
/// `run_streaming` forwards stderr lines as they arrive, for long-running
/// processes whose progress is parsed live.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run the tool to completion, capturing stdout and stderr.
    async fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutput>;

    /// Run the tool while forwarding each stderr line into `lines` as it
    /// arrives. The stderr pipe is drained for the lifetime of the process
    /// even if the receiving side goes away.
    async fn run_streaming(
        &self,
        invocation: &ToolInvocation,
        lines: mpsc::Sender<String>,
    ) -> std::io::Result<ToolStatus>;
}

/// [`ToolRunner`] backed by real child processes via tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl ToolRunner for SystemRunner {
    async fn run(&self, invocation: &ToolInvocation) -> std::io::Result<ToolOutput> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(ToolOutput {
            status: ToolStatus::from(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_streaming(
        &self,
        invocation: &ToolInvocation,
        lines: mpsc::Sender<String>,
    ) -> std::io::Result<ToolStatus> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let stderr = child.stderr.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "child stderr pipe missing")
        })?;

        let mut reader = BufReader::new(stderr).lines();
        while let Some(line) = reader.next_line().await? {
            // Forward best-effort, but keep draining to EOF even if the
            // receiver is gone so the child's stderr pipe never fills up.
            let _ = lines.send(line).await;
        }

        let status = child.wait().await?;
        Ok(ToolStatus::from(status))
    }
}
