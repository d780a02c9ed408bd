//! Running external programs under a deadline.
//!
//! [`ToolCommand`] spawns one child process with stdin closed and both output
//! streams captured. Every failure mode (spawn error, non-zero exit, deadline
//! expiry) comes back as [`cafconvert_core::Error::Tool`] naming the program.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use cafconvert_core::{Error, Result};
use tokio::process::Command;

const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);

/// Lines of stderr kept in error messages. ffmpeg prints its banner and
/// stream layout before the actual error, which is always at the end.
const STDERR_TAIL_LINES: usize = 8;

/// What a finished process left behind.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// One invocation of an external program.
///
/// The child is spawned with `kill_on_drop`, so a run that exceeds its
/// deadline (or whose future is dropped) never leaves the process behind.
///
/// ```no_run
/// use cafconvert_av::ToolCommand;
/// use std::time::Duration;
///
/// # async fn example() -> cafconvert_core::Result<()> {
/// let output = ToolCommand::new("ffmpeg")
///     .args(["-hide_banner", "-version"])
///     .deadline(Duration::from_secs(5))
///     .execute()
///     .await?;
/// assert!(output.stdout.starts_with("ffmpeg version"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    deadline: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Upper bound on the run time; the child is killed once it passes.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Short program name for messages: the file name of the executable.
    pub fn program_name(&self) -> String {
        match self.program.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.program.display().to_string(),
        }
    }

    /// Run to completion and capture output.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] when the program cannot be spawned, exits unsuccessfully
    /// (the message carries the tail of stderr), or runs past the deadline.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let name = self.program_name();

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::tool(&name, format!("failed to spawn: {e}")))?;

        tracing::trace!(program = %name, args = ?self.args, "Spawned tool");

        // On expiry the wait future, and the child with it, is dropped.
        let output = tokio::time::timeout(self.deadline, child.wait_with_output())
            .await
            .map_err(|_| Error::tool(&name, format!("timed out after {:?}", self.deadline)))?
            .map_err(|e| Error::tool(&name, format!("failed waiting for process: {e}")))?;

        let output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if output.status.success() {
            Ok(output)
        } else {
            Err(Error::tool(
                &name,
                format!("{}: {}", output.status, stderr_tail(&output.stderr)),
            ))
        }
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
