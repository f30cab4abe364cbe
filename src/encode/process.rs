use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::foundation::error::{SlidecastError, SlidecastResult};

/// Default cap on captured stdout/stderr bytes per stream.
pub const DEFAULT_DIAGNOSTICS_LIMIT: usize = 64 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A fully specified external tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Program name used in logs and timeout errors.
    pub fn tool_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Shell-like rendering for debug logs.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for a in &self.args {
            line.push(' ');
            line.push_str(&a.to_string_lossy());
        }
        line
    }
}

/// What a finished tool run reported.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    /// Tail of the diagnostic (stderr) stream.
    pub diagnostics: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Convert a non-zero exit into [`SlidecastError::Encoding`].
    pub fn into_result(self) -> SlidecastResult<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(SlidecastError::Encoding {
                exit_code: self.exit_code,
                diagnostics: self.diagnostics.trim().to_string(),
            })
        }
    }
}

/// Synchronous "run external tool" capability. The caller blocks until the tool exits.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &ToolInvocation) -> SlidecastResult<ToolOutput>;
}

/// Spawns real child processes.
#[derive(Clone, Debug)]
pub struct SystemToolRunner {
    /// Kill the child after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    pub diagnostics_limit: usize,
}

impl Default for SystemToolRunner {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(600)),
            diagnostics_limit: DEFAULT_DIAGNOSTICS_LIMIT,
        }
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> SlidecastResult<ToolOutput> {
        let tool = invocation.tool_name();
        tracing::debug!(cmd = %invocation.display_line(), "spawning external tool");

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SlidecastError::Other(anyhow::anyhow!(
                    "failed to spawn {tool} (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to open {tool} stdout (unexpected)"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("failed to open {tool} stderr (unexpected)"))?;
        let stdout_drain = spawn_drain(stdout, self.diagnostics_limit);
        let stderr_drain = spawn_drain(stderr, self.diagnostics_limit);

        let status = match self.timeout {
            None => child
                .wait()
                .map_err(|e| anyhow::anyhow!("failed to wait for {tool} to finish: {e}"))?,
            Some(limit) => {
                let deadline = Instant::now() + limit;
                loop {
                    if let Some(status) = child
                        .try_wait()
                        .map_err(|e| anyhow::anyhow!("failed to poll {tool}: {e}"))?
                    {
                        break status;
                    }
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        tracing::warn!(tool = %tool, after_secs = limit.as_secs(), "external tool timed out, killed");
                        return Err(SlidecastError::Timeout { tool, after: limit });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        };

        let stdout = join_drain(stdout_drain, &tool)?;
        let diagnostics = join_drain(stderr_drain, &tool)?;

        Ok(ToolOutput {
            exit_code: status.code(),
            stdout,
            diagnostics,
        })
    }
}

fn spawn_drain<R: Read + Send + 'static>(
    mut reader: R,
    limit: usize,
) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut kept = Vec::new();
        let mut buf = [0u8; 8 * 1024];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            kept.extend_from_slice(&buf[..n]);
            // Keep the tail: encoders print the actionable error last.
            if kept.len() > limit {
                let excess = kept.len() - limit;
                kept.drain(..excess);
            }
        }
        Ok(kept)
    })
}

fn join_drain(handle: JoinHandle<std::io::Result<Vec<u8>>>, tool: &str) -> SlidecastResult<String> {
    let bytes = handle
        .join()
        .map_err(|_| anyhow::anyhow!("{tool} output drain thread panicked"))?
        .map_err(|e| anyhow::anyhow!("{tool} output read failed: {e}"))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Return `true` when `program -version` runs successfully.
pub fn is_tool_available(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/process.rs"]
mod tests;
