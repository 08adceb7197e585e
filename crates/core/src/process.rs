//! External process execution with bounded output capture.

use crate::error::{ToolError, ToolResult};
use std::collections::VecDeque;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Lines of stderr kept for error reports.
pub const TAIL_LINES: usize = 20;

/// Maximum stdout retained (ffprobe JSON fits comfortably).
pub const MAX_STDOUT_BYTES: usize = 4 * 1024 * 1024;

/// Captured output of a successful process run.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    /// Last [`TAIL_LINES`] lines written to stderr.
    pub stderr_tail: Vec<String>,
}

/// Run `program` to completion.
///
/// The child is killed if the returned future is dropped, so callers can
/// bound it with a timeout or cancellation.
pub async fn run<I, S>(program: &Path, args: I) -> ToolResult<ProcessOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(program = %name, "spawning process");

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolError::DependencyMissing(format!("{} not found: {}", name, e))
        } else {
            ToolError::SubprocessFailed {
                program: name.clone(),
                status: "spawn failed".to_string(),
                tail: e.to_string(),
            }
        }
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr_tail, status) = tokio::join!(
        read_capped(stdout, MAX_STDOUT_BYTES),
        read_tail(stderr, TAIL_LINES),
        child.wait()
    );

    let status = status.map_err(|e| ToolError::SubprocessFailed {
        program: name.clone(),
        status: "wait failed".to_string(),
        tail: e.to_string(),
    })?;

    if !status.success() {
        let tail = if stderr_tail.is_empty() {
            last_lines(&stdout, TAIL_LINES).join("\n")
        } else {
            stderr_tail.join("\n")
        };
        tracing::warn!(program = %name, %status, "process failed");
        return Err(ToolError::SubprocessFailed {
            program: name,
            status: status.to_string(),
            tail,
        });
    }

    Ok(ProcessOutput {
        stdout,
        stderr_tail,
    })
}

async fn read_capped<R>(reader: Option<R>, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };
    let mut buf = Vec::new();
    let mut limited = reader.take(limit as u64);
    if let Err(e) = limited.read_to_end(&mut buf).await {
        tracing::debug!(error = %e, "stdout read interrupted");
    }
    // Drain the rest so the child never blocks on a full pipe.
    let mut rest = limited.into_inner();
    let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;
    String::from_utf8_lossy(&buf).into_owned()
}

async fn read_tail<R>(reader: Option<R>, keep: usize) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Vec::new();
    };
    let mut tail = VecDeque::with_capacity(keep);
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tail.len() == keep {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "stderr read interrupted");
                break;
            }
        }
    }
    tail.into_iter().collect()
}

fn last_lines(text: &str, keep: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(keep);
    lines[start..].iter().map(|l| l.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_binary_is_dependency_missing() {
        let err = run(Path::new("/nonexistent/bin/ffmpeg-genmedia"), ["-version"])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DependencyMissing);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_captured() {
        let output = run(&PathBuf::from("sh"), ["-c", "echo hello"]).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_keeps_only_stderr_tail() {
        let script = "i=0; while [ $i -lt 50 ]; do echo line$i >&2; i=$((i+1)); done; exit 3";
        let err = run(&PathBuf::from("sh"), ["-c", script]).await.unwrap_err();

        match err {
            ToolError::SubprocessFailed { tail, status, .. } => {
                let lines: Vec<&str> = tail.lines().collect();
                assert_eq!(lines.len(), TAIL_LINES);
                assert_eq!(lines.first(), Some(&"line30"));
                assert_eq!(lines.last(), Some(&"line49"));
                assert!(status.contains('3'));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc", 2), vec!["b", "c"]);
        assert_eq!(last_lines("a", 5), vec!["a"]);
        assert!(last_lines("", 5).is_empty());
    }
}
