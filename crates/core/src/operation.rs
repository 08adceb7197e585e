//! Long-running remote job tracking.
//!
//! A submitted job is polled at a fixed interval until it reaches a
//! terminal state or the deadline passes. The cancellation token is shared
//! with the caller: either side may cancel, and both then report a timeout.

use crate::error::{ToolError, ToolResult};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Stand-in deadline when the configured timeout overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Outcome of a single status check.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    Running,
    Done(serde_json::Value),
    /// Terminal failure; the reason is reported verbatim.
    Failed(ToolError),
}

/// Anything that can report the status of a named job.
#[async_trait::async_trait]
pub trait OperationSource: Send + Sync {
    async fn poll(&self, operation: &str) -> ToolResult<PollStatus>;
}

/// Lifecycle of a tracked job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Submitted,
    Polling { attempt: u32 },
    Succeeded(serde_json::Value),
    Failed(ToolError),
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_) | Self::TimedOut)
    }
}

/// Drives a job from `Submitted` to a terminal state.
#[derive(Debug, Clone)]
pub struct OperationPoller {
    interval: Duration,
    timeout: Duration,
}

impl OperationPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Wait for `operation` to finish and return its response payload.
    pub async fn wait(
        &self,
        source: &dyn OperationSource,
        operation: &str,
        cancel: &CancellationToken,
    ) -> ToolResult<serde_json::Value> {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut state = JobState::Submitted;

        while !state.is_terminal() {
            state = self.step(state, source, operation, cancel, deadline).await;
            tracing::debug!(operation, state = state_label(&state), "operation state");
        }

        match state {
            JobState::Succeeded(payload) => Ok(payload),
            JobState::Failed(err) => Err(err),
            _ => {
                cancel.cancel();
                Err(ToolError::Timeout(format!(
                    "operation {} did not complete within {}s",
                    operation,
                    self.timeout.as_secs()
                )))
            }
        }
    }

    async fn step(
        &self,
        state: JobState,
        source: &dyn OperationSource,
        operation: &str,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> JobState {
        let attempt = match state {
            JobState::Submitted => 1,
            JobState::Polling { attempt } => {
                // Wait one interval, but never past the deadline.
                tokio::select! {
                    _ = cancel.cancelled() => return JobState::TimedOut,
                    _ = tokio::time::sleep_until(deadline) => return JobState::TimedOut,
                    _ = tokio::time::sleep(self.interval) => {}
                }
                attempt + 1
            }
            terminal => return terminal,
        };

        let status = tokio::select! {
            _ = cancel.cancelled() => return JobState::TimedOut,
            _ = tokio::time::sleep_until(deadline) => return JobState::TimedOut,
            status = source.poll(operation) => status,
        };

        match status {
            Ok(PollStatus::Running) => JobState::Polling { attempt },
            Ok(PollStatus::Done(payload)) => JobState::Succeeded(payload),
            Ok(PollStatus::Failed(err)) => JobState::Failed(err),
            Err(err) => JobState::Failed(err),
        }
    }
}

fn state_label(state: &JobState) -> &'static str {
    match state {
        JobState::Submitted => "submitted",
        JobState::Polling { .. } => "polling",
        JobState::Succeeded(_) => "succeeded",
        JobState::Failed(_) => "failed",
        JobState::TimedOut => "timed_out",
    }
}
