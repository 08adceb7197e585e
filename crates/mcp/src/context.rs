// Shared handler state and per-call context

use crate::protocol::{JsonRpcNotification, Outgoing, ProgressParams};
use genmedia_core::operation::OperationPoller;
use genmedia_core::speech::SpeechClient;
use genmedia_core::storage::{MediaStager, ObjectStorage};
use genmedia_core::toolchain::MediaToolchain;
use genmedia_core::vertex::VertexClient;
use genmedia_core::{ServerConfig, ToolResult};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything a handler may reach: configuration and the clients built from it.
/// Built once at startup and shared read-only by every call.
pub struct ToolContext {
    pub config: Arc<ServerConfig>,
    pub vertex: VertexClient,
    pub speech: SpeechClient,
    pub stager: MediaStager,
    pub toolchain: MediaToolchain,
    pub poller: OperationPoller,
}

impl ToolContext {
    pub fn new(config: Arc<ServerConfig>, storage: Arc<dyn ObjectStorage>) -> ToolResult<Self> {
        Ok(Self {
            vertex: VertexClient::new(&config)?,
            speech: SpeechClient::new(&config)?,
            stager: MediaStager::new(storage),
            toolchain: MediaToolchain::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone()),
            poller: OperationPoller::new(config.poll_interval, config.operation_timeout),
            config,
        })
    }

    /// Bucket for staging local inputs: the call's own bucket, else the configured one.
    pub fn staging_bucket<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested
            .filter(|bucket| !bucket.trim().is_empty())
            .or(self.config.bucket.as_deref())
    }
}

/// Sink for server-initiated notifications. Transports without a push
/// channel use [`Notifier::disabled`] and the notifications are dropped.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Outgoing>>,
}

impl Notifier {
    pub fn new(tx: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, notification: JsonRpcNotification) {
        if let Some(tx) = &self.tx {
            // Receiver gone means the client disconnected.
            let _ = tx.send(Outgoing::Notification(notification));
        }
    }
}

/// Progress reporting for one call, active only when the caller sent a token.
#[derive(Debug, Default)]
pub struct Progress {
    token: Option<Value>,
    notifier: Notifier,
    step: AtomicU64,
}

impl Progress {
    pub fn new(token: Option<Value>, notifier: Notifier) -> Self {
        Self {
            token,
            notifier,
            step: AtomicU64::new(0),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Emit the next progress step with a status message.
    pub fn report(&self, total: Option<u64>, message: impl Into<String>) {
        let Some(token) = &self.token else {
            return;
        };
        let params = ProgressParams {
            progress_token: token.clone(),
            progress: self.step.fetch_add(1, Ordering::SeqCst) + 1,
            total,
            message: Some(message.into()),
        };
        match serde_json::to_value(params) {
            Ok(params) => self
                .notifier
                .notify(JsonRpcNotification::new("notifications/progress", params)),
            Err(e) => tracing::warn!(error = %e, "failed to encode progress"),
        }
    }
}

/// State owned by a single tool invocation.
#[derive(Debug, Default)]
pub struct CallContext {
    /// Shared with the dispatcher's timeout and any operation poller.
    pub cancel: CancellationToken,
    pub progress: Progress,
}

impl CallContext {
    pub fn new(cancel: CancellationToken, progress: Progress) -> Self {
        Self { cancel, progress }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_without_token_is_silent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = Progress::new(None, Notifier::new(tx));
        progress.report(None, "working");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_progress_steps_increase() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let progress = Progress::new(Some(Value::from("tok")), Notifier::new(tx));
        progress.report(Some(3), "submitted");
        progress.report(Some(3), "polling");

        let mut steps = Vec::new();
        while let Ok(Outgoing::Notification(note)) = rx.try_recv() {
            assert_eq!(note.method, "notifications/progress");
            let params = note.params.unwrap();
            assert_eq!(params["progressToken"], "tok");
            steps.push(params["progress"].as_u64().unwrap());
        }
        assert_eq!(steps, vec![1, 2]);
    }

    #[test]
    fn test_disabled_notifier_drops() {
        Notifier::disabled().notify(JsonRpcNotification::new("x", Value::Null));
    }
}
