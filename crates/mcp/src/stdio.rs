// Stdio transport: line-delimited JSON-RPC over a reader/writer pair

use crate::context::Notifier;
use crate::protocol::Outgoing;
use crate::server::McpServer;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;

/// Serve requests read from `reader` until EOF, writing responses and
/// notifications to `writer` one JSON document per line.
///
/// Every request runs on its own task, so a slow tool call does not block
/// `ping` or `tools/list`. A single writer task owns `writer`, which keeps
/// lines from interleaving. On EOF, in-flight calls are drained before return.
pub async fn serve<R, W>(server: Arc<McpServer>, reader: R, writer: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tracing::info!(server = server.service().server_name(), "serving MCP on stdio");

    let (tx, rx) = mpsc::unbounded_channel::<Outgoing>();
    let writer_task = tokio::spawn(write_loop(rx, writer));
    let tracker = TaskTracker::new();

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line = line.to_string();
        let server = server.clone();
        let tx = tx.clone();
        tracker.spawn(async move {
            let notifier = Notifier::new(tx.clone());
            if let Some(response) = server.handle_message(&line, &notifier).await {
                // Only fails once the writer is gone.
                let _ = tx.send(Outgoing::Response(response));
            }
        });
    }

    tracing::info!(in_flight = tracker.len(), "input closed, draining");
    tracker.close();
    tracker.wait().await;
    drop(tx);

    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(io::Error::other(e)),
    }
}

async fn write_loop<W>(mut rx: mpsc::UnboundedReceiver<Outgoing>, mut writer: W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize outgoing message");
                continue;
            }
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
