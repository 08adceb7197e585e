//! SSE transport.
//!
//! `GET /sse` opens a session whose first event names the URL to post
//! messages to. Responses and progress notifications for that session are
//! then delivered on the stream as `message` events.

use crate::api::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use genmedia_mcp::protocol::Outgoing;
use genmedia_mcp::Notifier;
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

type SessionTx = mpsc::UnboundedSender<Outgoing>;

/// Open SSE sessions, keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionTx>>,
}

impl SessionRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SessionTx>> {
        // The map stays consistent even if a holder panicked.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open(&self) -> (Uuid, mpsc::UnboundedReceiver<Outgoing>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(id, tx);
        (id, rx)
    }

    pub fn sender(&self, id: &Uuid) -> Option<SessionTx> {
        self.lock().get(id).cloned()
    }

    pub fn close(&self, id: &Uuid) {
        self.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its session when the event stream is dropped.
struct SessionGuard {
    id: Uuid,
    registry: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.close(&self.id);
        tracing::info!(session = %self.id, "SSE session closed");
    }
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send> {
    let (id, mut rx) = state.sessions.open();
    let guard = SessionGuard {
        id,
        registry: state.sessions.clone(),
    };
    tracing::info!(session = %id, "SSE session opened");

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default()
            .event("endpoint")
            .data(format!("/message?sessionId={}", id)));

        while let Some(message) = rx.recv().await {
            match serde_json::to_string(&message) {
                Ok(json) => yield Ok(Event::default().event("message").data(json)),
                Err(e) => tracing::error!(error = %e, "failed to serialize outgoing message"),
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
}

/// Accept one message for a session. The reply arrives on the event stream.
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessageQuery>,
    body: String,
) -> StatusCode {
    let Some(tx) = state.sessions.sender(&query.session_id) else {
        tracing::warn!(session = %query.session_id, "message for unknown session");
        return StatusCode::NOT_FOUND;
    };

    let server = state.server.clone();
    tokio::spawn(async move {
        let notifier = Notifier::new(tx.clone());
        if let Some(response) = server.handle_message(&body, &notifier).await {
            // Fails only if the client disconnected meanwhile.
            let _ = tx.send(Outgoing::Response(response));
        }
    });
    StatusCode::ACCEPTED
}
