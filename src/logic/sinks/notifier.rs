//! WebSocket notification sink

use async_trait::async_trait;
use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use tokio::sync::Mutex;

use crate::error::NotifyError;
use crate::models::TrafficMessage;

use super::NotificationSink;

/// Writes each message as a JSON text frame to the session's socket.
///
/// No buffering: a message that can't be written right now is dropped.
pub struct SocketNotifier<S> {
    sink: Mutex<S>,
}

impl<S> SocketNotifier<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: std::fmt::Display,
{
    pub fn new(sink: S) -> Self {
        Self { sink: Mutex::new(sink) }
    }

    /// Best-effort close frame
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            tracing::debug!("Close frame not delivered: {}", e);
        }
        if let Err(e) = sink.close().await {
            tracing::debug!("Socket close failed: {}", e);
        }
    }

    pub fn into_inner(self) -> S {
        self.sink.into_inner()
    }
}

#[async_trait]
impl<S> NotificationSink for SocketNotifier<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: std::fmt::Display,
{
    async fn notify(&self, message: &TrafficMessage) -> Result<(), NotifyError> {
        let json = serde_json::to_string(message)?;
        self.sink
            .lock()
            .await
            .send(Message::Text(json))
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))
    }
}
