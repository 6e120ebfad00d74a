//! Live traffic WebSocket
//!
//! Each connection is one session with its own source. Outbound frames are
//! `TrafficMessage` JSON, one per observation. Anything the client sends is
//! ignored apart from a close.

use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{ws::Message, State, WebSocketUpgrade},
    response::Response,
};
use futures_util::{Sink, Stream, StreamExt};

use crate::error::SessionFatalError;
use crate::logic::router::VerdictRouter;
use crate::logic::session::{cancel_pair, CancelToken, Canceller, Pipeline, Session, SessionState};
use crate::logic::sinks::SocketNotifier;
use crate::AppState;

pub async fn traffic(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_failed_upgrade(|e: axum::Error| {
        tracing::warn!("{}", SessionFatalError::Handshake(e.to_string()))
    })
    .on_upgrade(move |socket| {
        let (sender, receiver) = socket.split();
        run_session(sender, receiver, state)
    })
}

/// Host one session over an upgraded connection until either side ends it.
pub async fn run_session<S, R, E>(sender: S, receiver: R, state: AppState)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut session = Session::connect(Arc::clone(&state.sessions), state.sources.kind());
    let session_id = session.id();
    let notifier = Arc::new(SocketNotifier::new(sender));

    let mut stream = match state.sources.open().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(session_id = %session_id, "Session could not start: {}", e);
            session.begin_close();
            notifier.close().await;
            session.finish();
            return;
        }
    };

    if let Err(e) = session.transition(SessionState::Active) {
        tracing::warn!(session_id = %session_id, "{}", e);
    }
    tracing::info!(session_id = %session_id, "Session active");

    let router = VerdictRouter::new(
        Arc::clone(&state.store),
        notifier.clone(),
        state.incidents,
        session.stats(),
    );
    let pipeline = Pipeline::new(Arc::clone(&state.classifier), router, session.stats());
    let (canceller, token) = cancel_pair();

    let (result, ()) = tokio::join!(
        async {
            let result = pipeline.run(&mut stream, token.clone()).await;
            canceller.cancel();
            result
        },
        watch_client(receiver, token.clone(), &canceller),
    );

    session.begin_close();
    match result {
        Ok(()) => tracing::info!(session_id = %session_id, "Client disconnected"),
        Err(e) => tracing::error!(session_id = %session_id, "Session ended: {}", e),
    }

    stream.close().await;
    notifier.close().await;
    session.finish();
}

/// Wait for the client to go away, then cancel the session.
async fn watch_client<R, E>(mut receiver: R, mut token: CancelToken, canceller: &Canceller)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!("WebSocket receive error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    canceller.cancel();
}
