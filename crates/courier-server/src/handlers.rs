//! Connection handlers for the Courier server.
//!
//! This module owns the socket plumbing: upgrading connections, decoding
//! inbound frames, and draining each peer's outbound queue. The relay
//! state machine itself lives in [`courier_core::RelaySession`].

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use courier_core::{Flow, PeerHandle, RelaySession, RoomRegistry};
use courier_protocol::{codec, Envelope};
use futures_util::stream::{SplitStream, StreamExt};
use futures_util::SinkExt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The room registry.
    pub registry: Arc<RoomRegistry>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            registry: Arc::new(RoomRegistry::new()),
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Courier relay listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": state.registry.room_count(),
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let (mut sender, mut receiver) = socket.split();
    let (peer, mut outbound) = PeerHandle::pair();
    let peer_id = peer.id();

    debug!(connection = %peer_id, "WebSocket connected");

    // Writer task: drains the peer's queue until every handle is dropped,
    // so envelopes queued during cleanup (collision errors, key replays)
    // still flush before the socket goes away.
    let writer = tokio::spawn(async move {
        while let Some(envelope) = outbound.recv().await {
            match codec::encode(&envelope) {
                Ok(text) => {
                    metrics::record_message(text.len(), "outbound");
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode envelope"),
            }
        }
        let _ = sender.close().await;
    });

    let mut session = RelaySession::new(Arc::clone(&state.registry), peer);
    relay(&mut receiver, &mut session, &state).await;

    debug!(connection = %peer_id, user = ?session.username(), "WebSocket disconnected");
    session.close();
    metrics::set_active_rooms(state.registry.room_count());

    // Dropping the session releases its peer handle; once the room has let
    // go of its clone too, the writer drains out and closes the socket.
    drop(session);
    let _ = writer.await;
}

/// Drive one connection's state machine: the single-shot join handshake,
/// then the relay loop.
async fn relay(
    receiver: &mut SplitStream<WebSocket>,
    session: &mut RelaySession,
    state: &Arc<AppState>,
) {
    let Some(first) = read_envelope(receiver).await else {
        return;
    };

    match session.handshake(first) {
        Ok(()) => {
            metrics::record_join();
            metrics::set_active_rooms(state.registry.room_count());
        }
        Err(e) => {
            debug!(connection = %session.peer_id(), error = %e, "Handshake refused");
            metrics::record_error("handshake");
            return;
        }
    }

    while let Some(envelope) = read_envelope(receiver).await {
        if session.dispatch(envelope) == Flow::Close {
            break;
        }
    }
}

/// Read frames until one decodes as an envelope.
///
/// Returns `None` on close, transport error, or an undecodable frame; all
/// three are fatal to the connection.
async fn read_envelope(receiver: &mut SplitStream<WebSocket>) -> Option<Envelope> {
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                metrics::record_message(text.len(), "inbound");
                return match codec::decode_str(&text) {
                    Ok(envelope) => Some(envelope),
                    Err(e) => {
                        debug!(error = %e, "Undecodable frame");
                        metrics::record_error("decode");
                        None
                    }
                };
            }
            Some(Ok(Message::Binary(data))) => {
                metrics::record_message(data.len(), "inbound");
                return match codec::decode(&data) {
                    Ok(envelope) => Some(envelope),
                    Err(e) => {
                        debug!(error = %e, "Undecodable frame");
                        metrics::record_error("decode");
                        None
                    }
                };
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                // Keepalive noise; the WebSocket layer answers pings.
            }
            Some(Ok(Message::Close(_))) => {
                debug!("Received close frame");
                return None;
            }
            Some(Err(e)) => {
                warn!(error = %e, "WebSocket error");
                metrics::record_error("websocket");
                return None;
            }
            None => {
                debug!("WebSocket stream ended");
                return None;
            }
        }
    }
}
