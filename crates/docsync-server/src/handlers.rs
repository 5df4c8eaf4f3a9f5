//! Connection handlers for the docsync server.
//!
//! This module owns the server lifecycle and the WebSocket side of the
//! relay: one task per connection, moving events between the socket and the
//! gateway.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::AppState;
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
use bytes::BytesMut;
use docsync_core::{Outbound, SessionHandle, SessionId};
use docsync_protocol::{codec, ClientEvent, EventKind, ProtocolError};
use docsync_store::{MemoryStore, PersistenceCoordinator, PgDocumentStore};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, trace, warn};

type WsSender = SplitSink<WebSocket, Message>;

/// Run the HTTP/WebSocket server until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let durable = Arc::new(PgDocumentStore::new(config.store_options()));
    let supervisor = durable.spawn_supervisor();
    let coordinator = PersistenceCoordinator::new(durable, Arc::new(MemoryStore::new()));

    let state = AppState::new(config.clone(), coordinator);
    let app = crate::app(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("docsync server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    supervisor.abort();
    info!("docsync server stopped");

    served?;
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C - initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM - initiating graceful shutdown"),
    }
}

/// WebSocket route at the configured path.
pub fn router(path: &str) -> Router<AppState> {
    Router::new().route(path, get(ws_handler))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let max_message_size = state.config.limits.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: AppState) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let SessionHandle {
        id: session,
        mut outbound,
    } = state.gateway.connect();

    debug!(session = %session, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Read buffer for partial binary frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    // Replies follow the encoding of the last inbound frame
    let mut encoding = codec::Encoding::Json;

    // Message processing loop
    loop {
        tokio::select! {
            biased;

            // Events queued for this session by the gateway
            Some(event) = outbound.recv() => {
                if send_event(&mut sender, &event, encoding).await.is_err() {
                    break;
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        encoding = codec::Encoding::Json;
                        let start = Instant::now();

                        match codec::decode_text::<ClientEvent>(&text) {
                            Ok(event) => {
                                metrics::record_event(event.kind().as_str(), text.len(), "inbound");
                                dispatch(&state, &session, event);
                            }
                            Err(e) => {
                                warn!(session = %session, error = %e, "Ignoring malformed event");
                                metrics::record_error("malformed_event");
                            }
                        }

                        metrics::record_latency(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        encoding = codec::Encoding::MessagePack;
                        let start = Instant::now();
                        read_buffer.extend_from_slice(&data);

                        // Try to decode frames
                        loop {
                            match codec::decode_from::<ClientEvent>(&mut read_buffer) {
                                Ok(Some(event)) => {
                                    metrics::record_event(event.kind().as_str(), data.len(), "inbound");
                                    dispatch(&state, &session, event);
                                }
                                Ok(None) => break,
                                Err(e @ ProtocolError::FrameTooLarge(_)) => {
                                    warn!(session = %session, error = %e, "Discarding oversized frame");
                                    metrics::record_error("malformed_event");
                                    read_buffer.clear();
                                    break;
                                }
                                Err(e) => {
                                    // The bad frame was consumed; keep reading
                                    warn!(session = %session, error = %e, "Ignoring malformed event");
                                    metrics::record_error("malformed_event");
                                }
                            }
                        }

                        metrics::record_latency(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(session = %session, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(session = %session, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(session = %session, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: leave every room and notify the remaining members
    let left = state.gateway.disconnect(&session);

    debug!(session = %session, rooms = left.len(), "WebSocket disconnected");
}

/// Hand an inbound event to the gateway. Rejected events are logged and
/// dropped; the connection stays open.
fn dispatch(state: &AppState, session: &SessionId, event: ClientEvent) {
    let kind = event.kind();

    match state.gateway.handle(session, event) {
        Ok(recipients) => {
            trace!(session = %session, event = %kind, recipients, "Event handled");
        }
        Err(e) => {
            warn!(session = %session, event = %kind, error = %e, "Event rejected");
            metrics::record_error("rejected_event");
        }
    }

    if kind == EventKind::JoinRoom {
        metrics::set_active_rooms(state.gateway.stats().registry.room_count);
    }
}

/// Send an event to the WebSocket.
async fn send_event(
    sender: &mut WsSender,
    event: &Outbound,
    encoding: codec::Encoding,
) -> Result<()> {
    let encoded = match codec::encode(&**event, encoding) {
        Ok(encoded) => encoded,
        Err(e) => {
            // Skip the event, keep the connection
            error!(event = %event.kind(), error = %e, "Failed to encode event");
            metrics::record_error("encode");
            return Ok(());
        }
    };

    metrics::record_event(event.kind().as_str(), encoded.len(), "outbound");

    let message = match encoded {
        codec::Encoded::Text(text) => Message::Text(text),
        codec::Encoded::Binary(data) => Message::Binary(data.to_vec()),
    };

    if let Err(e) = sender.send(message).await {
        error!(event = %event.kind(), error = %e, "Failed to send event");
        return Err(e.into());
    }
    Ok(())
}
