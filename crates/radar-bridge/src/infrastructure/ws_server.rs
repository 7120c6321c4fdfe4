//! HTTP listener: WebSocket sessions plus the health and reconnect endpoints.
//!
//! One [`axum::Router`] serves every request on the configured port:
//!
//! | Request            | Answer                                              |
//! |--------------------|-----------------------------------------------------|
//! | `GET /`, `GET /ws` | WebSocket upgrade, then one session per socket      |
//! | `GET /health`      | [`HealthReport`](crate::domain::HealthReport)       |
//! | `POST /reconnect`  | `202` when forwarded, `503` when the bridge is gone |
//! | unknown path       | `404` with a JSON body                              |
//!
//! Each session runs as one task that writes both its own replies and the
//! gateway broadcasts, so a session's frames never interleave.  Request
//! parsing, header timeouts and the upgrade handshake belong to hyper.
//!
//! On shutdown the listener stops accepting and every open session is sent a
//! close frame, so graceful shutdown never waits on an idle client.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::Gateway;
use crate::domain::{ErrorCode, ServerMessage};

type WsSink = SplitSink<WebSocket, Message>;

#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
    closing: CancellationToken,
}

#[derive(Debug, Serialize)]
struct ReconnectReply {
    accepted: bool,
}

#[derive(Debug, Serialize)]
struct NotFoundReply {
    error: &'static str,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Binds `addr` and serves until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server<F>(addr: SocketAddr, gateway: Arc<Gateway>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;

    info!("radar bridge listening on {addr}");
    serve(listener, gateway, shutdown).await
}

/// Serves the routes on an already-bound listener until `shutdown` resolves.
///
/// In-flight requests finish and open sessions are closed before this returns.
pub async fn serve<F>(listener: TcpListener, gateway: Arc<Gateway>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let closing = CancellationToken::new();
    let app = routes(AppState {
        gateway,
        closing: closing.clone(),
    })
    .into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            closing.cancel();
        })
        .await
        .context("HTTP server failed")?;
    info!("listener stopped");
    Ok(())
}

/// All routes, with the gateway as shared state.
///
/// Handlers read the peer address from [`ConnectInfo`], so the router must be
/// served with `into_make_service_with_connect_info::<SocketAddr>()`.
///
/// Sessions served through this router are only closed by their clients; use
/// [`serve`] to get sessions that end with the listener.
pub fn router(gateway: Arc<Gateway>) -> Router {
    routes(AppState {
        gateway,
        closing: CancellationToken::new(),
    })
}

fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .route("/ws", get(upgrade))
        .route("/health", get(health))
        .route("/reconnect", post(reconnect))
        .fallback(not_found)
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        match run_session(socket, peer_addr, state.gateway, state.closing).await {
            Ok(()) => debug!("connection {peer_addr} closed normally"),
            Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
        }
    })
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    ([(header::CACHE_CONTROL, "no-store")], Json(state.gateway.health()))
}

async fn reconnect(
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let accepted = state.gateway.request_reconnect();
    info!("reconnect requested by {peer_addr} (accepted: {accepted})");
    let status = if accepted {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReconnectReply { accepted }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(NotFoundReply { error: "not found" }))
}

// ── WebSocket session ─────────────────────────────────────────────────────────

/// Runs the complete lifecycle of one client session.
///
/// 1. Joins the gateway and sends the status snapshot.
/// 2. Loops over inbound frames and gateway broadcasts until either side ends
///    or the listener shuts down.
///
/// # Errors
///
/// Returns an error if a frame cannot be read or sent.
async fn run_session(
    socket: WebSocket,
    peer_addr: SocketAddr,
    gateway: Arc<Gateway>,
    closing: CancellationToken,
) -> anyhow::Result<()> {
    let session_id = Uuid::new_v4();
    info!("session {session_id} joined from {peer_addr}");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (snapshot, mut events) = gateway.join();
    send_json(&mut ws_tx, &snapshot).await?;

    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = gateway.handle_frame(text.as_str()).await {
                        send_json(&mut ws_tx, &reply).await?;
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    let reply = ServerMessage::error(
                        ErrorCode::InvalidInput,
                        "Binary frames are not supported",
                    );
                    send_json(&mut ws_tx, &reply).await?;
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("session {session_id}: client closed");
                    break;
                }
                // Ping/Pong are answered by the WebSocket layer.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(e).with_context(|| format!("session {session_id}: read failed"));
                }
            },

            event = events.recv() => match event {
                Ok(message) => send_json(&mut ws_tx, &message).await?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("session {session_id}: too slow, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },

            _ = closing.cancelled() => {
                debug!("session {session_id}: listener shutting down");
                // The client may already be gone.
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!("session {session_id} left");
    Ok(())
}

async fn send_json(ws_tx: &mut WsSink, message: &ServerMessage) -> anyhow::Result<()> {
    let text = serde_json::to_string(message).context("serialising server message")?;
    ws_tx
        .send(Message::Text(text.into()))
        .await
        .context("WebSocket send failed")?;
    Ok(())
}
