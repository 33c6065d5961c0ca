//! WebSocket transport.
//!
//! One task per connection runs a `select!` loop over the outbound queue,
//! the inbound socket, and the liveness probe. Whatever ends the loop, the
//! player is disconnected from the session exactly once.

use crate::config::ServerConfig;
use crate::connection::ConnectionHandle;
use crate::protocol::{ClientMessage, CloseReason, PING, ProtocolError, ServerFrame};
use crate::registry::ClientId;
use crate::session::GameSession;
use axum::Router;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use gridduel_rules::Player;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Probe cadence and tolerance for silent connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    /// Interval between `ping` probes.
    pub ping_interval: Duration,
    /// Unanswered probes tolerated before the connection is dropped.
    pub max_missed_pongs: u32,
}

impl LivenessPolicy {
    /// Reads the policy from server configuration.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            max_missed_pongs: *config.max_missed_pongs(),
        }
    }
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_millis(500),
            max_missed_pongs: 10,
        }
    }
}

#[derive(Debug, Clone)]
struct AppState {
    session: GameSession,
    liveness: LivenessPolicy,
}

/// Builds the HTTP router.
///
/// - `GET /play/socket` and `GET /play/socket/{id}`: game connection
/// - `GET /echo`: echo socket for connectivity checks
/// - `GET /health`: liveness of the process itself
pub fn router(session: GameSession, liveness: LivenessPolicy) -> Router {
    Router::new()
        .route("/play/socket", get(play))
        .route("/play/socket/{id}", get(play_as))
        .route("/echo", get(echo))
        .route("/health", get(health))
        .with_state(AppState { session, liveness })
}

async fn play(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_player_socket(socket, app, None))
}

async fn play_as(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Path(id): Path<ClientId>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_player_socket(socket, app, Some(id)))
}

async fn echo(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(handle_echo_socket)
}

async fn health() -> &'static str {
    "ok"
}

/// Why a player connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConnectionExit {
    /// Client closed the socket or the stream ended.
    ClientClosed,
    /// Reading or writing the socket failed.
    SocketError,
    /// Too many probes went unanswered.
    LivenessTimeout,
    /// The client sent something outside the protocol.
    ProtocolViolation(ProtocolError),
}

impl ConnectionExit {
    fn close_reason(&self) -> Option<CloseReason> {
        match self {
            ConnectionExit::ClientClosed | ConnectionExit::SocketError => None,
            ConnectionExit::LivenessTimeout => Some(CloseReason::LivenessTimeout),
            ConnectionExit::ProtocolViolation(_) => Some(CloseReason::UnrecognizedAction),
        }
    }
}

fn close_message(reason: CloseReason) -> Message {
    Message::Close(Some(CloseFrame {
        code: reason.code(),
        reason: reason.to_string().into(),
    }))
}

#[instrument(skip(socket, app))]
async fn handle_player_socket(mut socket: WebSocket, app: AppState, client_id: Option<ClientId>) {
    let (handle, mut outbound) = ConnectionHandle::new();
    let connection = handle.id();

    let admission = match app.session.connect_player(handle, client_id) {
        Ok(admission) => admission,
        Err(e) => {
            warn!(%connection, error = %e, "Connection refused");
            if let Err(e) = socket.send(close_message(e.close_reason())).await {
                debug!(%connection, error = %e, "Close frame not delivered");
            }
            return;
        }
    };
    let player = admission.player;
    info!(%connection, %player, "Connection attached");

    let exit = run_connection(&mut socket, &mut outbound, &app.session, player, app.liveness).await;
    info!(%connection, %player, ?exit, "Connection ended");

    app.session.disconnect_player(player);
    if let Some(reason) = exit.close_reason()
        && let Err(e) = socket.send(close_message(reason)).await
    {
        debug!(%connection, error = %e, "Close frame not delivered");
    }
}

async fn run_connection(
    socket: &mut WebSocket,
    outbound: &mut UnboundedReceiver<ServerFrame>,
    session: &GameSession,
    player: Player,
    liveness: LivenessPolicy,
) -> ConnectionExit {
    let mut probe = tokio::time::interval(liveness.ping_interval);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut missed_pongs: u32 = 0;

    loop {
        tokio::select! {
            _ = probe.tick() => {
                if missed_pongs > liveness.max_missed_pongs {
                    warn!(%player, missed_pongs, "Too many pings missed");
                    return ConnectionExit::LivenessTimeout;
                }
                if socket.send(Message::Text(PING.into())).await.is_err() {
                    return ConnectionExit::SocketError;
                }
                missed_pongs += 1;
            }
            frame = outbound.recv() => match frame {
                Some(ServerFrame::Text(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        return ConnectionExit::SocketError;
                    }
                }
                None => return ConnectionExit::SocketError,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match ClientMessage::parse(text.as_str()) {
                    Ok(ClientMessage::Pong) => missed_pongs = 0,
                    Ok(ClientMessage::MakeTurn(turn)) => {
                        let result = session.apply_move(player, turn.x, turn.y);
                        debug!(%player, x = turn.x, y = turn.y, ?result, "Turn processed");
                    }
                    Err(e) => {
                        warn!(%player, error = %e, "Protocol violation");
                        return ConnectionExit::ProtocolViolation(e);
                    }
                },
                Some(Ok(Message::Close(_))) | None => return ConnectionExit::ClientClosed,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(%player, error = %e, "Socket read failed");
                    return ConnectionExit::SocketError;
                }
            },
        }
    }
}

async fn handle_echo_socket(mut socket: WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let reply = format!("You said: {}", text.as_str());
                if socket.send(Message::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}
