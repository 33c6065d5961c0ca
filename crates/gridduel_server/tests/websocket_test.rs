//! End-to-end tests over real WebSocket connections.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use gridduel_rules::{Geometry, Player, Square};
use gridduel_server::{
    Assignment, GameSession, LivenessPolicy, SessionOptions, StateSnapshot, router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn quiet_liveness() -> LivenessPolicy {
    LivenessPolicy {
        ping_interval: Duration::from_secs(60),
        max_missed_pongs: 10,
    }
}

async fn spawn_server(liveness: LivenessPolicy) -> (SocketAddr, GameSession) {
    let session = GameSession::new(Geometry::classic(), SessionOptions::default());
    let app = router(session.clone(), liveness);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, session)
}

async fn open(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    client
}

/// Next text frame that is not a liveness probe.
async fn next_text(client: &mut Client) -> String {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("socket error");
        match message {
            Message::Text(text) if text.as_str() == "ping" => continue,
            Message::Text(text) => return text.as_str().to_string(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

async fn next_snapshot_where(
    client: &mut Client,
    predicate: impl Fn(&StateSnapshot) -> bool,
) -> StateSnapshot {
    loop {
        let text = next_text(client).await;
        if let Ok(snapshot) = serde_json::from_str::<StateSnapshot>(&text)
            && predicate(&snapshot)
        {
            return snapshot;
        }
    }
}

/// Reads until the server closes, returning the close code and reason.
async fn expect_close(client: &mut Client) -> (CloseCode, String) {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("timed out waiting for close")
            .expect("stream ended before close")
            .expect("socket error");
        if let Message::Close(Some(frame)) = message {
            return (frame.code, frame.reason.as_str().to_string());
        }
    }
}

async fn join(addr: SocketAddr) -> (Client, Assignment) {
    let mut client = open(addr, "/play/socket").await;
    let assignment: Assignment = serde_json::from_str(&next_text(&mut client).await).unwrap();
    (client, assignment)
}

#[tokio::test]
async fn test_two_players_are_assigned_and_third_is_closed() {
    let (addr, _session) = spawn_server(quiet_liveness()).await;

    let (_x, x_assignment) = join(addr).await;
    assert_eq!(x_assignment.player_name, Player::X);
    let (_o, o_assignment) = join(addr).await;
    assert_eq!(o_assignment.player_name, Player::O);
    assert_ne!(x_assignment.id, o_assignment.id);

    let mut third = open(addr, "/play/socket").await;
    let (code, reason) = expect_close(&mut third).await;
    assert_eq!(code, CloseCode::Policy);
    assert_eq!(reason, "Too many players");
}

#[tokio::test]
async fn test_move_is_broadcast_to_both_players() {
    let (addr, _session) = spawn_server(quiet_liveness()).await;
    let (mut x, _) = join(addr).await;
    let (mut o, _) = join(addr).await;

    x.send(Message::text(r#"make_turn#{"x":1,"y":2}"#))
        .await
        .unwrap();

    let marked = |s: &StateSnapshot| s.field.get(1, 2) == Some(Square::Occupied(Player::X));
    let seen_by_x = next_snapshot_where(&mut x, marked).await;
    let seen_by_o = next_snapshot_where(&mut o, marked).await;
    assert_eq!(seen_by_x, seen_by_o);
    assert_eq!(seen_by_o.player_at_turn, Player::O);
}

#[tokio::test]
async fn test_disconnect_frees_identity() {
    let (addr, session) = spawn_server(quiet_liveness()).await;
    let (x, _) = join(addr).await;
    let (mut o, _) = join(addr).await;

    drop(x);
    next_snapshot_where(&mut o, |s| !s.connected_players.contains(&Player::X)).await;
    assert!(!session.snapshot().connected_players().contains(&Player::X));

    let (_again, assignment) = join(addr).await;
    assert_eq!(assignment.player_name, Player::X);
}

#[tokio::test]
async fn test_duplicate_client_id_is_closed() {
    let (addr, _session) = spawn_server(quiet_liveness()).await;
    let mut first = open(addr, "/play/socket/alice").await;
    next_text(&mut first).await;

    let mut second = open(addr, "/play/socket/alice").await;
    let (code, reason) = expect_close(&mut second).await;
    assert_eq!(code, CloseCode::Policy);
    assert_eq!(reason, "Player already exists");
}

#[tokio::test]
async fn test_unknown_action_closes_and_releases_slot() {
    let (addr, session) = spawn_server(quiet_liveness()).await;
    let (mut x, _) = join(addr).await;

    x.send(Message::text("resign#{}")).await.unwrap();
    let (code, reason) = expect_close(&mut x).await;
    assert_eq!(code, CloseCode::Policy);
    assert_eq!(reason, "Unrecognized action");
    assert!(session.snapshot().connected_players().is_empty());
}

#[tokio::test]
async fn test_silent_client_is_dropped() {
    let (addr, session) = spawn_server(LivenessPolicy {
        ping_interval: Duration::from_millis(20),
        max_missed_pongs: 2,
    })
    .await;
    let mut client = open(addr, "/play/socket").await;

    let (code, reason) = expect_close(&mut client).await;
    assert_eq!(code, CloseCode::Policy);
    assert_eq!(reason, "Too many pings missed");
    assert!(session.snapshot().connected_players().is_empty());
}

#[tokio::test]
async fn test_pong_keeps_client_attached() {
    let (addr, session) = spawn_server(LivenessPolicy {
        ping_interval: Duration::from_millis(20),
        max_missed_pongs: 2,
    })
    .await;
    let mut client = open(addr, "/play/socket").await;

    let deadline = tokio::time::Instant::now() + Duration::from_millis(400);
    while tokio::time::Instant::now() < deadline {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match message {
            Message::Text(text) if text.as_str() == "ping" => {
                client.send(Message::text("pong")).await.unwrap();
            }
            Message::Close(frame) => panic!("closed while answering pings: {frame:?}"),
            _ => {}
        }
    }
    assert!(session.snapshot().connected_players().contains(&Player::X));
}

#[tokio::test]
async fn test_echo_replies() {
    let (addr, _session) = spawn_server(quiet_liveness()).await;
    let mut client = open(addr, "/echo").await;

    client.send(Message::text("hello")).await.unwrap();
    assert_eq!(next_text(&mut client).await, "You said: hello");
}

#[tokio::test]
async fn test_health_endpoint() {
    let session = GameSession::new(Geometry::classic(), SessionOptions::default());
    let response = router(session, LivenessPolicy::default())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}
