//! Shared helpers for integration tests: a live server on a random port and
//! small WebSocket client utilities.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use pulse_server::config::Config;
use pulse_server::db::models::{self, ChatId, UserId};
use pulse_server::state::AppState;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

pub type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub jwt_secret: Vec<u8>,
    _tmp_dir: tempfile::TempDir,
}

/// Helper: start the server on a random port with default settings.
pub async fn start_test_server() -> TestServer {
    start_test_server_with(|_| {}).await
}

/// Helper: start the server on a random port, letting the caller tweak the config.
pub async fn start_test_server_with(configure: impl FnOnce(&mut Config)) -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let mut config = Config {
        data_dir: data_dir.clone(),
        ..Config::default()
    };
    configure(&mut config);

    let db = pulse_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = pulse_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = AppState::new(db, &jwt_secret, &config);
    let app = pulse_server::routes::build_router(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        addr,
        state,
        jwt_secret,
        _tmp_dir: tmp_dir,
    }
}

impl TestServer {
    /// Create a user with an active session and return (user_id, token).
    pub async fn create_user(&self, name: &str) -> (UserId, String) {
        let name = name.to_string();
        let user_id = {
            let conn = self.state.db.lock().unwrap();
            models::create_user(&conn, &name).unwrap()
        };
        let token =
            pulse_server::auth::jwt::issue_session_token(&self.state.db, &self.jwt_secret, user_id)
                .await
                .expect("Failed to issue session token");
        (user_id, token)
    }

    /// Create a chat with a fixed id and the given members.
    pub fn create_chat_with_id(&self, chat_id: ChatId, members: &[UserId]) {
        let conn = self.state.db.lock().unwrap();
        conn.execute(
            "INSERT INTO chats (id, name, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![chat_id, "fixed chat", chrono::Utc::now().to_rfc3339()],
        )
        .unwrap();
        for member in members {
            models::add_member(&conn, chat_id, *member).unwrap();
        }
    }

    /// Create a chat and return its id.
    pub fn create_chat(&self, members: &[UserId]) -> ChatId {
        let conn = self.state.db.lock().unwrap();
        let chat_id = models::create_chat(&conn, "test chat").unwrap();
        for member in members {
            models::add_member(&conn, chat_id, *member).unwrap();
        }
        chat_id
    }

    /// Open a raw socket without selecting a channel.
    pub async fn open_socket(&self) -> WsClient {
        let ws_url = format!("ws://{}/ws", self.addr);
        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .expect("Failed to connect to WebSocket");
        ws_stream
    }

    /// Open a socket and send the channel selection ("connect-main" / "connect-status").
    pub async fn connect(&self, event: &str, token: &str) -> WsClient {
        let mut ws = self.open_socket().await;
        let selection = json!({ "event": event, "payload": { "auth": token } });
        ws.send(Message::Text(selection.to_string().into()))
            .await
            .expect("Failed to send channel selection");
        ws
    }

    /// Connect on the main channel and wait until the registry has the socket.
    pub async fn connect_main(&self, user_id: UserId, token: &str) -> WsClient {
        let before = self.state.registry.sockets_for(user_id).len();
        let ws = self.connect("connect-main", token).await;
        self.wait_until(|state| state.registry.sockets_for(user_id).len() == before + 1)
            .await;
        ws
    }

    /// Poll the shared state until `condition` holds (panics after 5s).
    pub async fn wait_until(&self, condition: impl Fn(&AppState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition(&self.state) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Timed out waiting for server state");
    }
}

/// Read the next JSON text frame, skipping control frames. Panics after 5s.
pub async fn next_json(ws: &mut WsClient) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<Value>(text.as_str()).unwrap();
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => panic!("Expected a text frame, got {:?}", other),
            }
        }
    })
    .await
    .expect("Timed out waiting for a frame")
}

/// Read frames until the server closes the socket and return the close code.
pub async fn expect_close(ws: &mut WsClient) -> u16 {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
                Some(Ok(Message::Close(None))) => panic!("Close frame without a code"),
                Some(Ok(_)) => continue,
                other => panic!("Socket ended without a close frame: {:?}", other),
            }
        }
    })
    .await
    .expect("Timed out waiting for close")
}

/// Collect every text frame that arrives before `quiet` passes with nothing new.
pub async fn drain_json(ws: &mut WsClient, quiet: Duration) -> Vec<Value> {
    let mut frames = Vec::new();
    loop {
        match tokio::time::timeout(quiet, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                frames.push(serde_json::from_str::<Value>(text.as_str()).unwrap());
            }
            Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
            _ => return frames,
        }
    }
}

/// Assert that nothing arrives on `ws` within `quiet`.
pub async fn assert_silent(ws: &mut WsClient, quiet: Duration) {
    let frames = drain_json(ws, quiet).await;
    assert!(frames.is_empty(), "Expected no frames, got {:?}", frames);
}
