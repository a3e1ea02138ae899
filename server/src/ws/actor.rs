use axum::extract::ws::{CloseFrame, Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::chat::presence;
use crate::state::AppState;
use crate::ws::connection::{Channel, PendingConnection};
use crate::ws::gate::Admission;

/// Run the actor-per-connection pattern for one realtime socket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel.
///   That channel is the socket's only outbound path, so frames leave in
///   the order they were queued.
/// - Reader: first drives the subscription gate, then watches for pongs,
///   pings and the disconnect.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let pending = PendingConnection::new(tx.clone());
    let conn_id = pending.id();

    let Admission { channel, user_id } = match state.gate.admit(&pending, &mut ws_receiver).await {
        Ok(admission) => admission,
        Err(rejection) => {
            tracing::warn!(
                conn_id = %conn_id,
                reason = rejection.label(),
                pending_ms = (Utc::now() - pending.opened_at()).num_milliseconds(),
                error = %rejection,
                "Connection rejected"
            );
            if let Some((code, reason)) = rejection.close_frame() {
                pending.close(code, reason);
            }
            // Let the writer flush the close frame, then stop.
            drop(pending);
            drop(tx);
            let _ = writer_handle.await;
            return;
        }
    };

    let connection = pending.admit(channel, user_id);
    let admitted_at = connection.admitted_at();
    tracing::info!(
        conn_id = %conn_id,
        user_id = connection.user_id(),
        channel = %connection.channel(),
        "WebSocket actor started"
    );

    match channel {
        Channel::Main => presence::connect_main(&state.registry, &state.fanout, user_id, connection),
        Channel::Status => state.registry.admit_status(connection),
    }

    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Ping task: periodic pings, close when a pong does not come back in time
    let ping_tx = tx.clone();
    let ping_interval = state.realtime.ping_interval();
    let pong_timeout = state.realtime.pong_timeout();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(ping_interval);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                break;
            }

            match timeout(pong_timeout, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!(conn_id = %conn_id, "Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    // Push-only after admission
                    tracing::debug!(
                        conn_id = %conn_id,
                        "Ignoring client text after admission: {}",
                        text.chars().take(100).collect::<String>()
                    );
                }
                Message::Binary(data) => {
                    tracing::debug!(conn_id = %conn_id, bytes = data.len(), "Ignoring binary frame");
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(conn_id = %conn_id, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(conn_id = %conn_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Stop the writer first so in-flight dispatches see a closed socket.
    writer_handle.abort();
    ping_handle.abort();

    match channel {
        Channel::Main => presence::disconnect_main(&state.registry, &state.fanout, user_id, conn_id),
        Channel::Status => {
            state.registry.remove_status(conn_id);
        }
    }

    tracing::info!(
        conn_id = %conn_id,
        user_id = user_id,
        channel = %channel,
        connected_secs = (Utc::now() - admitted_at).num_seconds(),
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}
