use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::db::models::UserId;

use super::ConnectionSender;

pub type ConnectionId = Uuid;

/// Logical socket category chosen by the client's selection frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Per-user chat traffic.
    Main,
    /// Operational dashboards.
    Status,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Status => f.write_str("status"),
        }
    }
}

/// A socket that is open but not yet admitted. Owned by the subscription gate.
#[derive(Debug)]
pub struct PendingConnection {
    id: ConnectionId,
    sender: ConnectionSender,
    opened_at: DateTime<Utc>,
}

impl PendingConnection {
    pub fn new(sender: ConnectionSender) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender,
            opened_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// The socket's writer has gone away (transport disconnect).
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn pong(&self, payload: Bytes) {
        let _ = self.sender.send(Message::Pong(payload));
    }

    /// Queue a close frame. Best effort.
    pub fn close(&self, code: u16, reason: &'static str) {
        let _ = self.sender.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })));
    }

    /// Promote to an admitted connection on `channel` for `user_id`.
    pub fn admit(self, channel: Channel, user_id: UserId) -> Connection {
        Connection {
            id: self.id,
            channel,
            user_id,
            admitted_at: Utc::now(),
            sender: self.sender,
        }
    }
}

/// An admitted socket. Cloning shares the same outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    channel: Channel,
    user_id: UserId,
    admitted_at: DateTime<Utc>,
    sender: ConnectionSender,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn admitted_at(&self) -> DateTime<Utc> {
        self.admitted_at
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queue a text frame on this socket's ordered outbound queue.
    /// Returns false when the socket has already gone away.
    pub fn send_text(&self, frame: Utf8Bytes) -> bool {
        self.sender.send(Message::Text(frame)).is_ok()
    }
}
