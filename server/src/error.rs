//! Error types for the realtime core.
//!
//! Nothing here is surfaced to clients except through a forced close during
//! admission; everything else is logged and contained.

use thiserror::Error;

use crate::db::models::UserId;
use crate::events::{EventKind, Scope};

/// Failure of a SQLite-backed collaborator call.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("blocking database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a session token was refused.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing session token")]
    MissingToken,
    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("user {0} does not exist")]
    UnknownUser(UserId),
    #[error("token does not match the active session of user {0}")]
    SessionMismatch(UserId),
    #[error("session lookup failed: {0}")]
    Backend(#[from] DbError),
}

/// Terminal failure of the subscription gate. Every variant force-closes the socket.
#[derive(Debug, Error)]
pub enum GateRejection {
    #[error("no channel selection within {0} ms")]
    Timeout(u64),
    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),
    #[error("malformed channel selection: {0}")]
    Malformed(String),
    #[error("client disconnected before admission")]
    Disconnected,
}

/// Close code sent when the selection timer fires.
pub const CLOSE_SELECTION_TIMEOUT: u16 = 4001;
/// Close code sent when the token is refused.
pub const CLOSE_UNAUTHORIZED: u16 = 4002;
/// Close code sent for an unparseable selection frame.
pub const CLOSE_MALFORMED: u16 = 4003;

impl GateRejection {
    /// Close frame to send, if the socket is still there to receive one.
    pub fn close_frame(&self) -> Option<(u16, &'static str)> {
        match self {
            Self::Timeout(_) => Some((CLOSE_SELECTION_TIMEOUT, "Channel selection timeout")),
            Self::Unauthorized(_) => Some((CLOSE_UNAUTHORIZED, "Unauthorized")),
            Self::Malformed(_) => Some((CLOSE_MALFORMED, "Malformed channel selection")),
            Self::Disconnected => None,
        }
    }

    /// Short label used as a structured logging field.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Unauthorized(_) => "unauthorized",
            Self::Malformed(_) => "malformed",
            Self::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event kind {kind} cannot be scoped to {scope:?}")]
    ScopeMismatch { kind: EventKind, scope: Scope },
}

/// A dispatch that was dropped. The triggering mutation already succeeded.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("membership lookup failed: {0}")]
    Membership(#[from] DbError),
    #[error("failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A status sample that could not be taken. The tick is skipped.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("resource sampling failed: {0}")]
    Resources(String),
    #[error("database sampling failed: {0}")]
    Database(#[from] DbError),
    #[error("failed to encode sample: {0}")]
    Encode(#[from] serde_json::Error),
}
