//! Subscription Gate: Pending -> Authorizing -> Admitted | Rejected.
//!
//! A fresh socket has `connect_timeout` to send one channel-selection frame.
//! The timer is cancelled as soon as a selection arrives, whatever the
//! authorization outcome. Only the first selection counts.

use axum::extract::ws::Message;
use futures_util::{Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::SessionAuthorizer;
use crate::db::models::UserId;
use crate::error::GateRejection;

use super::connection::{Channel, PendingConnection};
use super::protocol::ChannelSelection;

/// Default time a socket may stay in `Pending`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Pending,
    Authorizing,
    Admitted,
    Rejected,
}

/// Result of a successful pass through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub channel: Channel,
    pub user_id: UserId,
}

#[derive(Clone)]
pub struct SubscriptionGate {
    authorizer: Arc<dyn SessionAuthorizer>,
    connect_timeout: Duration,
}

impl SubscriptionGate {
    pub fn new(authorizer: Arc<dyn SessionAuthorizer>, connect_timeout: Duration) -> Self {
        Self {
            authorizer,
            connect_timeout,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Drive `pending` through the gate, reading client frames from `inbound`.
    ///
    /// A disconnect observed while the authorizer is running aborts admission,
    /// and the socket is re-checked after the authorizer returns so a stale
    /// connection is never handed to the registry.
    pub async fn admit<S, E>(
        &self,
        pending: &PendingConnection,
        inbound: &mut S,
    ) -> Result<Admission, GateRejection>
    where
        S: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let conn_id = pending.id();
        let mut state = GateState::Pending;
        tracing::debug!(conn_id = %conn_id, state = ?state, "Awaiting channel selection");

        let selection =
            match tokio::time::timeout(self.connect_timeout, next_selection(pending, inbound)).await
            {
                Ok(selection) => selection?,
                Err(_) => {
                    return Err(GateRejection::Timeout(self.connect_timeout.as_millis() as u64));
                }
            };

        state = GateState::Authorizing;
        let channel = selection.channel();
        tracing::debug!(conn_id = %conn_id, channel = %channel, state = ?state, "Channel selected");

        let user_id = tokio::select! {
            result = self.authorizer.authorize(selection.token()) => result?,
            _ = wait_for_disconnect(inbound) => return Err(GateRejection::Disconnected),
        };

        if pending.is_closed() {
            return Err(GateRejection::Disconnected);
        }

        state = GateState::Admitted;
        tracing::debug!(
            conn_id = %conn_id,
            channel = %channel,
            user_id = user_id,
            state = ?state,
            "Connection admitted"
        );
        Ok(Admission { channel, user_id })
    }
}

/// Read frames until the selection arrives. Pings are answered, pongs ignored.
async fn next_selection<S, E>(
    pending: &PendingConnection,
    inbound: &mut S,
) -> Result<ChannelSelection, GateRejection>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    loop {
        match inbound.next().await {
            Some(Ok(Message::Text(text))) => {
                return ChannelSelection::parse(text.as_str())
                    .map_err(|e| GateRejection::Malformed(e.to_string()));
            }
            Some(Ok(Message::Binary(_))) => {
                return Err(GateRejection::Malformed("binary frame".to_string()));
            }
            Some(Ok(Message::Ping(data))) => pending.pong(data),
            Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) | None => return Err(GateRejection::Disconnected),
            Some(Err(e)) => {
                tracing::debug!(conn_id = %pending.id(), error = %e, "Receive error before admission");
                return Err(GateRejection::Disconnected);
            }
        }
    }
}

/// Resolves once the client goes away. Further selections are ignored.
async fn wait_for_disconnect<S, E>(inbound: &mut S)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
{
    loop {
        match inbound.next().await {
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => {}
        }
    }
}
