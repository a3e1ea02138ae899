//! Presence tracking on top of the connection registry.
//!
//! Registry mutations report online/offline edges; this module turns each
//! edge into a `presence-change` dispatch so contacts learn about it.

use crate::db::models::UserId;
use crate::events::Event;
use crate::fanout::FanoutQueue;
use crate::ws::connection::{Connection, ConnectionId};
use crate::ws::registry::{ConnectionRegistry, PresenceEdge};

/// Register a main-channel socket and announce the user if they just came online.
pub fn connect_main(
    registry: &ConnectionRegistry,
    fanout: &FanoutQueue,
    user_id: UserId,
    connection: Connection,
) {
    registry.admit_main(user_id, connection, |edge| publish_edge(fanout, user_id, edge));
}

/// Unregister a main-channel socket and announce the user if it was their last.
pub fn disconnect_main(
    registry: &ConnectionRegistry,
    fanout: &FanoutQueue,
    user_id: UserId,
    conn_id: ConnectionId,
) {
    registry.remove_main(user_id, conn_id, |edge| publish_edge(fanout, user_id, edge));
}

// Called under the registry entry lock; enqueueing never blocks.
fn publish_edge(fanout: &FanoutQueue, user_id: UserId, edge: PresenceEdge) {
    tracing::info!(user_id = user_id, online = edge.is_online(), "Presence changed");
    fanout.dispatch(Event::presence(user_id, edge.is_online()));
}
