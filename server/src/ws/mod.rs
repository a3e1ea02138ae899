pub mod actor;
pub mod connection;
pub mod gate;
pub mod handler;
pub mod protocol;
pub mod registry;

use tokio::sync::mpsc;

/// Sender half of a socket's outbound queue.
/// Anything that needs to push to a specific client holds a clone of this.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

pub use connection::{Channel, Connection, ConnectionId, PendingConnection};
pub use gate::{Admission, SubscriptionGate};
pub use registry::{ConnectionRegistry, PresenceEdge};
