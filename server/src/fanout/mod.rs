//! Fan-out of realtime events to connected sockets.
//!
//! - `directory`: who belongs to a chat / who a user's contacts are
//! - `dispatcher`: toggle check, recipient resolution, best-effort sends
//! - `queue`: the ordered handle mutation services dispatch through

pub mod directory;
pub mod dispatcher;
pub mod queue;

pub use directory::{MembershipDirectory, SqliteDirectory};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use queue::FanoutQueue;
