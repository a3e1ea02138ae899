//! JSON wire format for the realtime socket.
//!
//! Inbound (once, before admission):
//! `{"event":"connect-main"|"connect-status","payload":{"auth":"<token>"}}`
//!
//! Outbound: `{"event":"<name>","data":<payload>}`

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::Event;

use super::connection::Channel;

/// Outbound name of the one-time resource snapshot sent on status admission.
pub const STATUS_RESOURCES_SNAPSHOT: &str = "status-resources-snapshot";
/// Outbound name of the one-time database snapshot sent on status admission.
pub const STATUS_DATABASE_SNAPSHOT: &str = "status-database-snapshot";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SelectionPayload {
    #[serde(default)]
    pub auth: String,
}

/// The client's channel-selection frame.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ChannelSelection {
    ConnectMain(SelectionPayload),
    ConnectStatus(SelectionPayload),
}

impl ChannelSelection {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn channel(&self) -> Channel {
        match self {
            Self::ConnectMain(_) => Channel::Main,
            Self::ConnectStatus(_) => Channel::Status,
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Self::ConnectMain(payload) | Self::ConnectStatus(payload) => &payload.auth,
        }
    }
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    event: &'a str,
    data: &'a Value,
}

/// Encode an outbound frame once; the result is cheap to clone per socket.
pub fn encode_frame(event: &str, data: &Value) -> Result<Utf8Bytes, serde_json::Error> {
    let text = serde_json::to_string(&OutboundFrame { event, data })?;
    Ok(Utf8Bytes::from(text))
}

pub fn encode_event(event: &Event) -> Result<Utf8Bytes, serde_json::Error> {
    encode_frame(event.kind().as_str(), event.data())
}
