//! Realtime event model.
//!
//! An [`Event`] is an immutable, transient notification derived from a state
//! change owned elsewhere (message store, chat store, user store) or from a
//! periodic status sample. The payload is opaque pass-through JSON.

pub mod toggles;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use crate::db::models::{ChatId, UserId};
use crate::error::EventError;

/// Closed set of event kinds. Serialized names are the outbound frame names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    MessageNew,
    MessageEdit,
    MessageDelete,
    ChatMembershipChange,
    ChatSettingsChange,
    UserSettingsChange,
    PresenceChange,
    StatusResources,
    StatusDatabase,
}

/// Who an event kind is addressed to, which decides recipient resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Members of the scoped chat.
    Chat,
    /// The scoped user and everyone sharing a chat with them.
    User,
    /// Every status-channel subscriber.
    Status,
}

impl EventKind {
    pub const ALL: [EventKind; 9] = [
        Self::MessageNew,
        Self::MessageEdit,
        Self::MessageDelete,
        Self::ChatMembershipChange,
        Self::ChatSettingsChange,
        Self::UserSettingsChange,
        Self::PresenceChange,
        Self::StatusResources,
        Self::StatusDatabase,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageNew => "message-new",
            Self::MessageEdit => "message-edit",
            Self::MessageDelete => "message-delete",
            Self::ChatMembershipChange => "chat-membership-change",
            Self::ChatSettingsChange => "chat-settings-change",
            Self::UserSettingsChange => "user-settings-change",
            Self::PresenceChange => "presence-change",
            Self::StatusResources => "status-resources",
            Self::StatusDatabase => "status-database",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn audience(&self) -> Audience {
        match self {
            Self::MessageNew
            | Self::MessageEdit
            | Self::MessageDelete
            | Self::ChatMembershipChange
            | Self::ChatSettingsChange => Audience::Chat,
            Self::UserSettingsChange | Self::PresenceChange => Audience::User,
            Self::StatusResources | Self::StatusDatabase => Audience::Status,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Chat(ChatId),
    User(UserId),
    /// Status events are not about any entity.
    Status,
}

impl Scope {
    pub fn audience(&self) -> Audience {
        match self {
            Self::Chat(_) => Audience::Chat,
            Self::User(_) => Audience::User,
            Self::Status => Audience::Status,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    kind: EventKind,
    scope: Scope,
    data: Value,
}

impl Event {
    /// Build an event, rejecting a scope that does not fit the kind's audience.
    pub fn new(kind: EventKind, scope: Scope, data: Value) -> Result<Self, EventError> {
        if kind.audience() != scope.audience() {
            return Err(EventError::ScopeMismatch { kind, scope });
        }
        Ok(Self { kind, scope, data })
    }

    pub fn chat(kind: EventKind, chat_id: ChatId, data: Value) -> Result<Self, EventError> {
        Self::new(kind, Scope::Chat(chat_id), data)
    }

    pub fn user(kind: EventKind, user_id: UserId, data: Value) -> Result<Self, EventError> {
        Self::new(kind, Scope::User(user_id), data)
    }

    pub fn status(kind: EventKind, data: Value) -> Result<Self, EventError> {
        Self::new(kind, Scope::Status, data)
    }

    /// Presence edge for `user_id`.
    pub fn presence(user_id: UserId, online: bool) -> Self {
        Self {
            kind: EventKind::PresenceChange,
            scope: Scope::User(user_id),
            data: json!({ "user_id": user_id, "online": online }),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}
