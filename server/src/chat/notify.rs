//! Dispatch hooks for chat/user mutation services.
//!
//! Call these only after the mutation has committed. Payloads are passed
//! through to clients untouched.

use serde_json::Value;

use crate::db::models::{ChatId, UserId};
use crate::events::{Event, EventKind};
use crate::fanout::FanoutQueue;

pub fn message_created(fanout: &FanoutQueue, chat_id: ChatId, message: Value) {
    chat_event(fanout, EventKind::MessageNew, chat_id, message);
}

pub fn message_edited(fanout: &FanoutQueue, chat_id: ChatId, message: Value) {
    chat_event(fanout, EventKind::MessageEdit, chat_id, message);
}

pub fn message_deleted(fanout: &FanoutQueue, chat_id: ChatId, message: Value) {
    chat_event(fanout, EventKind::MessageDelete, chat_id, message);
}

/// Members joined or left. Users removed by the change are no longer members
/// and will not receive it.
pub fn chat_membership_changed(fanout: &FanoutQueue, chat_id: ChatId, change: Value) {
    chat_event(fanout, EventKind::ChatMembershipChange, chat_id, change);
}

pub fn chat_settings_changed(fanout: &FanoutQueue, chat_id: ChatId, settings: Value) {
    chat_event(fanout, EventKind::ChatSettingsChange, chat_id, settings);
}

pub fn user_settings_changed(fanout: &FanoutQueue, user_id: UserId, settings: Value) {
    match Event::user(EventKind::UserSettingsChange, user_id, settings) {
        Ok(event) => fanout.dispatch(event),
        Err(e) => tracing::error!(error = %e, "Failed to build user event"),
    }
}

fn chat_event(fanout: &FanoutQueue, kind: EventKind, chat_id: ChatId, data: Value) {
    match Event::chat(kind, chat_id, data) {
        Ok(event) => fanout.dispatch(event),
        Err(e) => tracing::error!(error = %e, "Failed to build chat event"),
    }
}
