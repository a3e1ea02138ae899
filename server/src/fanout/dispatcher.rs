//! Fan-out Dispatcher: resolve recipients for an event and push it to each socket.
//!
//! Delivery is at-most-once and best-effort per socket. A failed push to one
//! socket never affects the others; the transport's own disconnect handling
//! reconciles the registry.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::models::UserId;
use crate::error::DispatchError;
use crate::events::toggles::FeatureToggles;
use crate::events::{Event, Scope};
use crate::ws::connection::Connection;
use crate::ws::protocol::encode_event;
use crate::ws::registry::ConnectionRegistry;

use super::directory::MembershipDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Dynamic updates are switched off for this kind.
    Disabled,
    /// `targeted` sockets were resolved; `delivered` accepted the frame.
    Delivered { targeted: usize, delivered: usize },
}

impl DispatchOutcome {
    pub fn delivered(&self) -> usize {
        match self {
            Self::Disabled => 0,
            Self::Delivered { delivered, .. } => *delivered,
        }
    }
}

pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    directory: Arc<dyn MembershipDirectory>,
    toggles: Arc<dyn FeatureToggles>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        directory: Arc<dyn MembershipDirectory>,
        toggles: Arc<dyn FeatureToggles>,
    ) -> Self {
        Self {
            registry,
            directory,
            toggles,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver one event. A membership lookup failure drops the whole
    /// dispatch without retry.
    pub async fn deliver(&self, event: &Event) -> Result<DispatchOutcome, DispatchError> {
        let kind = event.kind();
        if !self.toggles.is_event_enabled(kind) {
            tracing::debug!(kind = %kind, "Dynamic updates disabled, skipping dispatch");
            return Ok(DispatchOutcome::Disabled);
        }

        let frame = encode_event(event)?;
        let recipients = self.resolve(event.scope()).await?;

        let mut delivered = 0;
        for connection in &recipients {
            // Disconnected while recipients were being resolved.
            if connection.is_closed() {
                continue;
            }
            if connection.send_text(frame.clone()) {
                delivered += 1;
            }
        }

        tracing::debug!(
            kind = %kind,
            scope = ?event.scope(),
            targeted = recipients.len(),
            delivered,
            "Event dispatched"
        );

        Ok(DispatchOutcome::Delivered {
            targeted: recipients.len(),
            delivered,
        })
    }

    async fn resolve(&self, scope: Scope) -> Result<Vec<Connection>, DispatchError> {
        let users: BTreeSet<UserId> = match scope {
            Scope::Chat(chat_id) => self.directory.members_of(chat_id).await?.into_iter().collect(),
            Scope::User(user_id) => {
                let mut users: BTreeSet<UserId> =
                    self.directory.contacts_of(user_id).await?.into_iter().collect();
                users.insert(user_id);
                users
            }
            Scope::Status => return Ok(self.registry.status_subscribers()),
        };

        Ok(users
            .into_iter()
            .flat_map(|user_id| self.registry.sockets_for(user_id))
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::models::ChatId;
    use crate::error::DbError;
    use crate::events::toggles::ToggleTable;
    use crate::events::EventKind;
    use crate::status::cache::StatusCache;
    use crate::ws::connection::{Channel, PendingConnection};
    use async_trait::async_trait;
    use axum::extract::ws::Message;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    #[derive(Default)]
    pub(crate) struct FakeDirectory {
        pub chats: HashMap<ChatId, Vec<UserId>>,
        pub contacts: HashMap<UserId, Vec<UserId>>,
        pub fail: bool,
    }

    #[async_trait]
    impl MembershipDirectory for FakeDirectory {
        async fn members_of(&self, chat_id: ChatId) -> Result<Vec<UserId>, DbError> {
            if self.fail {
                return Err(DbError::LockPoisoned);
            }
            Ok(self.chats.get(&chat_id).cloned().unwrap_or_default())
        }

        async fn contacts_of(&self, user_id: UserId) -> Result<Vec<UserId>, DbError> {
            if self.fail {
                return Err(DbError::LockPoisoned);
            }
            Ok(self.contacts.get(&user_id).cloned().unwrap_or_default())
        }
    }

    pub(crate) fn socket(
        registry: &ConnectionRegistry,
        channel: Channel,
        user_id: UserId,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = PendingConnection::new(tx).admit(channel, user_id);
        match channel {
            Channel::Main => {
                registry.admit_main(user_id, connection, |_| {});
            }
            Channel::Status => registry.admit_status(connection),
        }
        rx
    }

    pub(crate) fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(text) = msg {
                frames.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        frames
    }

    fn fixture(directory: FakeDirectory) -> (Dispatcher, Arc<ToggleTable>) {
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(StatusCache::new())));
        let toggles = Arc::new(ToggleTable::new());
        (
            Dispatcher::new(registry, Arc::new(directory), toggles.clone()),
            toggles,
        )
    }

    fn chat_42() -> FakeDirectory {
        let mut directory = FakeDirectory::default();
        directory.chats.insert(42, vec![1, 2, 3]);
        directory
    }

    #[tokio::test]
    async fn chat_event_reaches_members_only() {
        let (dispatcher, _toggles) = fixture(chat_42());
        let registry = dispatcher.registry().clone();
        let mut member_rxs: Vec<_> = [1, 2, 3]
            .into_iter()
            .map(|user| socket(&registry, Channel::Main, user))
            .collect();
        let mut outsider_main = socket(&registry, Channel::Main, 9);
        let mut outsider_status = socket(&registry, Channel::Status, 9);
        drain(&mut outsider_status);

        let event = Event::chat(EventKind::MessageNew, 42, json!({ "id": 100 })).unwrap();
        let outcome = dispatcher.deliver(&event).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                targeted: 3,
                delivered: 3
            }
        );
        for rx in &mut member_rxs {
            assert_eq!(
                drain(rx),
                vec![json!({ "event": "message-new", "data": { "id": 100 } })]
            );
        }
        assert!(drain(&mut outsider_main).is_empty());
        assert!(drain(&mut outsider_status).is_empty());
    }

    #[tokio::test]
    async fn disabled_kind_sends_nothing() {
        let (dispatcher, toggles) = fixture(chat_42());
        let registry = dispatcher.registry().clone();
        let mut rx = socket(&registry, Channel::Main, 1);
        toggles.set(EventKind::MessageEdit, false);

        let edit = Event::chat(EventKind::MessageEdit, 42, json!({ "id": 100 })).unwrap();
        assert_eq!(
            dispatcher.deliver(&edit).await.unwrap(),
            DispatchOutcome::Disabled
        );
        assert!(drain(&mut rx).is_empty());

        let new = Event::chat(EventKind::MessageNew, 42, json!({ "id": 101 })).unwrap();
        assert_eq!(dispatcher.deliver(&new).await.unwrap().delivered(), 1);
    }

    #[tokio::test]
    async fn user_event_reaches_self_and_contacts_once() {
        let mut directory = FakeDirectory::default();
        directory.contacts.insert(7, vec![1, 2, 2, 7]);
        let (dispatcher, _toggles) = fixture(directory);
        let registry = dispatcher.registry().clone();
        let mut own_a = socket(&registry, Channel::Main, 7);
        let mut own_b = socket(&registry, Channel::Main, 7);
        let mut contact = socket(&registry, Channel::Main, 2);
        let mut stranger = socket(&registry, Channel::Main, 5);

        let event = Event::user(EventKind::UserSettingsChange, 7, json!({ "theme": "dark" })).unwrap();
        let outcome = dispatcher.deliver(&event).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                targeted: 3,
                delivered: 3
            }
        );
        assert_eq!(drain(&mut own_a).len(), 1);
        assert_eq!(drain(&mut own_b).len(), 1);
        assert_eq!(drain(&mut contact).len(), 1);
        assert!(drain(&mut stranger).is_empty());
    }

    #[tokio::test]
    async fn status_event_reaches_status_subscribers_only() {
        let (dispatcher, _toggles) = fixture(chat_42());
        let registry = dispatcher.registry().clone();
        let mut main = socket(&registry, Channel::Main, 1);
        let mut status = socket(&registry, Channel::Status, 1);
        drain(&mut status);

        let event = Event::status(EventKind::StatusResources, json!({ "cpu_percent": 3.0 })).unwrap();
        assert_eq!(dispatcher.deliver(&event).await.unwrap().delivered(), 1);

        assert!(drain(&mut main).is_empty());
        assert_eq!(
            drain(&mut status),
            vec![json!({ "event": "status-resources", "data": { "cpu_percent": 3.0 } })]
        );
    }

    #[tokio::test]
    async fn membership_failure_drops_dispatch() {
        let mut directory = chat_42();
        directory.fail = true;
        let (dispatcher, _toggles) = fixture(directory);
        let registry = dispatcher.registry().clone();
        let mut rx = socket(&registry, Channel::Main, 1);

        let event = Event::chat(EventKind::MessageDelete, 42, json!({ "id": 1 })).unwrap();
        let err = dispatcher.deliver(&event).await.unwrap_err();

        assert!(matches!(err, DispatchError::Membership(_)));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn closed_socket_does_not_block_others() {
        let (dispatcher, _toggles) = fixture(chat_42());
        let registry = dispatcher.registry().clone();
        let gone = socket(&registry, Channel::Main, 1);
        let mut alive = socket(&registry, Channel::Main, 2);
        drop(gone);

        let event = Event::chat(EventKind::ChatSettingsChange, 42, json!({ "name": "x" })).unwrap();
        let outcome = dispatcher.deliver(&event).await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Delivered {
                targeted: 2,
                delivered: 1
            }
        );
        assert_eq!(drain(&mut alive).len(), 1);
    }
}
