//! Ordered dispatch pipeline.
//!
//! Mutation collaborators call [`FanoutQueue::dispatch`] after their own
//! change has committed. Events go through one worker in invocation order,
//! so every socket sees events in the order they were dispatched.
//!
//! The order is global, not per scope: a slow membership lookup for one
//! chat holds back every later event, status feeds included, until it
//! resolves. Lookups are single indexed queries against the local database.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::Event;

use super::dispatcher::{DispatchOutcome, Dispatcher};

#[derive(Clone)]
pub struct FanoutQueue {
    tx: mpsc::UnboundedSender<Event>,
}

impl FanoutQueue {
    /// Start the worker. It runs until every queue handle is dropped.
    pub fn spawn(dispatcher: Arc<Dispatcher>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(dispatcher, rx));
        (Self { tx }, worker)
    }

    /// Enqueue an event. Never blocks.
    pub fn dispatch(&self, event: Event) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(kind = %e.0.kind(), "Fan-out worker stopped, dropping event");
        }
    }
}

async fn run_worker(dispatcher: Arc<Dispatcher>, mut rx: mpsc::UnboundedReceiver<Event>) {
    while let Some(event) = rx.recv().await {
        match dispatcher.deliver(&event).await {
            Ok(DispatchOutcome::Disabled) => {
                tracing::trace!(kind = %event.kind(), "Dispatch disabled by toggle");
            }
            Ok(DispatchOutcome::Delivered { .. }) => {}
            Err(e) => {
                tracing::warn!(
                    kind = %event.kind(),
                    scope = ?event.scope(),
                    error = %e,
                    "Dropping dispatch"
                );
            }
        }
    }
    tracing::debug!("Fan-out worker stopped");
}
