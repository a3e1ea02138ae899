use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::auth::session::JwtSessionAuthorizer;
use crate::config::{Config, RealtimeConfig, StatusConfig};
use crate::db::DbPool;
use crate::events::toggles::ToggleTable;
use crate::fanout::{Dispatcher, FanoutQueue, SqliteDirectory};
use crate::status::{StatusBroadcaster, StatusCache, SystemSampler};
use crate::ws::{ConnectionRegistry, SubscriptionGate};

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Admitted sockets per user, plus status subscribers
    pub registry: Arc<ConnectionRegistry>,
    /// Channel selection and token check for fresh sockets
    pub gate: SubscriptionGate,
    /// Ordered dispatch handle for presence, mutation and status events
    pub fanout: FanoutQueue,
    /// Last status samples, replayed to new status subscribers
    pub status_cache: Arc<StatusCache>,
    /// Per-kind dynamic update switches
    pub toggles: Arc<ToggleTable>,
    /// Socket timing
    pub realtime: RealtimeConfig,
}

impl AppState {
    /// Wire the realtime core and start the fan-out worker.
    /// Must be called from within a tokio runtime.
    pub fn new(db: DbPool, jwt_secret: &[u8], config: &Config) -> Self {
        let status_cache = Arc::new(StatusCache::new());
        let registry = Arc::new(ConnectionRegistry::new(status_cache.clone()));
        let toggles = Arc::new(ToggleTable::from_config(&config.dynamic_updates));

        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            Arc::new(SqliteDirectory::new(db.clone())),
            toggles.clone(),
        ));
        // The worker exits once every queue handle is dropped.
        let (fanout, _worker) = FanoutQueue::spawn(dispatcher);

        let gate = SubscriptionGate::new(
            Arc::new(JwtSessionAuthorizer::new(db.clone(), jwt_secret)),
            config.realtime.connect_timeout(),
        );

        Self {
            db,
            registry,
            gate,
            fanout,
            status_cache,
            toggles,
            realtime: config.realtime.clone(),
        }
    }

    /// Start the periodic resource and database feeds.
    pub fn spawn_status_broadcaster(&self, config: &StatusConfig) -> Vec<JoinHandle<()>> {
        let sampler = Arc::new(SystemSampler::new(self.db.clone(), self.registry.clone()));
        StatusBroadcaster::new(sampler, self.status_cache.clone(), self.fanout.clone())
            .spawn(config.short_interval(), config.long_interval())
    }
}
