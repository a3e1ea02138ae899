//! Status Broadcaster: periodic sampling pushed to the status channel.
//!
//! Two independent feeds tick on their own intervals. Each tick samples,
//! caches the sample for late subscribers and dispatches it. A failed sample
//! skips that tick only.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::SampleError;
use crate::events::{Event, EventKind};
use crate::fanout::FanoutQueue;

use super::cache::StatusCache;
use super::sampler::MetricsSampler;

pub const DEFAULT_SHORT_INTERVAL: Duration = Duration::from_secs(6);
pub const DEFAULT_LONG_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFeed {
    /// Host resources, short interval.
    Resources,
    /// Store aggregates, long interval.
    Database,
}

impl StatusFeed {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Resources => EventKind::StatusResources,
            Self::Database => EventKind::StatusDatabase,
        }
    }

    async fn sample(&self, sampler: &dyn MetricsSampler) -> Result<Value, SampleError> {
        match self {
            Self::Resources => sampler.sample_resources().await,
            Self::Database => sampler.sample_database().await,
        }
    }

    fn store(&self, cache: &StatusCache, sample: Value) {
        match self {
            Self::Resources => cache.store_resources(sample),
            Self::Database => cache.store_database(sample),
        }
    }
}

#[derive(Clone)]
pub struct StatusBroadcaster {
    sampler: Arc<dyn MetricsSampler>,
    cache: Arc<StatusCache>,
    fanout: FanoutQueue,
}

impl StatusBroadcaster {
    pub fn new(sampler: Arc<dyn MetricsSampler>, cache: Arc<StatusCache>, fanout: FanoutQueue) -> Self {
        Self {
            sampler,
            cache,
            fanout,
        }
    }

    /// Start both feeds. The first tick of each fires immediately.
    pub fn spawn(self, short_interval: Duration, long_interval: Duration) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.clone().run(StatusFeed::Resources, short_interval)),
            tokio::spawn(self.run(StatusFeed::Database, long_interval)),
        ]
    }

    async fn run(self, feed: StatusFeed, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick(feed).await;
        }
    }

    /// Run one tick of `feed`. Returns whether a sample was published.
    pub async fn tick(&self, feed: StatusFeed) -> bool {
        let sample = match feed.sample(self.sampler.as_ref()).await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(feed = ?feed, error = %e, "Status sample failed, skipping tick");
                return false;
            }
        };

        feed.store(&self.cache, sample.clone());
        match Event::status(feed.kind(), sample) {
            Ok(event) => {
                self.fanout.dispatch(event);
                true
            }
            Err(e) => {
                tracing::error!(feed = ?feed, error = %e, "Failed to build status event");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::toggles::ToggleTable;
    use crate::fanout::dispatcher::tests::{drain, socket, FakeDirectory};
    use crate::fanout::Dispatcher;
    use crate::ws::connection::Channel;
    use crate::ws::registry::ConnectionRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resource sampling fails on its first call only.
    #[derive(Default)]
    struct FlakySampler {
        resource_calls: AtomicUsize,
        database_calls: AtomicUsize,
    }

    #[async_trait]
    impl MetricsSampler for FlakySampler {
        async fn sample_resources(&self) -> Result<Value, SampleError> {
            let call = self.resource_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                return Err(SampleError::Resources("top exited with status 1".to_string()));
            }
            Ok(json!({ "sample": call }))
        }

        async fn sample_database(&self) -> Result<Value, SampleError> {
            let call = self.database_calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "users": call }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_is_skipped_and_timer_keeps_running() {
        let cache = Arc::new(StatusCache::new());
        let registry = Arc::new(ConnectionRegistry::new(cache.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            Arc::new(FakeDirectory::default()),
            Arc::new(ToggleTable::new()),
        ));
        let (fanout, worker) = FanoutQueue::spawn(dispatcher);
        let mut dashboard = socket(&registry, Channel::Status, 1);
        drain(&mut dashboard);

        let sampler = Arc::new(FlakySampler::default());
        let handles = StatusBroadcaster::new(sampler.clone(), cache.clone(), fanout.clone())
            .spawn(DEFAULT_SHORT_INTERVAL, DEFAULT_LONG_INTERVAL);

        // Ticks at 0s, 6s, 12s for resources; 0s for database.
        tokio::time::sleep(Duration::from_secs(13)).await;
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
        drop(fanout);
        worker.await.unwrap();

        assert_eq!(sampler.resource_calls.load(Ordering::SeqCst), 3);
        assert_eq!(sampler.database_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.resources(), json!({ "sample": 2 }));
        assert_eq!(cache.database(), json!({ "users": 0 }));

        let frames = drain(&mut dashboard);
        let resources: Vec<_> = frames
            .iter()
            .filter(|f| f["event"] == "status-resources")
            .map(|f| f["data"].clone())
            .collect();
        let database: Vec<_> = frames
            .iter()
            .filter(|f| f["event"] == "status-database")
            .collect();
        assert_eq!(resources, vec![json!({ "sample": 1 }), json!({ "sample": 2 })]);
        assert_eq!(database.len(), 1);
    }

    #[tokio::test]
    async fn tick_reports_failure_without_touching_cache() {
        let cache = Arc::new(StatusCache::new());
        let registry = Arc::new(ConnectionRegistry::new(cache.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            Arc::new(FakeDirectory::default()),
            Arc::new(ToggleTable::new()),
        ));
        let (fanout, _worker) = FanoutQueue::spawn(dispatcher);
        let broadcaster = StatusBroadcaster::new(Arc::new(FlakySampler::default()), cache.clone(), fanout);

        assert!(!broadcaster.tick(StatusFeed::Resources).await);
        assert_eq!(cache.resources(), Value::Null);
        assert!(broadcaster.tick(StatusFeed::Resources).await);
        assert_eq!(cache.resources(), json!({ "sample": 1 }));
    }
}
