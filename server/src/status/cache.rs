//! Last-known status samples, replayed to newly admitted status subscribers.
//!
//! Written only by the status broadcaster. Both slots start as `null`.

use serde_json::Value;
use tokio::sync::watch;

#[derive(Debug)]
pub struct StatusCache {
    resources: watch::Sender<Value>,
    database: watch::Sender<Value>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self {
            resources: watch::Sender::new(Value::Null),
            database: watch::Sender::new(Value::Null),
        }
    }

    pub fn store_resources(&self, sample: Value) {
        self.resources.send_replace(sample);
    }

    pub fn store_database(&self, sample: Value) {
        self.database.send_replace(sample);
    }

    pub fn resources(&self) -> Value {
        self.resources.borrow().clone()
    }

    pub fn database(&self) -> Value {
        self.database.borrow().clone()
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_latest_sample_per_slot() {
        let cache = StatusCache::new();
        assert_eq!(cache.resources(), Value::Null);
        assert_eq!(cache.database(), Value::Null);

        cache.store_resources(json!({ "cpu_percent": 1.0 }));
        cache.store_resources(json!({ "cpu_percent": 2.0 }));
        cache.store_database(json!({ "users": 3 }));

        assert_eq!(cache.resources(), json!({ "cpu_percent": 2.0 }));
        assert_eq!(cache.database(), json!({ "users": 3 }));
    }
}
