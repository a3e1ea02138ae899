use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use sysinfo::System;

use crate::db::models::{self, TableCounts};
use crate::db::{run_blocking, DbPool};
use crate::error::SampleError;
use crate::ws::registry::{ConnectionCounts, ConnectionRegistry};

/// Source of operational metrics for the status feeds.
#[async_trait]
pub trait MetricsSampler: Send + Sync {
    async fn sample_resources(&self) -> Result<Value, SampleError>;
    async fn sample_database(&self) -> Result<Value, SampleError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceMetrics {
    pub cpu_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    /// 1, 5 and 15 minute load averages
    pub load_average: [f64; 3],
    pub uptime_secs: u64,
    pub sampled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseMetrics {
    #[serde(flatten)]
    pub tables: TableCounts,
    pub connections: ConnectionCounts,
    pub sampled_at: DateTime<Utc>,
}

/// Samples the host with `sysinfo` and the store with row counts.
pub struct SystemSampler {
    db: DbPool,
    registry: Arc<ConnectionRegistry>,
    // Kept across ticks so CPU usage is measured between consecutive samples.
    system: Arc<Mutex<System>>,
}

impl SystemSampler {
    pub fn new(db: DbPool, registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            db,
            registry,
            system: Arc::new(Mutex::new(System::new())),
        }
    }
}

#[async_trait]
impl MetricsSampler for SystemSampler {
    async fn sample_resources(&self) -> Result<Value, SampleError> {
        let system = self.system.clone();
        let metrics = tokio::task::spawn_blocking(move || {
            let mut system = system
                .lock()
                .map_err(|_| SampleError::Resources("sampler lock poisoned".to_string()))?;
            system.refresh_cpu_usage();
            system.refresh_memory();
            let load = System::load_average();
            Ok::<_, SampleError>(ResourceMetrics {
                cpu_percent: system.global_cpu_usage(),
                memory_used_bytes: system.used_memory(),
                memory_total_bytes: system.total_memory(),
                load_average: [load.one, load.five, load.fifteen],
                uptime_secs: System::uptime(),
                sampled_at: Utc::now(),
            })
        })
        .await
        .map_err(|e| SampleError::Resources(e.to_string()))??;

        Ok(serde_json::to_value(metrics)?)
    }

    async fn sample_database(&self) -> Result<Value, SampleError> {
        let tables = run_blocking(&self.db, models::table_counts).await?;
        let metrics = DatabaseMetrics {
            tables,
            connections: self.registry.counts(),
            sampled_at: Utc::now(),
        };
        Ok(serde_json::to_value(metrics)?)
    }
}
