//! Operational status feeds for dashboards on the `status` channel.

pub mod broadcaster;
pub mod cache;
pub mod sampler;

pub use broadcaster::{StatusBroadcaster, StatusFeed};
pub use cache::StatusCache;
pub use sampler::{MetricsSampler, SystemSampler};
