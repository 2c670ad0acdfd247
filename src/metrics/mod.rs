//! On-demand window statistics for dashboards.

pub mod aggregator;
pub mod service;

pub use service::{MetricsError, MetricsQuery, MetricsService};
