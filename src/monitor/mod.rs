//! Recurring aggregate health checks with auto-remediation.
//!
//! The monitor re-validates the current aggregate tool set on an interval,
//! deduplicates it when validation fails, and keeps a bounded history of
//! outcomes. The aggregate is fetched through the pluggable
//! [`AggregateSource`] seam; the registry implements it directly.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolbus::monitor::HealthMonitor;
//!
//! let monitor = HealthMonitor::new(Arc::new(registry.clone()));
//! monitor.start();
//!
//! // later
//! let stats = monitor.stats();
//! monitor.stop();
//! ```

#[allow(clippy::module_inception)]
mod monitor;

pub use monitor::{
    AggregateSource, HealthCheckResult, HealthMonitor, HealthStatus, MonitorStats,
    CHECK_INTERVAL_DEFAULT, HISTORY_MAX_DEFAULT,
};
