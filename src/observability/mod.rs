//! Observability for the service registry.
//!
//! Provides structured logging setup, request metrics and the one-time
//! monitoring registration performed when a registry is built.

mod logging;
mod metrics;
mod monitor;

pub use logging::{LogFormat, LogLevel, LoggingConfig, LOG_TARGET};
pub use metrics::{DefaultMetricsCollector, MetricsCollector, RegistryMetrics, ServiceMetrics};
pub use monitor::{RegistryInfo, RegistryMonitor, TracingMonitor};
