//! Request metrics for registry clients.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector interface.
pub trait MetricsCollector: Send + Sync {
    /// Records a call that reached the transport.
    fn record_request(&self, service: &str, success: bool, duration: Duration);

    /// Records a call rejected by an open breaker.
    fn record_rejection(&self, service: &str);

    /// Records a fallback response served in place of a failed call.
    fn record_fallback(&self, service: &str);

    /// Records a request that failed before reaching the breaker.
    fn record_preflight_failure(&self, service: &str, status_code: u16);

    /// Gets current metrics.
    fn get_metrics(&self) -> RegistryMetrics;

    /// Resets all metrics.
    fn reset(&self);
}

/// Per-service counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMetrics {
    /// Calls that reached the transport.
    pub requests: u64,
    /// Calls that failed or returned a non-success status.
    pub failures: u64,
    /// Calls rejected by the breaker.
    pub rejections: u64,
    /// Fallback responses served.
    pub fallbacks: u64,
    /// Pre-flight failures.
    pub preflight_failures: u64,
}

/// Metrics snapshot.
#[derive(Debug, Clone, Default)]
pub struct RegistryMetrics {
    /// Total calls that reached the transport.
    pub total_requests: u64,
    /// Calls that returned a success status.
    pub successful_requests: u64,
    /// Calls that failed or returned a non-success status.
    pub failed_requests: u64,
    /// Calls rejected by an open breaker.
    pub rejected_requests: u64,
    /// Fallback responses served.
    pub fallbacks_served: u64,
    /// Requests that failed before reaching the breaker.
    pub preflight_failures: u64,
    /// Total latency in milliseconds.
    pub total_latency_ms: u64,
    /// Pre-flight failures by status code.
    pub preflight_codes: HashMap<u16, u64>,
    /// Counters per service.
    pub services: HashMap<String, ServiceMetrics>,
}

impl RegistryMetrics {
    /// Calculates average latency in milliseconds.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_requests as f64
        }
    }

    /// Calculates success rate as a percentage.
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            100.0
        } else {
            (self.successful_requests as f64 / self.total_requests as f64) * 100.0
        }
    }

    /// Returns the counters of one service.
    pub fn service(&self, name: &str) -> Option<&ServiceMetrics> {
        self.services.get(name)
    }
}

/// Default metrics collector implementation.
pub struct DefaultMetricsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    rejected_requests: AtomicU64,
    fallbacks_served: AtomicU64,
    preflight_failures: AtomicU64,
    total_latency_ms: AtomicU64,
    preflight_codes: RwLock<HashMap<u16, u64>>,
    services: RwLock<HashMap<String, ServiceMetrics>>,
}

impl DefaultMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            rejected_requests: AtomicU64::new(0),
            fallbacks_served: AtomicU64::new(0),
            preflight_failures: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            preflight_codes: RwLock::new(HashMap::new()),
            services: RwLock::new(HashMap::new()),
        }
    }

    fn update_service(&self, service: &str, update: impl FnOnce(&mut ServiceMetrics)) {
        let mut services = self.services.write();
        update(services.entry(service.to_string()).or_default());
    }
}

impl Default for DefaultMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn record_request(&self, service: &str, success: bool, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.total_latency_ms.fetch_add(millis, Ordering::Relaxed);

        self.update_service(service, |m| {
            m.requests += 1;
            if !success {
                m.failures += 1;
            }
        });
    }

    fn record_rejection(&self, service: &str) {
        self.rejected_requests.fetch_add(1, Ordering::Relaxed);
        self.update_service(service, |m| m.rejections += 1);
    }

    fn record_fallback(&self, service: &str) {
        self.fallbacks_served.fetch_add(1, Ordering::Relaxed);
        self.update_service(service, |m| m.fallbacks += 1);
    }

    fn record_preflight_failure(&self, service: &str, status_code: u16) {
        self.preflight_failures.fetch_add(1, Ordering::Relaxed);
        *self.preflight_codes.write().entry(status_code).or_insert(0) += 1;
        self.update_service(service, |m| m.preflight_failures += 1);
    }

    fn get_metrics(&self) -> RegistryMetrics {
        RegistryMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
            fallbacks_served: self.fallbacks_served.load(Ordering::Relaxed),
            preflight_failures: self.preflight_failures.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::Relaxed),
            preflight_codes: self.preflight_codes.read().clone(),
            services: self.services.read().clone(),
        }
    }

    fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.rejected_requests.store(0, Ordering::Relaxed);
        self.fallbacks_served.store(0, Ordering::Relaxed);
        self.preflight_failures.store(0, Ordering::Relaxed);
        self.total_latency_ms.store(0, Ordering::Relaxed);
        self.preflight_codes.write().clear();
        self.services.write().clear();
    }
}

impl std::fmt::Debug for DefaultMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultMetricsCollector")
            .field("total_requests", &self.total_requests.load(Ordering::Relaxed))
            .field("rejected_requests", &self.rejected_requests.load(Ordering::Relaxed))
            .field("fallbacks_served", &self.fallbacks_served.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_request() {
        let collector = DefaultMetricsCollector::new();

        collector.record_request("orders", true, Duration::from_millis(100));
        collector.record_request("orders", true, Duration::from_millis(200));
        collector.record_request("billing", false, Duration::from_millis(50));

        let metrics = collector.get_metrics();
        assert_eq!(metrics.total_requests, 3);
        assert_eq!(metrics.successful_requests, 2);
        assert_eq!(metrics.failed_requests, 1);
        assert_eq!(metrics.total_latency_ms, 350);
        assert_eq!(metrics.service("orders").map(|m| m.requests), Some(2));
        assert_eq!(metrics.service("billing").map(|m| m.failures), Some(1));
    }

    #[test]
    fn test_rejections_and_fallbacks() {
        let collector = DefaultMetricsCollector::new();

        collector.record_rejection("orders");
        collector.record_rejection("orders");
        collector.record_fallback("orders");

        let metrics = collector.get_metrics();
        assert_eq!(metrics.rejected_requests, 2);
        assert_eq!(metrics.fallbacks_served, 1);
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(
            metrics.service("orders"),
            Some(&ServiceMetrics {
                rejections: 2,
                fallbacks: 1,
                ..ServiceMetrics::default()
            })
        );
    }

    #[test]
    fn test_preflight_failures_by_code() {
        let collector = DefaultMetricsCollector::new();

        collector.record_preflight_failure("orders", 998);
        collector.record_preflight_failure("orders", 998);
        collector.record_preflight_failure("billing", 999);

        let metrics = collector.get_metrics();
        assert_eq!(metrics.preflight_failures, 3);
        assert_eq!(metrics.preflight_codes.get(&998), Some(&2));
        assert_eq!(metrics.preflight_codes.get(&999), Some(&1));
    }

    #[test]
    fn test_success_rate_and_average_latency() {
        let collector = DefaultMetricsCollector::new();

        collector.record_request("orders", true, Duration::from_millis(100));
        collector.record_request("orders", false, Duration::from_millis(200));

        let metrics = collector.get_metrics();
        assert!((metrics.success_rate() - 50.0).abs() < 0.1);
        assert!((metrics.average_latency_ms() - 150.0).abs() < 0.1);
        assert!((RegistryMetrics::default().success_rate() - 100.0).abs() < 0.1);
    }

    #[test]
    fn test_reset() {
        let collector = DefaultMetricsCollector::new();

        collector.record_request("orders", true, Duration::from_millis(100));
        collector.record_fallback("orders");
        collector.record_preflight_failure("orders", 999);

        collector.reset();

        let metrics = collector.get_metrics();
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.fallbacks_served, 0);
        assert!(metrics.services.is_empty());
        assert!(metrics.preflight_codes.is_empty());
    }
}
