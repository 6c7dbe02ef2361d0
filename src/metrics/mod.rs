// src/metrics/mod.rs
mod collector;
mod server;

pub use collector::{MetricsCollector, MetricsRegistry};
pub use server::start_metrics_server;

/// Label used for connection errors not attributable to a single backend.
pub const ALL_BACKENDS: &str = "all";

pub mod reasons {
    pub const NO_HEALTHY_BACKENDS: &str = "no_healthy_backends";
    pub const BACKEND_SELECTION_FAILED: &str = "backend_selection_failed";
    pub const CONNECTION_FAILED: &str = "connection_failed";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckOutcome {
    Success,
    Failed,
}

impl HealthCheckOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthCheckOutcome::Success => "success",
            HealthCheckOutcome::Failed => "failed",
        }
    }
}

/// Fire-and-forget sink for proxy and health events. Implementations must
/// never block or fail; nothing reads these values back.
pub trait MetricsSink: Send + Sync {
    fn connection_started(&self, backend: &str);

    fn connection_active_delta(&self, backend: &str, delta: i64);

    fn connection_error(&self, backend: &str, reason: &str);

    fn connection_duration(&self, backend: &str, seconds: f64);

    fn backend_health(&self, backend: &str, healthy: bool);

    fn health_check_result(&self, backend: &str, outcome: HealthCheckOutcome);
}

/// Sink used when metrics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn connection_started(&self, _backend: &str) {}

    fn connection_active_delta(&self, _backend: &str, _delta: i64) {}

    fn connection_error(&self, _backend: &str, _reason: &str) {}

    fn connection_duration(&self, _backend: &str, _seconds: f64) {}

    fn backend_health(&self, _backend: &str, _healthy: bool) {}

    fn health_check_result(&self, _backend: &str, _outcome: HealthCheckOutcome) {}
}
