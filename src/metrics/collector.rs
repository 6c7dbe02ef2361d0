// src/metrics/collector.rs
use super::{HealthCheckOutcome, MetricsSink};
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Prometheus text exposition of everything registered.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    connections_total: IntCounterVec,
    connections_active: IntGaugeVec,
    connection_errors: IntCounterVec,
    connection_duration_seconds: HistogramVec,
    backend_healthy: IntGaugeVec,
    health_checks_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let connections_total = IntCounterVec::new(
            Opts::new(
                "tcp_lb_connections_total",
                "Total number of TCP connections processed",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let connections_active = IntGaugeVec::new(
            Opts::new(
                "tcp_lb_connections_active",
                "Number of currently active TCP connections",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(connections_active.clone()))?;

        let connection_errors = IntCounterVec::new(
            Opts::new(
                "tcp_lb_connection_errors_total",
                "Total number of connection errors",
            ),
            &["backend", "error_type"],
        )?;
        registry.register(Box::new(connection_errors.clone()))?;

        let connection_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "tcp_lb_connection_duration_seconds",
                "Duration of TCP connections in seconds",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(connection_duration_seconds.clone()))?;

        let backend_healthy = IntGaugeVec::new(
            Opts::new(
                "tcp_lb_backend_healthy",
                "Backend health status (1 = healthy, 0 = unhealthy)",
            ),
            &["backend"],
        )?;
        registry.register(Box::new(backend_healthy.clone()))?;

        let health_checks_total = IntCounterVec::new(
            Opts::new(
                "tcp_lb_health_checks_total",
                "Total number of health checks performed",
            ),
            &["backend", "status"],
        )?;
        registry.register(Box::new(health_checks_total.clone()))?;

        Ok(Self {
            connections_total,
            connections_active,
            connection_errors,
            connection_duration_seconds,
            backend_healthy,
            health_checks_total,
        })
    }
}

impl MetricsSink for MetricsCollector {
    fn connection_started(&self, backend: &str) {
        self.connections_total.with_label_values(&[backend]).inc();
    }

    fn connection_active_delta(&self, backend: &str, delta: i64) {
        self.connections_active
            .with_label_values(&[backend])
            .add(delta);
    }

    fn connection_error(&self, backend: &str, reason: &str) {
        self.connection_errors
            .with_label_values(&[backend, reason])
            .inc();
    }

    fn connection_duration(&self, backend: &str, seconds: f64) {
        self.connection_duration_seconds
            .with_label_values(&[backend])
            .observe(seconds);
    }

    fn backend_health(&self, backend: &str, healthy: bool) {
        let value = if healthy { 1 } else { 0 };
        self.backend_healthy.with_label_values(&[backend]).set(value);
    }

    fn health_check_result(&self, backend: &str, outcome: HealthCheckOutcome) {
        self.health_checks_total
            .with_label_values(&[backend, outcome.as_str()])
            .inc();
    }
}
