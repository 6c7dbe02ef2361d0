// src/health/checker.rs
use crate::config::HealthCheckConfig;
use crate::metrics::{HealthCheckOutcome, MetricsSink};
use crate::proxy::{Backend, BackendPool};
use crate::server::shutdown::wait_for_shutdown;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{interval, timeout, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ProbeFailure {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Connect(#[from] io::Error),
}

/// Decides whether a single backend is reachable right now.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, backend: &Backend) -> Result<(), ProbeFailure>;
}

/// Opens a TCP connection to the backend and closes it straight away.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpProbe;

#[async_trait]
impl HealthProbe for TcpProbe {
    async fn probe(&self, backend: &Backend) -> Result<(), ProbeFailure> {
        let stream = TcpStream::connect(backend.address()).await?;
        drop(stream);
        Ok(())
    }
}

pub struct HealthChecker {
    interval: Duration,
    timeout: Duration,
    pool: Arc<BackendPool>,
    probe: Arc<dyn HealthProbe>,
    metrics: Arc<dyn MetricsSink>,
}

#[derive(Debug)]
pub struct HealthCheckResult {
    pub backend_id: String,
    pub healthy: bool,
    /// Whether this probe flipped the backend's health flag.
    pub changed: bool,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub healthy: usize,
    pub unhealthy: usize,
}

impl HealthChecker {
    pub fn new(
        config: &HealthCheckConfig,
        pool: Arc<BackendPool>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self::with_timings(config.interval(), config.timeout(), pool, metrics)
    }

    pub fn with_timings(
        interval: Duration,
        timeout: Duration,
        pool: Arc<BackendPool>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            interval,
            timeout,
            pool,
            probe: Arc::new(TcpProbe),
            metrics,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Probes every interval until `shutdown` fires. A cycle already running
    /// when the signal arrives is allowed to finish.
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting health checker (interval: {:?}, timeout: {:?})",
            self.interval,
            self.timeout
        );

        loop {
            tokio::select! {
                biased;

                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Health checker shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    self.clone().check_all_backends().await;
                }
            }
        }
    }

    /// Probes all registered backends concurrently and waits for every probe.
    pub async fn check_all_backends(self: Arc<Self>) -> CycleSummary {
        let backends = self.pool.all_backends();

        let tasks: Vec<_> = backends
            .into_iter()
            .map(|backend| {
                let checker = self.clone();
                tokio::spawn(async move { checker.check_backend(backend).await })
            })
            .collect();

        let results = futures::future::join_all(tasks).await;

        let mut summary = CycleSummary::default();
        for result in results {
            match result {
                Ok(check_result) if check_result.healthy => summary.healthy += 1,
                Ok(_) => summary.unhealthy += 1,
                Err(e) => {
                    error!("Health check task failed: {}", e);
                    summary.unhealthy += 1;
                }
            }
        }

        debug!(
            "Health check completed: {} healthy, {} unhealthy",
            summary.healthy, summary.unhealthy
        );
        summary
    }

    async fn check_backend(&self, backend: Arc<Backend>) -> HealthCheckResult {
        let start = Instant::now();
        let address = backend.address();

        let outcome = match timeout(self.timeout, self.probe.probe(&backend)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeFailure::Timeout(self.timeout)),
        };
        let response_time_ms = start.elapsed().as_millis() as u64;

        let healthy = outcome.is_ok();
        let was_healthy = backend.set_healthy(healthy);
        let changed = was_healthy != healthy;

        let error = match outcome {
            Ok(()) => {
                debug!(
                    "Health check passed for {} in {}ms",
                    address, response_time_ms
                );
                self.metrics
                    .health_check_result(address, HealthCheckOutcome::Success);
                None
            }
            Err(e) => {
                debug!(
                    "Health check failed for {} after {}ms: {}",
                    address, response_time_ms, e
                );
                self.metrics
                    .health_check_result(address, HealthCheckOutcome::Failed);
                Some(e.to_string())
            }
        };
        self.metrics.backend_health(address, healthy);

        if changed {
            if healthy {
                info!("Backend {} ({}) recovered", backend.id, address);
            } else {
                warn!("Backend {} ({}) went down", backend.id, address);
            }
        }

        HealthCheckResult {
            backend_id: backend.id.clone(),
            healthy,
            changed,
            response_time_ms,
            error,
        }
    }
}
