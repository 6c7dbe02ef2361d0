// src/stats.rs
use crate::proxy::BackendPool;
use crate::server::shutdown::wait_for_shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub total: usize,
    pub healthy: usize,
    pub active_connections: usize,
    pub total_connections: u64,
}

impl PoolSnapshot {
    pub fn capture(pool: &BackendPool) -> Self {
        let backends = pool.all_backends();
        let mut snapshot = Self {
            total: backends.len(),
            healthy: 0,
            active_connections: 0,
            total_connections: 0,
        };

        for backend in &backends {
            let metrics = backend.get_metrics();
            if metrics.healthy {
                snapshot.healthy += 1;
            }
            snapshot.active_connections += metrics.active_connections;
            snapshot.total_connections += metrics.total_connections;
        }

        snapshot
    }

    pub fn unhealthy(&self) -> usize {
        self.total - self.healthy
    }
}

pub fn log_stats(pool: &BackendPool) {
    let snapshot = PoolSnapshot::capture(pool);
    info!(
        "Statistics: Total Backends: {}, Healthy: {}, Unhealthy: {}",
        snapshot.total,
        snapshot.healthy,
        snapshot.unhealthy()
    );

    for backend in pool.all_backends() {
        let status = if backend.is_healthy() { "OK" } else { "NOT OK" };
        info!(
            "  {} {} - Active connections: {}",
            status,
            backend.address(),
            backend.active_connections()
        );
    }
}

pub fn log_final_stats(pool: &BackendPool) {
    let snapshot = PoolSnapshot::capture(pool);
    info!("Final Statistics:");
    info!("  Total connections processed: {}", snapshot.total_connections);

    for backend in pool.all_backends() {
        info!(
            "  Backend {}: {} active connections",
            backend.address(),
            backend.active_connections()
        );
    }
}

/// Logs pool statistics every `period` until `shutdown` fires.
pub async fn run_stats_reporter(
    pool: Arc<BackendPool>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => return,
            _ = ticker.tick() => log_stats(&pool),
        }
    }
}
