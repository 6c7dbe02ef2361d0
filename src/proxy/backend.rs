// src/proxy/backend.rs
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn from_healthy(healthy: bool) -> Self {
        if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }
}

#[derive(Debug)]
struct HealthState {
    status: HealthStatus,
    last_health_check: Option<DateTime<Utc>>,
}

/// One upstream target.
///
/// Identity and endpoint are immutable; health and connection counters are
/// guarded per backend so they never contend with registry membership changes.
#[derive(Debug)]
pub struct Backend {
    pub id: String,
    pub host: String,
    pub port: u16,
    /// Carried from configuration; round-robin selection does not consult it.
    pub weight: u32,
    address: String,

    // Runtime state
    health: RwLock<HealthState>,
    active_connections: AtomicUsize,
    total_connections: AtomicU64,
}

impl Backend {
    /// New backends start out healthy.
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16, weight: u32) -> Self {
        let host = host.into();
        let address = format!("{}:{}", host, port);

        Self {
            id: id.into(),
            host,
            port,
            weight,
            address,
            health: RwLock::new(HealthState {
                status: HealthStatus::Healthy,
                last_health_check: None,
            }),
            active_connections: AtomicUsize::new(0),
            total_connections: AtomicU64::new(0),
        }
    }

    /// Dial target in `host:port` form.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn increment_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::SeqCst);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn decrement_connections(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_sub(1)
            });
    }

    pub fn is_healthy(&self) -> bool {
        self.health.read().status.is_healthy()
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health.read().status
    }

    /// Sets the health flag and returns the previous one.
    pub fn set_healthy(&self, healthy: bool) -> bool {
        let mut state = self.health.write();
        let previous = state.status.is_healthy();
        state.status = HealthStatus::from_healthy(healthy);
        state.last_health_check = Some(Utc::now());
        previous
    }

    pub fn last_health_check(&self) -> Option<DateTime<Utc>> {
        self.health.read().last_health_check
    }

    pub fn get_metrics(&self) -> BackendMetrics {
        BackendMetrics {
            healthy: self.is_healthy(),
            active_connections: self.active_connections(),
            total_connections: self.total_connections(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendMetrics {
    pub healthy: bool,
    pub active_connections: usize,
    pub total_connections: u64,
}
