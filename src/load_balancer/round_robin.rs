// src/load_balancer/round_robin.rs
use crate::load_balancer::LoadBalancer;
use crate::proxy::{Backend, ProxyError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Uniform round-robin over whatever candidate list the caller passes in.
///
/// The cursor is an ever-increasing counter, reduced modulo the list length on
/// each call. It is not tied to backend identity: if the candidate list changes
/// shape between calls the next pick is simply `cursor % new_len`.
#[derive(Debug, Default)]
pub struct RoundRobinBalancer {
    counter: AtomicUsize,
}

impl RoundRobinBalancer {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LoadBalancer for RoundRobinBalancer {
    async fn select_backend(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, ProxyError> {
        if backends.is_empty() {
            return Err(ProxyError::NoBackendsAvailable);
        }

        let index = self.counter.fetch_add(1, Ordering::SeqCst) % backends.len();
        Ok(backends[index].clone())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
