// src/load_balancer/algorithm.rs
use crate::proxy::{Backend, ProxyError};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait LoadBalancer: Send + Sync {
    /// Picks one of `backends`, which the caller believes to be healthy.
    async fn select_backend(&self, backends: &[Arc<Backend>]) -> Result<Arc<Backend>, ProxyError>;

    fn name(&self) -> &'static str;
}
