// src/proxy/mod.rs
mod backend;
mod pool;
#[allow(clippy::module_inception)]
mod proxy;

pub use backend::{Backend, BackendMetrics, HealthStatus};
pub use pool::{BackendPool, RegistryError};
pub use proxy::{Proxy, ProxyError, BACKEND_UNAVAILABLE_MESSAGE, DEFAULT_CONNECT_TIMEOUT, NO_BACKENDS_MESSAGE};
