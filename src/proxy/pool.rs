// src/proxy/pool.rs
use super::backend::Backend;
use crate::config::BackendConfig;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("backend with ID {0} already exists")]
    DuplicateId(String),

    #[error("backend with ID {0} not found")]
    NotFound(String),
}

/// Registry of backends keyed by id.
///
/// Entries are kept in registration order so that the healthy list handed to
/// the balancer has a stable shape between calls. The lock is only held while
/// the list is read or mutated, never across I/O.
#[derive(Debug, Default)]
pub struct BackendPool {
    backends: RwLock<Vec<Arc<Backend>>>,
}

impl BackendPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from configuration; ids default to `backend-<index>`.
    pub fn from_configs(configs: &[BackendConfig]) -> Result<Self, RegistryError> {
        let pool = Self::new();

        for (index, config) in configs.iter().enumerate() {
            pool.add(Arc::new(Backend::new(
                config.effective_id(index),
                config.address.clone(),
                config.port,
                config.weight,
            )))?;
        }

        Ok(pool)
    }

    pub fn add(&self, backend: Arc<Backend>) -> Result<(), RegistryError> {
        let mut backends = self.backends.write();
        if backends.iter().any(|b| b.id == backend.id) {
            return Err(RegistryError::DuplicateId(backend.id.clone()));
        }

        tracing::debug!("Added backend {} ({})", backend.id, backend.address());
        backends.push(backend);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<Arc<Backend>, RegistryError> {
        let mut backends = self.backends.write();
        let position = backends
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        tracing::debug!("Removed backend {}", id);
        Ok(backends.remove(position))
    }

    /// Replaces the entry with the same id, keeping its position.
    pub fn update(&self, backend: Arc<Backend>) -> Result<(), RegistryError> {
        let mut backends = self.backends.write();
        let slot = backends
            .iter_mut()
            .find(|b| b.id == backend.id)
            .ok_or_else(|| RegistryError::NotFound(backend.id.clone()))?;

        *slot = backend;
        Ok(())
    }

    pub fn get_backend(&self, id: &str) -> Option<Arc<Backend>> {
        self.backends.read().iter().find(|b| b.id == id).cloned()
    }

    /// Shared handles to every registered backend.
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.backends.read().clone()
    }

    /// Backends whose health flag is set at the moment of the read.
    pub fn get_healthy_backends(&self) -> Vec<Arc<Backend>> {
        self.backends
            .read()
            .iter()
            .filter(|b| b.is_healthy())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.read().is_empty()
    }

    pub fn total_active_connections(&self) -> usize {
        self.backends
            .read()
            .iter()
            .map(|b| b.active_connections())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(id: &str, port: u16) -> Arc<Backend> {
        Arc::new(Backend::new(id, "localhost", port, 1))
    }

    fn ids(backends: &[Arc<Backend>]) -> Vec<String> {
        backends.iter().map(|b| b.id.clone()).collect()
    }

    #[test]
    fn test_add_and_get_all() {
        let pool = BackendPool::new();
        pool.add(backend("b1", 3001)).unwrap();
        pool.add(backend("b2", 3002)).unwrap();
        pool.add(backend("b3", 3003)).unwrap();

        assert_eq!(pool.len(), 3);
        assert_eq!(ids(&pool.all_backends()), vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let pool = BackendPool::new();
        pool.add(backend("b1", 3001)).unwrap();

        let err = pool.add(backend("b1", 3002)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateId("b1".to_string()));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_remove() {
        let pool = BackendPool::new();
        pool.add(backend("b1", 3001)).unwrap();

        let removed = pool.remove("b1").unwrap();
        assert_eq!(removed.id, "b1");
        assert!(pool.is_empty());

        assert_eq!(
            pool.remove("b1").unwrap_err(),
            RegistryError::NotFound("b1".to_string())
        );
    }

    #[test]
    fn test_update_replaces_in_place() {
        let pool = BackendPool::new();
        pool.add(backend("b1", 3001)).unwrap();
        pool.add(backend("b2", 3002)).unwrap();

        pool.update(backend("b1", 4001)).unwrap();
        let all = pool.all_backends();
        assert_eq!(ids(&all), vec!["b1", "b2"]);
        assert_eq!(all[0].address(), "localhost:4001");

        assert_eq!(
            pool.update(backend("missing", 1)).unwrap_err(),
            RegistryError::NotFound("missing".to_string())
        );
    }

    #[test]
    fn test_healthy_filter_tracks_flag() {
        let pool = BackendPool::new();
        pool.add(backend("b1", 3001)).unwrap();
        pool.add(backend("b2", 3002)).unwrap();
        pool.add(backend("b3", 3003)).unwrap();

        assert_eq!(pool.get_healthy_backends().len(), 3);

        pool.get_backend("b2").unwrap().set_healthy(false);
        assert_eq!(ids(&pool.get_healthy_backends()), vec!["b1", "b3"]);
        assert_eq!(pool.all_backends().len(), 3);

        pool.get_backend("b2").unwrap().set_healthy(true);
        assert_eq!(ids(&pool.get_healthy_backends()), vec!["b1", "b2", "b3"]);
    }

    #[test]
    fn test_returned_handles_observe_live_state() {
        let pool = BackendPool::new();
        pool.add(backend("b1", 3001)).unwrap();

        let handle = pool.all_backends().remove(0);
        pool.get_backend("b1").unwrap().increment_connections();

        assert_eq!(handle.active_connections(), 1);
        assert_eq!(pool.total_active_connections(), 1);
    }

    #[test]
    fn test_from_configs_assigns_ids() {
        let configs = vec![
            BackendConfig {
                id: None,
                address: "127.0.0.1".to_string(),
                port: 3001,
                weight: 1,
            },
            BackendConfig {
                id: Some("named".to_string()),
                address: "127.0.0.1".to_string(),
                port: 3002,
                weight: 3,
            },
        ];

        let pool = BackendPool::from_configs(&configs).unwrap();
        let all = pool.all_backends();
        assert_eq!(ids(&all), vec!["backend-0", "named"]);
        assert_eq!(all[1].weight, 3);
    }
}
