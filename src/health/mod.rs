// src/health/mod.rs
mod checker;

pub use checker::{CycleSummary, HealthCheckResult, HealthChecker, HealthProbe, ProbeFailure, TcpProbe};
