// src/main.rs
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tcp_load_balancer::{
    config::{self, AppConfig, Config},
    health::HealthChecker,
    load_balancer::{LoadBalancer, RoundRobinBalancer},
    metrics::{start_metrics_server, MetricsRegistry, MetricsSink, NoopMetrics},
    proxy::{BackendPool, Proxy},
    server::{shutdown::shutdown_signal, ServerBuilder},
    stats,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = config::load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    init_tracing(&config.app)?;
    info!(
        "TCP load balancer v{} starting (config: {})",
        VERSION, config_path
    );

    run(config).await
}

fn init_tracing(app: &AppConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(format!("tcp_load_balancer={}", app.log_level))
            .add_directive("hyper=info".parse()?),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if app.is_production() {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Metrics
    let metrics: Arc<dyn MetricsSink> = if config.metrics.enabled {
        let registry = Arc::new(MetricsRegistry::new()?);
        let collector = registry.collector();
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(
            metrics_addr,
            registry,
            config.metrics.path.clone(),
            shutdown_rx.clone(),
        )?;
        collector
    } else {
        info!("Metrics disabled");
        Arc::new(NoopMetrics)
    };

    // Backends
    info!("Initializing {} backend servers...", config.backends.len());
    let pool = Arc::new(BackendPool::from_configs(&config.backends)?);
    for backend in pool.all_backends() {
        info!(
            "  Backend {}: {} (weight: {})",
            backend.id,
            backend.address(),
            backend.weight
        );
    }

    let balancer: Arc<dyn LoadBalancer> = Arc::new(RoundRobinBalancer::new());
    info!("Load balancing algorithm: {}", balancer.name());

    // Health checking
    let health_checker = Arc::new(HealthChecker::new(
        &config.health_check,
        pool.clone(),
        metrics.clone(),
    ));
    let health_task = tokio::spawn(health_checker.start(shutdown_rx.clone()));

    let stats_task = tokio::spawn(stats::run_stats_reporter(
        pool.clone(),
        config.app.stats_interval(),
        shutdown_rx.clone(),
    ));

    // Listener
    let proxy = Arc::new(
        Proxy::new(pool.clone(), balancer, metrics)
            .with_connect_timeout(config.server.connect_timeout()),
    );
    let server = ServerBuilder::new(config.server.listen_address())
        .with_handler(proxy.clone())
        .with_shutdown(shutdown_rx)
        .bind()
        .await?;
    info!(
        "TCP load balancer is ready to accept connections on {}",
        server.local_addr()?
    );
    let listener_task = tokio::spawn(server.serve());

    if let Err(e) = shutdown_signal().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    warn!("Shutdown signal received, initiating graceful shutdown...");
    let _ = shutdown_tx.send(true);

    if let Err(e) = listener_task.await {
        error!("Listener task failed: {}", e);
    }

    let grace = config.server.shutdown_timeout();
    info!(
        "Waiting for active connections to complete (max {:?})...",
        grace
    );
    if drain(&proxy, grace).await {
        info!("All connections closed gracefully");
    } else {
        warn!(
            "Timeout waiting for connections to close, {} still active",
            proxy.in_flight_sessions()
        );
    }

    let _ = tokio::join!(health_task, stats_task);
    stats::log_final_stats(&pool);
    info!("TCP load balancer stopped");

    Ok(())
}

/// Polls until no accepted session remains open, or `grace` elapses.
async fn drain(proxy: &Proxy, grace: Duration) -> bool {
    let deadline = Instant::now() + grace;
    while proxy.in_flight_sessions() > 0 {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    true
}
