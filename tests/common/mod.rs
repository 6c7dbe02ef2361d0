// tests/common/mod.rs
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tcp_load_balancer::load_balancer::RoundRobinBalancer;
use tcp_load_balancer::metrics::{HealthCheckOutcome, MetricsSink};
use tcp_load_balancer::proxy::{BackendPool, Proxy};
use tcp_load_balancer::server::ServerBuilder;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq)]
pub enum MetricEvent {
    Started(String),
    ActiveDelta(String, i64),
    Error(String, String),
    Duration(String),
    Health(String, bool),
    Check(String, HealthCheckOutcome),
}

#[derive(Debug, Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetrics {
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&MetricEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }

    fn push(&self, event: MetricEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl MetricsSink for RecordingMetrics {
    fn connection_started(&self, backend: &str) {
        self.push(MetricEvent::Started(backend.to_string()));
    }

    fn connection_active_delta(&self, backend: &str, delta: i64) {
        self.push(MetricEvent::ActiveDelta(backend.to_string(), delta));
    }

    fn connection_error(&self, backend: &str, reason: &str) {
        self.push(MetricEvent::Error(backend.to_string(), reason.to_string()));
    }

    fn connection_duration(&self, backend: &str, _seconds: f64) {
        self.push(MetricEvent::Duration(backend.to_string()));
    }

    fn backend_health(&self, backend: &str, healthy: bool) {
        self.push(MetricEvent::Health(backend.to_string(), healthy));
    }

    fn health_check_result(&self, backend: &str, outcome: HealthCheckOutcome) {
        self.push(MetricEvent::Check(backend.to_string(), outcome));
    }
}

/// Backend that greets every connection with `<tag>\n` and then echoes.
pub async fn spawn_tagged_backend(tag: &'static str) -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                if socket.write_all(format!("{}\n", tag).as_bytes()).await.is_err() {
                    return;
                }
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });

    (addr, accepted)
}

/// Backend that accepts and immediately closes every connection.
pub async fn spawn_closing_backend() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    (addr, accepted)
}

/// A loopback port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

pub struct RunningProxy {
    pub addr: SocketAddr,
    pub shutdown: watch::Sender<bool>,
    pub task: JoinHandle<()>,
}

pub async fn start_proxy(pool: Arc<BackendPool>, metrics: Arc<RecordingMetrics>) -> RunningProxy {
    let proxy = Arc::new(
        Proxy::new(pool, Arc::new(RoundRobinBalancer::new()), metrics)
            .with_connect_timeout(Duration::from_secs(2)),
    );
    let (shutdown, shutdown_rx) = watch::channel(false);

    let server = ServerBuilder::new("127.0.0.1:0")
        .with_handler(proxy)
        .with_shutdown(shutdown_rx)
        .bind()
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let task = tokio::spawn(server.serve());

    RunningProxy {
        addr,
        shutdown,
        task,
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
