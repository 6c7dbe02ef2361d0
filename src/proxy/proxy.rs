// ────────────────────────────────
// src/proxy/proxy.rs
// Per-connection session: pick a healthy backend, dial it, relay bytes both ways
// ────────────────────────────────

use crate::load_balancer::LoadBalancer;
use crate::metrics::{reasons, MetricsSink, ALL_BACKENDS};
use crate::proxy::{Backend, BackendPool};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Written to the client when no backend is marked healthy.
pub const NO_BACKENDS_MESSAGE: &[u8] = b"No backends available\n";
/// Written to the client when the chosen backend refuses the connection.
pub const BACKEND_UNAVAILABLE_MESSAGE: &[u8] = b"Backend unavailable\n";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No backends available")]
    NoBackendsAvailable,

    #[error("Failed to connect to backend {address}: {source}")]
    DialFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Timed out connecting to backend {address} after {timeout:?}")]
    DialTimeout { address: String, timeout: Duration },
}

pub struct Proxy {
    pool: Arc<BackendPool>,
    balancer: Arc<dyn LoadBalancer>,
    metrics: Arc<dyn MetricsSink>,
    connect_timeout: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl Proxy {
    pub fn new(
        pool: Arc<BackendPool>,
        balancer: Arc<dyn LoadBalancer>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            pool,
            balancer,
            metrics,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Sessions between accept and close, including those still dialing.
    pub fn in_flight_sessions(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Runs one client session to completion.
    ///
    /// Having no healthy backend is a degraded-service answer, not an error:
    /// the client gets a one-line notice and `Ok(())` is returned.
    pub async fn handle_connection<S>(&self, mut client: S, peer: SocketAddr) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let started = Instant::now();
        let _in_flight = InFlight::enter(self.in_flight.clone());
        debug!("New connection from {}", peer);

        let healthy = self.pool.get_healthy_backends();
        if healthy.is_empty() {
            warn!("No healthy backends available for client {}", peer);
            self.metrics
                .connection_error(ALL_BACKENDS, reasons::NO_HEALTHY_BACKENDS);
            reject(&mut client, NO_BACKENDS_MESSAGE).await;
            return Ok(());
        }

        let backend = match self.balancer.select_backend(&healthy).await {
            Ok(backend) => backend,
            Err(e) => {
                error!("Failed to select backend: {}", e);
                self.metrics
                    .connection_error(ALL_BACKENDS, reasons::BACKEND_SELECTION_FAILED);
                return Err(e);
            }
        };

        debug!(
            "Routing connection from {} to backend {} ({})",
            peer,
            backend.id,
            backend.address()
        );

        let upstream = match self.dial(&backend).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("{}", e);
                self.metrics
                    .connection_error(backend.address(), reasons::CONNECTION_FAILED);
                reject(&mut client, BACKEND_UNAVAILABLE_MESSAGE).await;
                return Err(e);
            }
        };

        let _session = SessionGuard::open(backend, self.metrics.clone(), started);
        relay(client, upstream).await;

        Ok(())
    }

    async fn dial(&self, backend: &Backend) -> Result<TcpStream, ProxyError> {
        let address = backend.address();
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(ProxyError::DialFailed {
                address: address.to_string(),
                source,
            }),
            Err(_) => Err(ProxyError::DialTimeout {
                address: address.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }
}

async fn reject<S: AsyncWrite + Unpin>(client: &mut S, message: &[u8]) {
    if let Err(e) = client.write_all(message).await {
        debug!("Failed to write diagnostic to client: {}", e);
        return;
    }
    let _ = client.shutdown().await;
}

struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accounting for one dialed session. Everything `open` increments is undone
/// on drop, so relay errors and task cancellation unwind the same way.
struct SessionGuard {
    backend: Arc<Backend>,
    metrics: Arc<dyn MetricsSink>,
    started: Instant,
}

impl SessionGuard {
    fn open(backend: Arc<Backend>, metrics: Arc<dyn MetricsSink>, started: Instant) -> Self {
        metrics.connection_started(backend.address());
        metrics.connection_active_delta(backend.address(), 1);
        backend.increment_connections();

        Self {
            backend,
            metrics,
            started,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let address = self.backend.address();
        self.backend.decrement_connections();
        self.metrics.connection_active_delta(address, -1);
        self.metrics
            .connection_duration(address, self.started.elapsed().as_secs_f64());

        debug!(
            "Session with backend {} closed after {:?}",
            address,
            self.started.elapsed()
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    ClientToBackend,
    BackendToClient,
}

/// Aborts the wrapped task if the owner goes away first.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Copies both directions on separate tasks. The first direction to finish,
/// cleanly or not, ends the session; the other copy is aborted and its
/// outcome discarded. Both streams are closed when this returns.
async fn relay<S>(client: S, upstream: TcpStream)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_reader, client_writer) = tokio::io::split(client);
    let (upstream_reader, upstream_writer) = upstream.into_split();
    let (done_tx, mut done_rx) = mpsc::channel(2);

    let mut to_backend = AbortOnDrop(spawn_copy(
        Direction::ClientToBackend,
        client_reader,
        upstream_writer,
        done_tx.clone(),
    ));
    let mut to_client = AbortOnDrop(spawn_copy(
        Direction::BackendToClient,
        upstream_reader,
        client_writer,
        done_tx,
    ));

    match done_rx.recv().await {
        Some((direction, Ok(bytes))) => {
            debug!("{:?} finished after {} bytes", direction, bytes);
        }
        Some((direction, Err(e))) => {
            debug!("{:?} failed: {}", direction, e);
        }
        None => {}
    }

    // Waiting on the aborted tasks guarantees their stream halves are dropped.
    to_backend.0.abort();
    to_client.0.abort();
    let _ = (&mut to_backend.0).await;
    let _ = (&mut to_client.0).await;
}

fn spawn_copy<R, W>(
    direction: Direction,
    mut reader: R,
    mut writer: W,
    done: mpsc::Sender<(Direction, io::Result<u64>)>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let result = tokio::io::copy(&mut reader, &mut writer).await;
        let _ = done.send((direction, result)).await;
    })
}
