// src/server/builder.rs
use super::handler::ConnectionHandler;
use super::listener::{accept_loop, bind_tcp};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Builder so `main.rs` can inject its proxy (or any handler) and shutdown signal.
pub struct ServerBuilder<H: ConnectionHandler> {
    addr: String,
    handler: Option<Arc<H>>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<H: ConnectionHandler> ServerBuilder<H> {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            handler: None,
            shutdown: None,
        }
    }

    pub fn with_handler(mut self, handler: Arc<H>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Binds the listening socket without accepting yet.
    pub async fn bind(self) -> Result<BoundServer<H>> {
        let handler = self
            .handler
            .context("handler must be set via with_handler()")?;

        // Without an explicit signal the server keeps its own sender alive
        // and runs until the process exits.
        let (idle_tx, shutdown) = match self.shutdown {
            Some(rx) => (None, rx),
            None => {
                let (tx, rx) = watch::channel(false);
                (Some(tx), rx)
            }
        };

        let listener = bind_tcp(self.addr.as_str())
            .await
            .with_context(|| format!("Failed to listen on {}", self.addr))?;

        Ok(BoundServer {
            listener,
            handler,
            shutdown,
            idle_tx,
        })
    }

    pub async fn serve(self) -> Result<()> {
        self.bind().await?.serve().await;
        Ok(())
    }
}

pub struct BoundServer<H: ConnectionHandler> {
    listener: TcpListener,
    handler: Arc<H>,
    shutdown: watch::Receiver<bool>,
    idle_tx: Option<watch::Sender<bool>>,
}

impl<H: ConnectionHandler> BoundServer<H> {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn serve(self) {
        let _idle_tx = self.idle_tx;
        accept_loop(self.listener, self.handler, self.shutdown).await;
    }
}
