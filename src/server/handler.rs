// src/server/handler.rs
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::TcpStream;

use crate::proxy::{Proxy, ProxyError};

/// Serves one accepted connection to completion.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), ProxyError>;
}

#[async_trait]
impl ConnectionHandler for Proxy {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), ProxyError> {
        self.handle_connection(stream, peer).await
    }
}
