// src/server/listener.rs
// Low-level TCP bind plus the accept loop that fans connections out to tasks.
use super::handler::ConnectionHandler;
use super::shutdown::wait_for_shutdown;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub async fn bind_tcp<A: ToSocketAddrs>(addr: A) -> io::Result<TcpListener> {
    TcpListener::bind(addr).await
}

/// Accepts until `shutdown` fires, spawning one handler task per connection.
///
/// Returns without waiting for spawned sessions; draining them is up to the caller.
pub async fn accept_loop<H: ConnectionHandler>(
    listener: TcpListener,
    handler: Arc<H>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on {}", addr);
    }

    loop {
        tokio::select! {
            biased;

            _ = wait_for_shutdown(&mut shutdown) => {
                info!("Listener stopped accepting connections");
                return;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let handler = handler.clone();
                    let span = info_span!("session", id = %Uuid::new_v4(), %peer);

                    tokio::spawn(
                        async move {
                            if let Err(e) = handler.handle(stream, peer).await {
                                debug!("Error handling connection: {}", e);
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    // accept errors such as EMFILE tend to repeat immediately
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }
}
