// src/metrics/server.rs
use super::MetricsRegistry;
use crate::server::shutdown::wait_for_shutdown;
use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{header, Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Serves the Prometheus exposition at `path` and `OK` at `/health`.
///
/// Binds before returning so bind failures surface to the caller; the server
/// itself runs on a spawned task until `shutdown` fires.
pub fn start_metrics_server(
    addr: SocketAddr,
    registry: Arc<MetricsRegistry>,
    path: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<SocketAddr> {
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move { Ok::<_, Infallible>(route(&req, &registry, &path)) }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?
        .serve(make_service);
    let local_addr = server.local_addr();

    info!(
        "Metrics server listening on http://{}{}",
        local_addr,
        metrics_path.as_str()
    );

    let graceful = server.with_graceful_shutdown(async move {
        wait_for_shutdown(&mut shutdown).await;
    });

    tokio::spawn(async move {
        if let Err(e) = graceful.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(local_addr)
}

fn route(req: &Request<Body>, registry: &MetricsRegistry, metrics_path: &str) -> Response<Body> {
    let path = req.uri().path();

    if path == metrics_path {
        match registry.gather() {
            Ok(body) => text_response(StatusCode::OK, "text/plain; version=0.0.4", Body::from(body)),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                text_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    Body::from("Failed to encode metrics"),
                )
            }
        }
    } else if path == "/health" {
        text_response(StatusCode::OK, "text/plain", Body::from("OK"))
    } else {
        text_response(StatusCode::NOT_FOUND, "text/plain", Body::from("Not Found"))
    }
}

fn text_response(status: StatusCode, content_type: &'static str, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    response
}
