//! Metrics HTTP server.
//!
//! Serves the latest rendered snapshot over plain HTTP using `hyper`. Any
//! `GET` path answers `200 OK` with the snapshot body; a scrape that
//! arrives before the first poll cycle completes receives a placeholder
//! comment line, still as valid exposition text, never an error.
//!
//! Connections are handled concurrently; the atomic snapshot hand-off
//! means a scrape can never observe a half-written document.

use std::convert::Infallible;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::snapshot::SnapshotHandle;

const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Body served before the first poll cycle has published a snapshot.
const PLACEHOLDER: &str = "# collector starting, no poll cycle completed yet\n";

/// Runs the metrics HTTP server on `addr` until the process exits.
pub async fn run_metrics_server(
    handle: SnapshotHandle,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("metrics server listening on http://{addr}/metrics");
    serve_on(listener, handle).await
}

/// Accept loop over an already-bound listener (split out for tests).
pub async fn serve_on(
    listener: TcpListener,
    handle: SnapshotHandle,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let handle = handle.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let handle = handle.clone();
                async move { handle_request(req, handle).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                warn!("metrics connection error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    handle: SnapshotHandle,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.method() != Method::GET {
        return Ok(Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .body(Full::new(Bytes::from("method not allowed")))
            .expect("static response should build"));
    }

    // The path is deliberately not inspected: the scraper may be
    // configured with `/`, `/metrics`, or anything else.
    let body = match handle.latest() {
        Some(snapshot) => Bytes::copy_from_slice(snapshot.as_bytes()),
        None => Bytes::from(PLACEHOLDER),
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .body(Full::new(body))
        .expect("metrics response should build"))
}
