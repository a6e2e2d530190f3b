//! A tiny HTTP/1 liveness endpoint for hosting platforms that check the
//! process over HTTP.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Error;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::quote_store::QuoteStore;

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    quotes: Option<usize>,
}

fn json_response<T>(status: StatusCode, value: &T) -> Response<Full<Bytes>>
where
    T: Serialize,
{
    let body = serde_json::to_vec(value).unwrap_or_default();
    let mut resp = Response::new(Full::from(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn not_found() -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = StatusCode::NOT_FOUND;
    resp
}

async fn route(method: &Method, path: &str, store: &QuoteStore) -> Response<Full<Bytes>> {
    if *method != Method::GET || !matches!(path, "/" | "/health") {
        return not_found();
    }

    // A broken quote store doesn't make the process unhealthy.
    let quotes = match store.len().await {
        Ok(len) => Some(len),
        Err(err) => {
            warn!("Health check couldn't read the quote store: {}", err);
            None
        }
    };
    json_response(
        StatusCode::OK,
        &HealthStatus {
            status: "ok",
            quotes,
        },
    )
}

async fn handle_request(
    req: Request<Incoming>,
    store: QuoteStore,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.method(), req.uri().path(), &store).await)
}

async fn serve(listener: TcpListener, store: QuoteStore) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                // Accept errors such as EMFILE are transient, keep listening.
                warn!("Health check accept failed: {}", err);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let store = store.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, store.clone()));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!("Health check connection error ({}): {}", peer, err);
            }
        });
    }
}

/// Binds `addr` and serves health checks in the background.
pub(crate) async fn spawn_health_server(
    addr: &str,
    store: QuoteStore,
) -> Result<SocketAddr, Error> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|err| anyhow!("Invalid health check address {:?}: {}", addr, err))?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    info!("Health check endpoint started on {}", local_addr);

    tokio::spawn(serve(listener, store));

    Ok(local_addr)
}
