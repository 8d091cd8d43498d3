//! Host-based reverse proxy in front of every app

mod resolve;

pub use resolve::{resolve, routing_key, Route};

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, Version};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::registry::Registry;
use crate::server::DRAIN_TIMEOUT;

type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Headers that describe one connection and are never forwarded
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Forwards each request to the app its `Host` header names
pub struct Proxy {
    registry: Arc<Registry>,
    client: Client<HttpConnector, Incoming>,
}

impl Proxy {
    pub fn new(registry: Arc<Registry>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { registry, client }
    }

    /// Accept connections until `cancel` fires, then drain open ones
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) {
        let proxy = Arc::new(self);
        let tracker = TaskTracker::new();

        if let Ok(addr) = listener.local_addr() {
            tracing::info!("Proxy listening on http://{}", addr);
        }

        loop {
            let (stream, remote) = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("Proxy failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            tracker.spawn(serve_connection(
                proxy.clone(),
                stream,
                remote,
                cancel.clone(),
            ));
        }

        drop(listener);
        tracker.close();
        if tokio::time::timeout(DRAIN_TIMEOUT, tracker.wait()).await.is_err() {
            tracing::debug!("Proxy connections did not drain in time");
        }
        tracing::info!("Proxy stopped");
    }

    /// Forward one request and return the backend's (or an error) response
    pub async fn forward(&self, req: Request<Incoming>, remote: SocketAddr) -> Response<ProxyBody> {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let route = resolve(host.as_deref(), &self.registry);
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");

        let uri = match route.uri(path_and_query) {
            Ok(uri) => uri,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, format!("Invalid request: {}", e)),
        };

        tracing::debug!(
            "{} {} (host {}) -> {}",
            req.method(),
            path_and_query,
            host.as_deref().unwrap_or("-"),
            uri
        );

        let (mut parts, body) = req.into_parts();
        parts.uri = uri;
        parts.version = Version::HTTP_11;
        remove_hop_by_hop(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, remote);

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => {
                let (mut parts, body) = response.into_parts();
                remove_hop_by_hop(&mut parts.headers);
                Response::from_parts(parts, body.boxed())
            }
            Err(e) => {
                tracing::warn!(
                    "No response from {} for host {}: {}",
                    match route {
                        Route::Backend(port) => format!("port {}", port),
                        Route::Fallback { console_port, .. } => format!("console port {}", console_port),
                    },
                    host.as_deref().unwrap_or("-"),
                    e
                );
                error_response(StatusCode::BAD_GATEWAY, format!("Proxy error: {}", e))
            }
        }
    }
}

async fn serve_connection(
    proxy: Arc<Proxy>,
    stream: TcpStream,
    remote: SocketAddr,
    cancel: CancellationToken,
) {
    let service = service_fn(move |req| {
        let proxy = proxy.clone();
        async move { Ok::<_, Infallible>(proxy.forward(req, remote).await) }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    let mut conn = std::pin::pin!(conn);
    let mut shutdown = std::pin::pin!(cancel.cancelled());
    let mut draining = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!("Connection from {} ended: {}", remote, e);
                }
                break;
            }
            _ = &mut shutdown, if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response<ProxyBody> {
    let mut response = Response::new(Full::new(Bytes::from(message)).map_err(|never| match never {}).boxed());
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Drop hop-by-hop headers, including any the `Connection` header lists
fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, remote: SocketAddr) {
    let ip = remote.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{}, {}", existing, ip),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
