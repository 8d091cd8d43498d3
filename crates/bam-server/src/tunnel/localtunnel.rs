//! localtunnel client
//!
//! `GET {server}/?new` assigns a public URL plus a TCP port on the server
//! host. The client keeps `max_conn_count` connections open to that port
//! and splices each one onto the local app once the server pushes a request
//! down it.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use bam_core::AppError;

use super::{ExponentialBackoff, Tunnel, TunnelProvider};

/// Upper bound on parallel relay connections, whatever the server offers
const MAX_CONNECTIONS: usize = 10;

/// Tunnel provider backed by a localtunnel server
pub struct LocalTunnel {
    server: String,
    client: reqwest::Client,
}

impl LocalTunnel {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

/// Server reply to a `?new` request
#[derive(Debug, Deserialize)]
struct Assignment {
    id: String,
    port: u16,
    #[serde(default)]
    max_conn_count: Option<usize>,
    url: String,
}

#[async_trait]
impl TunnelProvider for LocalTunnel {
    async fn open(&self, local_port: u16) -> Result<Box<dyn Tunnel>, AppError> {
        let remote_host = reqwest::Url::parse(&self.server)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_else(|| AppError::Tunnel(format!("invalid server URL {}", self.server)))?;

        let assignment: Assignment = self
            .client
            .get(format!("{}/?new", self.server))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Tunnel(e.to_string()))?
            .json()
            .await
            .map_err(|e| AppError::Tunnel(e.to_string()))?;

        tracing::debug!(
            "Tunnel {} assigned {} via {}:{}",
            assignment.id,
            assignment.url,
            remote_host,
            assignment.port
        );

        let connections = assignment
            .max_conn_count
            .unwrap_or(1)
            .clamp(1, MAX_CONNECTIONS);

        Ok(Box::new(Session {
            url: assignment.url,
            endpoint: Arc::new(Endpoint {
                remote_host,
                remote_port: assignment.port,
                local_port,
            }),
            connections,
        }))
    }
}

struct Endpoint {
    remote_host: String,
    remote_port: u16,
    local_port: u16,
}

struct Session {
    url: String,
    endpoint: Arc<Endpoint>,
    connections: usize,
}

#[async_trait]
impl Tunnel for Session {
    fn url(&self) -> &str {
        &self.url
    }

    async fn relay(self: Box<Self>, cancel: CancellationToken) -> Result<(), AppError> {
        let workers = (0..self.connections)
            .map(|_| worker(self.endpoint.clone(), cancel.clone()))
            .collect::<Vec<_>>();
        futures::future::join_all(workers).await;

        tracing::debug!("Tunnel {} closed", self.url);
        Ok(())
    }
}

/// Keep one connection to the tunnel server alive until cancelled
async fn worker(endpoint: Arc<Endpoint>, cancel: CancellationToken) {
    let mut backoff = ExponentialBackoff::default();

    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = relay_one(&endpoint) => result,
        };

        match result {
            Ok(true) => {
                backoff.reset();
                continue;
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(
                "Tunnel connection to {}:{} failed: {}",
                endpoint.remote_host,
                endpoint.remote_port,
                e
            ),
        }

        let delay = backoff.next_delay();
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Relay a single remote connection, reporting whether any bytes moved
async fn relay_one(endpoint: &Endpoint) -> std::io::Result<bool> {
    let mut remote =
        TcpStream::connect((endpoint.remote_host.as_str(), endpoint.remote_port)).await?;

    // The server parks idle connections until a request arrives
    remote.readable().await?;

    let mut local = TcpStream::connect((Ipv4Addr::LOCALHOST, endpoint.local_port)).await?;
    let (up, down) = tokio::io::copy_bidirectional(&mut remote, &mut local).await?;
    Ok(up + down > 0)
}
