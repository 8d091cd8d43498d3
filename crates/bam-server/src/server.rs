//! Background HTTP servers with cancellable lifetimes
//!
//! Both the console and static web apps own one of these: binding returns
//! immediately with the resolved port, serving runs on its own task, and
//! `shutdown` closes the listener before returning.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bam_core::AppError;

/// How long in-flight requests may take to finish once shutdown begins
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A running HTTP server
pub struct HttpServer {
    port: u16,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl HttpServer {
    /// Bind `addr` (port 0 picks a free port) and start serving `router`
    pub async fn bind(addr: SocketAddr, router: Router, label: &str) -> Result<Self, AppError> {
        let listener = TcpListener::bind(addr).await.map_err(AppError::Bind)?;
        Self::serve(listener, router, label)
    }

    /// Start serving `router` on an already bound listener
    pub fn serve(listener: TcpListener, router: Router, label: &str) -> Result<Self, AppError> {
        let local_addr = listener.local_addr().map_err(AppError::Bind)?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let label = label.to_string();

        tracing::debug!("{} listening on http://{}", label, local_addr);

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            match result {
                Ok(()) => tracing::debug!("{} stopped serving", label),
                Err(e) => tracing::warn!("{} stopped with error: {}", label, e),
            }
        });

        Ok(Self {
            port: local_addr.port(),
            cancel,
            task,
        })
    }

    /// The bound port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the serve loop is still alive
    pub fn is_serving(&self) -> bool {
        !self.task.is_finished()
    }

    /// Close the listener and wait for the serve loop to end
    ///
    /// Connections still open after [`DRAIN_TIMEOUT`] are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        let mut task = self.task;
        if tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await.is_err() {
            tracing::debug!("Server on port {} did not drain in time, aborting", self.port);
            task.abort();
            let _ = task.await;
        }
    }
}
