//! Public sharing on top of any app

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bam_core::{App, AppError, AppInfo, AppKind};

use crate::tunnel::TunnelProvider;

struct Share {
    url: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Share {
    fn active(&self) -> bool {
        !self.task.is_finished()
    }

    async fn close(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Wraps an app and optionally exposes its port through a tunnel
///
/// Lifecycle calls are forwarded untouched; the wrapped app's own state
/// machine decides whether they succeed.
pub struct ShareableApp {
    inner: Box<dyn App>,
    tunnels: Arc<dyn TunnelProvider>,
    share: Mutex<Option<Share>>,
}

impl ShareableApp {
    pub fn new(inner: Box<dyn App>, tunnels: Arc<dyn TunnelProvider>) -> Self {
        Self {
            inner,
            tunnels,
            share: Mutex::new(None),
        }
    }

    /// The wrapped app
    pub fn inner(&self) -> &dyn App {
        self.inner.as_ref()
    }

    /// Open a tunnel to the running app and start relaying through it
    pub async fn share(&self) -> Result<(), AppError> {
        if !self.inner.running() {
            return Err(AppError::NotStarted);
        }
        if self.shared() {
            return Err(AppError::AlreadyShared);
        }

        let tunnel = self.tunnels.open(self.inner.port()).await?;
        let url = tunnel.url().to_string();
        let cancel = CancellationToken::new();

        let name = self.name().to_string();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = tunnel.relay(token).await {
                tracing::warn!("Tunnel for {} ended: {}", name, e);
            }
        });

        tracing::info!("App {} shared at {}", self.name(), url);
        *self.share.lock() = Some(Share { url, cancel, task });
        Ok(())
    }

    /// Tear the tunnel down; a no-op when the running app is not shared
    pub async fn unshare(&self) -> Result<(), AppError> {
        if !self.inner.running() {
            return Err(AppError::NotStarted);
        }
        self.close_share().await;
        Ok(())
    }

    /// Whether a tunnel is currently relaying
    pub fn shared(&self) -> bool {
        self.share.lock().as_ref().map(Share::active).unwrap_or(false)
    }

    /// Public URL while shared
    pub fn url(&self) -> Option<String> {
        self.share
            .lock()
            .as_ref()
            .filter(|s| s.active())
            .map(|s| s.url.clone())
    }

    async fn close_share(&self) {
        let share = self.share.lock().take();
        if let Some(share) = share {
            let was_active = share.active();
            share.close().await;
            if was_active {
                tracing::info!("App {} unshared", self.name());
            }
        }
    }
}

#[async_trait]
impl App for ShareableApp {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn port(&self) -> u16 {
        self.inner.port()
    }

    fn kind(&self) -> AppKind {
        self.inner.kind()
    }

    async fn start(&self) -> Result<(), AppError> {
        self.inner.start().await
    }

    async fn stop(&self) -> Result<(), AppError> {
        if self.inner.running() {
            self.close_share().await;
        }
        self.inner.stop().await
    }

    fn running(&self) -> bool {
        self.inner.running()
    }

    fn info(&self) -> AppInfo {
        AppInfo {
            shared_url: self.url(),
            ..self.inner.info()
        }
    }
}
