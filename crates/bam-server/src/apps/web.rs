//! Static directory served over HTTP

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::Router;
use parking_lot::Mutex;
use tower_http::services::ServeDir;

use bam_core::types::app_name_from_dir;
use bam_core::{App, AppError, AppKind};

use crate::server::HttpServer;

/// Marker file flagging a directory as a static site
pub const INDEX_FILE: &str = "index.html";

/// Serves one directory on a fresh ephemeral listener per start
pub struct WebServerApp {
    name: String,
    dir: PathBuf,
    server: Mutex<Option<HttpServer>>,
}

impl WebServerApp {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            server: Mutex::new(None),
        }
    }

    /// Create an app named after the directory
    pub fn from_dir(dir: &Path) -> Option<Self> {
        let name = app_name_from_dir(dir)?;
        Some(Self::new(name, dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn router(&self) -> Router {
        Router::new().fallback_service(ServeDir::new(&self.dir))
    }
}

#[async_trait]
impl App for WebServerApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self) -> u16 {
        match self.server.lock().as_ref() {
            Some(server) if server.is_serving() => server.port(),
            _ => 0,
        }
    }

    fn kind(&self) -> AppKind {
        AppKind::WebServer
    }

    async fn start(&self) -> Result<(), AppError> {
        if self.running() {
            return Err(AppError::AlreadyStarted);
        }

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let server = HttpServer::bind(addr, self.router(), &self.name).await?;

        tracing::info!(
            "App {} serving {} on port {}",
            self.name,
            self.dir.display(),
            server.port()
        );
        *self.server.lock() = Some(server);
        Ok(())
    }

    async fn stop(&self) -> Result<(), AppError> {
        let server = match self.server.lock().take() {
            Some(server) if server.is_serving() => server,
            _ => return Err(AppError::NotStarted),
        };

        server.shutdown().await;
        tracing::info!("App {} stopped", self.name);
        Ok(())
    }

    fn running(&self) -> bool {
        self.server
            .lock()
            .as_ref()
            .map(|s| s.is_serving())
            .unwrap_or(false)
    }
}
