//! Fixed name -> port mapping for services bam does not manage

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use bam_core::{App, AppError, AppKind};

/// A service started outside bam, registered only for routing
///
/// Start/stop flip a flag and never touch a process. There is no health
/// check: the alias reports running from construction until stopped.
pub struct AliasApp {
    name: String,
    port: u16,
    running: AtomicBool,
}

impl AliasApp {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            running: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl App for AliasApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn kind(&self) -> AppKind {
        AppKind::Alias
    }

    async fn start(&self) -> Result<(), AppError> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), AppError> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
