//! The App capability

use async_trait::async_trait;

use crate::error::AppError;
use crate::types::{AppInfo, AppKind};

/// One addressable local service
///
/// An app is either `Stopped` or `Running`. `start` fails with
/// [`AppError::AlreadyStarted`] while running and `stop` fails with
/// [`AppError::NotStarted`] while stopped; in both cases the state is left
/// untouched.
///
/// `start`/`stop` on the same instance must not overlap. Callers serialize
/// them; implementations only guarantee memory safety, not ordering.
#[async_trait]
pub trait App: Send + Sync {
    /// Stable name, unique within a registry
    fn name(&self) -> &str;

    /// Bound port, or 0 when not running
    fn port(&self) -> u16;

    /// Variant backing this app
    fn kind(&self) -> AppKind;

    /// Transition `Stopped -> Running`
    async fn start(&self) -> Result<(), AppError>;

    /// Transition `Running -> Stopped`
    async fn stop(&self) -> Result<(), AppError>;

    /// Whether the app is currently running
    fn running(&self) -> bool;

    /// Snapshot for listings
    fn info(&self) -> AppInfo {
        AppInfo {
            name: self.name().to_string(),
            kind: self.kind(),
            port: self.port(),
            running: self.running(),
            shared_url: None,
        }
    }
}
