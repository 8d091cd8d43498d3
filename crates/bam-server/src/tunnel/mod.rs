//! Outbound tunnels for sharing apps publicly

mod backoff;
mod localtunnel;

pub use backoff::ExponentialBackoff;
pub use localtunnel::LocalTunnel;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use bam_core::AppError;

/// Opens public tunnels to local ports
#[async_trait]
pub trait TunnelProvider: Send + Sync {
    /// Negotiate a tunnel for `local_port`
    async fn open(&self, local_port: u16) -> Result<Box<dyn Tunnel>, AppError>;
}

/// A negotiated tunnel, ready to relay
#[async_trait]
pub trait Tunnel: Send {
    /// Public URL the tunnel is reachable at
    fn url(&self) -> &str;

    /// Relay traffic until `cancel` fires or the remote end gives up
    async fn relay(self: Box<Self>, cancel: CancellationToken) -> Result<(), AppError>;
}
