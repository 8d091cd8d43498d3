//! bam-server: local app supervisor, host-based proxy and loopback DNS
//!
//! The daemon discovers apps under a directory (Procfile-backed processes,
//! static sites) plus configured aliases, supervises their lifecycle, and
//! makes each one reachable as `<app>.<tld>`: the DNS responder answers
//! every name under the TLD with loopback, and the proxy picks the backend
//! port from the `Host` header. The registry owning all apps also serves
//! the management console.

pub mod apps;
pub mod console;
pub mod discovery;
pub mod dns;
pub mod generate;
pub mod ports;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod shutdown;
pub mod tunnel;

pub use apps::{AliasApp, ProcessApp, ShareableApp, WebServerApp};
pub use dns::LocalDns;
pub use proxy::Proxy;
pub use registry::{Action, ActionError, Registry, REGISTRY_NAME};
