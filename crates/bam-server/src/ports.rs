//! Ephemeral port allocation

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};

/// Find an unused TCP port on the loopback interface
///
/// Binds port 0, reads back the port the OS picked and releases it. Another
/// process may claim the port before the caller binds it; for single-user
/// localhost tooling that window is accepted.
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
