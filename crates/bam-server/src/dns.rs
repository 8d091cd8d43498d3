//! UDP DNS responder for the local top-level domain

use std::net::{Ipv4Addr, SocketAddr};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bam_core::AppError;
use bam_dns::{Header, LocalZone, Message, HEADER_SIZE};

/// Largest datagram read; longer EDNS payloads are truncated and fail to decode
const MAX_PACKET: usize = 4096;

struct Listener {
    port: u16,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Answers every A/AAAA query under the TLD with loopback
///
/// Start and stop follow the app contract: starting twice fails with
/// `AlreadyStarted`, stopping while stopped with `NotStarted`.
pub struct LocalDns {
    port: u16,
    zone: LocalZone,
    listener: Mutex<Option<Listener>>,
}

impl LocalDns {
    /// Responder for `tld` on loopback `port` (0 picks a free port)
    pub fn new(tld: &str, port: u16) -> Self {
        Self {
            port,
            zone: LocalZone::new(tld),
            listener: Mutex::new(None),
        }
    }

    /// Bind the UDP socket and start answering
    pub async fn start(&self) -> Result<(), AppError> {
        if self.running() {
            return Err(AppError::AlreadyStarted);
        }

        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, self.port)))
            .await
            .map_err(AppError::Bind)?;
        let port = socket.local_addr().map_err(AppError::Bind)?.port();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(serve(socket, self.zone.clone(), cancel.clone()));

        tracing::info!("DNS answering *{} on udp://127.0.0.1:{}", self.zone.suffix(), port);
        *self.listener.lock() = Some(Listener { port, cancel, task });
        Ok(())
    }

    /// Release the UDP socket
    pub async fn stop(&self) -> Result<(), AppError> {
        let listener = match self.listener.lock().take() {
            Some(listener) if !listener.task.is_finished() => listener,
            _ => return Err(AppError::NotStarted),
        };

        listener.cancel.cancel();
        let _ = listener.task.await;
        tracing::info!("DNS stopped");
        Ok(())
    }

    pub fn running(&self) -> bool {
        self.listener
            .lock()
            .as_ref()
            .map(|l| !l.task.is_finished())
            .unwrap_or(false)
    }

    /// Bound port while running, 0 otherwise
    pub fn local_port(&self) -> u16 {
        match self.listener.lock().as_ref() {
            Some(l) if !l.task.is_finished() => l.port,
            _ => 0,
        }
    }
}

async fn serve(socket: UdpSocket, zone: LocalZone, cancel: CancellationToken) {
    let mut buf = vec![0u8; MAX_PACKET];

    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => match received {
                Ok(received) => received,
                Err(e) => {
                    tracing::debug!("DNS receive failed: {}", e);
                    continue;
                }
            },
        };

        let Some(reply) = answer(&zone, &buf[..len]) else {
            continue;
        };
        if let Err(e) = socket.send_to(&reply, peer).await {
            tracing::debug!("DNS reply to {} failed: {}", peer, e);
        }
    }
}

/// Compute the reply datagram for one received packet
///
/// Returns `None` for packets that cannot or must not be answered: anything
/// shorter than a header, and responses.
pub fn answer(zone: &LocalZone, packet: &[u8]) -> Option<Bytes> {
    if packet.len() < HEADER_SIZE {
        tracing::debug!("Ignoring {} byte DNS packet", packet.len());
        return None;
    }

    match Message::decode(packet) {
        Ok(query) if query.header.response => {
            tracing::trace!("Ignoring DNS response {}", query.header.id);
            None
        }
        Ok(query) => Some(zone.respond(&query).to_bytes()),
        Err(e) => {
            let id = Header::peek_id(packet)?;
            tracing::debug!("Malformed DNS query {}: {}", id, e);
            Some(Message::format_error(id).to_bytes())
        }
    }
}
