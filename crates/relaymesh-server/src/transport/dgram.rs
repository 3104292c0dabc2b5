//! UDP datagram transport (spec §4.2 socket model): one socket bound to
//! `INADDR_ANY` to receive broadcasts plus one bound to the interface's own
//! address, used for sends so replies leave on the right interface.

use std::net::{Ipv4Addr, SocketAddrV4};

use tokio::net::UdpSocket;
use tracing::trace;

use super::Received;
use crate::error::ServerError;

/// Maximum ensemble size accepted off the wire; larger datagrams are
/// truncated reads and dropped rather than risked as a partial decode.
const MAX_DATAGRAM: usize = 1500;

/// Datagram transport for one interface.
pub struct DgramTransport {
    interface: relaymesh_core::InterfaceId,
    send_socket: UdpSocket,
    broadcast_socket: Option<UdpSocket>,
}

impl DgramTransport {
    /// Bind the interface-specific send socket, and — if `permits_broadcast`
    /// — an additional socket on `INADDR_ANY:port` to receive broadcasts
    /// sent to this interface's port from any peer.
    pub async fn bind(
        interface: relaymesh_core::InterfaceId,
        bind_addr: SocketAddrV4,
        permits_broadcast: bool,
    ) -> Result<Self, ServerError> {
        let send_socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| ServerError::Transport { interface, source })?;
        send_socket.set_broadcast(true).map_err(|source| ServerError::Transport { interface, source })?;

        let broadcast_socket = if permits_broadcast {
            let any = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, bind_addr.port());
            let socket = UdpSocket::bind(any)
                .await
                .map_err(|source| ServerError::Transport { interface, source })?;
            socket.set_broadcast(true).map_err(|source| ServerError::Transport { interface, source })?;
            Some(socket)
        } else {
            None
        };

        Ok(Self { interface, send_socket, broadcast_socket })
    }

    pub(super) async fn send(
        &mut self,
        dest: Option<SocketAddrV4>,
        bytes: &[u8],
    ) -> Result<(), ServerError> {
        let dest = dest.unwrap_or_else(|| {
            SocketAddrV4::new(Ipv4Addr::BROADCAST, self.send_socket.local_addr().map_or(0, |a| a.port()))
        });
        self.send_socket
            .send_to(bytes, dest)
            .await
            .map(drop)
            .map_err(|source| ServerError::Transport { interface: self.interface, source })
    }

    pub(super) async fn recv(&mut self) -> Result<Vec<Received>, ServerError> {
        let mut out = Vec::new();
        let mut buf = [0u8; MAX_DATAGRAM];

        self.send_socket
            .readable()
            .await
            .map_err(|source| ServerError::Transport { interface: self.interface, source })?;
        drain_socket(&self.send_socket, self.interface, &mut buf, &mut out)?;

        if let Some(broadcast) = &self.broadcast_socket {
            if broadcast.readable().await.is_ok() {
                drain_socket(broadcast, self.interface, &mut buf, &mut out)?;
            }
        }

        trace!(interface = self.interface, count = out.len(), "datagrams received");
        Ok(out)
    }
}

fn drain_socket(
    socket: &UdpSocket,
    interface: relaymesh_core::InterfaceId,
    buf: &mut [u8],
    out: &mut Vec<Received>,
) -> Result<(), ServerError> {
    loop {
        match socket.try_recv_from(buf) {
            Ok((len, std::net::SocketAddr::V4(from))) => {
                out.push(Received { bytes: buf[..len].to_vec(), from: Some(from) });
            },
            Ok((_, std::net::SocketAddr::V6(_))) => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(source) => return Err(ServerError::Transport { interface, source }),
        }
    }
    Ok(())
}
