//! Per-interface transports (spec §4.2 socket model): datagram, stream and
//! file encapsulations, each driven by the production event loop in
//! [`crate::driver`].

mod dgram;
mod file;
mod stream;

pub use dgram::DgramTransport;
pub use file::FileTransport;
pub use stream::StreamTransport;

use std::net::SocketAddrV4;

use crate::error::ServerError;

/// One received ensemble plus where it came from, if the transport can
/// report a source address (file and stream transports synthesize one
/// from the record/frame itself).
#[derive(Debug, Clone)]
pub struct Received {
    /// Raw ensemble bytes, ready for `Context::handle_ensemble`.
    pub bytes: Vec<u8>,
    /// Source address, when the transport exposes one.
    pub from: Option<SocketAddrV4>,
}

/// Unified interface the driver talks to, regardless of which
/// [`relaymesh_core::interface::SocketType`] backs a given interface.
pub enum Transport {
    /// UDP-style datagram socket.
    Dgram(DgramTransport),
    /// SLIP-framed byte stream.
    Stream(StreamTransport),
    /// Shared fixed-record file.
    File(FileTransport),
}

impl Transport {
    /// Send one already-encoded packet to `dest`. `dest == None` means
    /// broadcast (only meaningful for datagram transports; file and stream
    /// transports write to their single peer/log regardless).
    pub async fn send(&mut self, dest: Option<SocketAddrV4>, bytes: &[u8]) -> Result<(), ServerError> {
        match self {
            Self::Dgram(t) => t.send(dest, bytes).await,
            Self::Stream(t) => t.send(bytes).await,
            Self::File(t) => t.send(dest, bytes).await,
        }
    }

    /// Poll for all ensembles available right now without blocking further
    /// than the transport's own read call.
    pub async fn recv(&mut self) -> Result<Vec<Received>, ServerError> {
        match self {
            Self::Dgram(t) => t.recv().await,
            Self::Stream(t) => t.recv().await,
            Self::File(t) => t.recv().await,
        }
    }
}
