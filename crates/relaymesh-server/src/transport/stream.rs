//! SLIP-framed stream transport (spec §4.2): wraps any byte stream (TCP,
//! Unix socket, PTY) and frames ensembles with [`crate::slip`]. Only one
//! outbound frame is ever in flight; frames that arrive while a previous
//! one is still draining are queued.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::Received;
use crate::{
    error::ServerError,
    slip::{SlipDecoder, encode_frame},
};

const READ_CHUNK: usize = 4096;

/// Combined read/write bound for [`BoxedStream`]; `Unpin` lets a boxed
/// trait object be used directly as `AsyncRead`/`AsyncWrite` without
/// pinning.
pub trait AsyncReadWrite: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + ?Sized> AsyncReadWrite for T {}

/// Either half of a byte stream, boxed so this transport works over TCP,
/// Unix sockets or anything else implementing the async IO traits.
pub type BoxedStream = Box<dyn AsyncReadWrite>;

/// Stream transport for one interface.
pub struct StreamTransport {
    interface: relaymesh_core::InterfaceId,
    stream: BoxedStream,
    decoder: SlipDecoder,
    /// Bytes of the in-flight outbound frame not yet written.
    tx_bytes_pending: Vec<u8>,
    tx_cursor: usize,
    /// Frames waiting for the in-flight one to finish draining.
    tx_queue: VecDeque<Vec<u8>>,
}

impl StreamTransport {
    /// Wrap an already-connected stream.
    #[must_use]
    pub fn new(interface: relaymesh_core::InterfaceId, stream: BoxedStream) -> Self {
        Self {
            interface,
            stream,
            decoder: SlipDecoder::new(),
            tx_bytes_pending: Vec::new(),
            tx_cursor: 0,
            tx_queue: VecDeque::new(),
        }
    }

    pub(super) async fn send(&mut self, bytes: &[u8]) -> Result<(), ServerError> {
        let encoded = encode_frame(bytes);
        if self.tx_cursor < self.tx_bytes_pending.len() {
            self.tx_queue.push_back(encoded);
            return Ok(());
        }
        self.tx_bytes_pending = encoded;
        self.tx_cursor = 0;
        self.drain_pending().await
    }

    /// Writes as much of the in-flight frame as the stream accepts right
    /// now, then pulls the next queued frame in when it finishes, until
    /// the queue is empty or a write returns fewer bytes than offered.
    async fn drain_pending(&mut self) -> Result<(), ServerError> {
        loop {
            while self.tx_cursor < self.tx_bytes_pending.len() {
                let written = self
                    .stream
                    .write(&self.tx_bytes_pending[self.tx_cursor..])
                    .await
                    .map_err(|source| ServerError::Transport { interface: self.interface, source })?;
                if written == 0 {
                    return Ok(());
                }
                self.tx_cursor += written;
            }
            match self.tx_queue.pop_front() {
                Some(next) => {
                    self.tx_bytes_pending = next;
                    self.tx_cursor = 0;
                },
                None => {
                    self.tx_bytes_pending.clear();
                    self.tx_cursor = 0;
                    return Ok(());
                },
            }
        }
    }

    pub(super) async fn recv(&mut self) -> Result<Vec<Received>, ServerError> {
        // Finish any write left over from a short write before blocking on
        // the next read, so the in-flight-frame invariant holds.
        self.drain_pending().await?;

        let mut buf = [0u8; READ_CHUNK];
        let n = self
            .stream
            .read(&mut buf)
            .await
            .map_err(|source| ServerError::Transport { interface: self.interface, source })?;
        if n == 0 {
            return Ok(Vec::new());
        }

        let frames = self.decoder.push(&buf[..n]);
        trace!(interface = self.interface, count = frames.len(), "stream frames decoded");
        Ok(frames.into_iter().map(|bytes| Received { bytes, from: None }).collect())
    }
}
