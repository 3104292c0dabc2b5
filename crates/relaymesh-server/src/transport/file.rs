//! File transport (spec §4.2, §6): a shared append-only file of fixed-size
//! records, used in place of real sockets for multi-process test rigs.
//! Supports deterministic loss injection via a configurable broadcast
//! drop-rate and an unconditional drop-unicasts flag.

use std::net::{Ipv4Addr, SocketAddrV4};

use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom},
};
use tracing::trace;

use super::Received;
use crate::error::ServerError;

const MAX_PAYLOAD: usize = 1400;
/// `src_ip(4) + src_port(2) + dst_ip(4) + dst_port(2) + origin_pid(4) + payload_len(2) + payload(1400)`.
const RECORD_SIZE: usize = 4 + 2 + 4 + 2 + 4 + 2 + MAX_PAYLOAD;

struct FileRecord {
    src: SocketAddrV4,
    dst: SocketAddrV4,
    origin_pid: u32,
    payload: Vec<u8>,
}

impl FileRecord {
    fn encode(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        let mut at = 0;
        buf[at..at + 4].copy_from_slice(&self.src.ip().octets());
        at += 4;
        buf[at..at + 2].copy_from_slice(&self.src.port().to_be_bytes());
        at += 2;
        buf[at..at + 4].copy_from_slice(&self.dst.ip().octets());
        at += 4;
        buf[at..at + 2].copy_from_slice(&self.dst.port().to_be_bytes());
        at += 2;
        buf[at..at + 4].copy_from_slice(&self.origin_pid.to_be_bytes());
        at += 4;
        #[allow(clippy::cast_possible_truncation)]
        let payload_len = self.payload.len().min(MAX_PAYLOAD) as u16;
        buf[at..at + 2].copy_from_slice(&payload_len.to_be_bytes());
        at += 2;
        let n = payload_len as usize;
        buf[at..at + n].copy_from_slice(&self.payload[..n]);
        buf
    }

    fn decode(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut at = 0;
        let src_ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
        at += 4;
        let src_port = u16::from_be_bytes([buf[at], buf[at + 1]]);
        at += 2;
        let dst_ip = Ipv4Addr::new(buf[at], buf[at + 1], buf[at + 2], buf[at + 3]);
        at += 4;
        let dst_port = u16::from_be_bytes([buf[at], buf[at + 1]]);
        at += 2;
        let origin_pid = u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        at += 4;
        let payload_len = u16::from_be_bytes([buf[at], buf[at + 1]]) as usize;
        at += 2;
        let payload = buf[at..at + payload_len.min(MAX_PAYLOAD)].to_vec();
        Self {
            src: SocketAddrV4::new(src_ip, src_port),
            dst: SocketAddrV4::new(dst_ip, dst_port),
            origin_pid,
            payload,
        }
    }

    fn is_broadcast(&self) -> bool {
        self.dst.ip() == &Ipv4Addr::BROADCAST
    }
}

/// File-backed transport for one interface.
pub struct FileTransport {
    interface: relaymesh_core::InterfaceId,
    file: File,
    read_offset: u64,
    origin_pid: u32,
    local_addr: SocketAddrV4,
    broadcast_drop_rate: f32,
    drop_unicasts: bool,
    roll: Box<dyn FnMut() -> f32 + Send>,
}

impl FileTransport {
    /// Open (creating if absent) the shared record file at `path`.
    pub async fn open(
        interface: relaymesh_core::InterfaceId,
        path: &std::path::Path,
        local_addr: SocketAddrV4,
        broadcast_drop_rate: f32,
        drop_unicasts: bool,
        roll: impl FnMut() -> f32 + Send + 'static,
    ) -> Result<Self, ServerError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| ServerError::Transport { interface, source })?;
        Ok(Self {
            interface,
            file,
            read_offset: 0,
            origin_pid: std::process::id(),
            local_addr,
            broadcast_drop_rate,
            drop_unicasts,
            roll: Box::new(roll),
        })
    }

    pub(super) async fn send(
        &mut self,
        dest: Option<SocketAddrV4>,
        bytes: &[u8],
    ) -> Result<(), ServerError> {
        let dest = dest.unwrap_or_else(|| SocketAddrV4::new(Ipv4Addr::BROADCAST, self.local_addr.port()));
        let record = FileRecord {
            src: self.local_addr,
            dst: dest,
            origin_pid: self.origin_pid,
            payload: bytes.to_vec(),
        };
        self.file
            .write_all(&record.encode())
            .await
            .map_err(|source| ServerError::Transport { interface: self.interface, source })
    }

    pub(super) async fn recv(&mut self) -> Result<Vec<Received>, ServerError> {
        let len = self
            .file
            .metadata()
            .await
            .map_err(|source| ServerError::Transport { interface: self.interface, source })?
            .len();

        let mut out = Vec::new();
        if len <= self.read_offset {
            return Ok(out);
        }

        self.file
            .seek(SeekFrom::Start(self.read_offset))
            .await
            .map_err(|source| ServerError::Transport { interface: self.interface, source })?;

        let mut buf = [0u8; RECORD_SIZE];
        while self.read_offset + RECORD_SIZE as u64 <= len {
            self.file
                .read_exact(&mut buf)
                .await
                .map_err(|source| ServerError::Transport { interface: self.interface, source })?;
            self.read_offset += RECORD_SIZE as u64;

            let record = FileRecord::decode(&buf);
            if record.origin_pid == self.origin_pid {
                continue;
            }
            if record.is_broadcast() && (self.roll)() < self.broadcast_drop_rate {
                trace!(interface = self.interface, "dropped simulated broadcast loss");
                continue;
            }
            if !record.is_broadcast() && self.drop_unicasts {
                continue;
            }
            out.push(Received { bytes: record.payload, from: Some(record.src) });
        }
        Ok(out)
    }
}
