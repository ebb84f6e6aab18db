//! Framed transport (C1, spec §4.1): read/write whole frames over any
//! reliable, ordered byte stream. Grounded in the teacher's
//! `net/encrypted.rs` chunked-stream pattern (split read/write halves,
//! length-checked reads before touching the payload), generalized from a
//! TCP-only Noise stream to any `AsyncRead + AsyncWrite` transport.

use crate::error::KernelError;
use crate::wire::codec::RawFrame;
use crate::wire::frame::{Header, HEADER_LEN};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Reads and writes whole frames over `S`. Read is atomic per frame: either
/// the full frame arrives or the connection is torn down (spec §4.1).
pub struct FramedTransport<S> {
    stream: Mutex<S>,
    payload_ceiling: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedTransport<S> {
    pub fn new(stream: S, payload_ceiling: usize) -> Self {
        Self {
            stream: Mutex::new(stream),
            payload_ceiling,
        }
    }

    /// Writes one frame atomically with respect to other writers sharing
    /// this transport (spec §4.1: "the transport never interleaves two
    /// logical frames").
    pub async fn send(&self, header: &Header, payload: &[u8]) -> Result<(), KernelError> {
        if payload.len() > self.payload_ceiling {
            return Err(KernelError::Protocol("payload exceeds ceiling".into()));
        }
        let mut stream = self.stream.lock().await;
        stream
            .write_all(&header.encode())
            .await
            .map_err(|e| KernelError::Internal(format!("transport write: {e}")))?;
        stream
            .write_all(payload)
            .await
            .map_err(|e| KernelError::Internal(format!("transport write: {e}")))?;
        stream
            .flush()
            .await
            .map_err(|e| KernelError::Internal(format!("transport flush: {e}")))?;
        Ok(())
    }

    /// Reads one frame. On any malformed-header condition the caller must
    /// treat the connection as closed (`ErrProtocol`, spec §4.1) — this
    /// function does not retry or resynchronize the stream.
    pub async fn receive(&self) -> Result<RawFrame, KernelError> {
        let mut stream = self.stream.lock().await;
        let mut header_buf = [0u8; HEADER_LEN];
        read_exact_or_eof(&mut *stream, &mut header_buf).await?;
        let header = Header::decode(&header_buf)?;

        if header.payload_len as usize > self.payload_ceiling {
            return Err(KernelError::Protocol(
                "payload_length exceeds configured ceiling".into(),
            ));
        }

        let mut payload = vec![0u8; header.payload_len as usize];
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| KernelError::Internal(format!("transport read: {e}")))?;

        Ok(RawFrame { header, payload })
    }
}

/// Like `read_exact`, but a clean EOF on the very first byte is reported as
/// a protocol-level close rather than a generic I/O error, since that's the
/// ordinary way a peer disconnects between frames.
async fn read_exact_or_eof<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut [u8],
) -> Result<(), KernelError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream
            .read(&mut buf[filled..])
            .await
            .map_err(|e| KernelError::Internal(format!("transport read: {e}")))?;
        if n == 0 {
            if filled == 0 {
                return Err(KernelError::Protocol("connection closed".into()));
            }
            return Err(KernelError::Protocol(
                "connection closed mid-frame".into(),
            ));
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::frame::{Flags, Opcode, Priority, PROTOCOL_VERSION};
    use tokio::io::duplex;

    fn header(seq: u64, payload_len: u32) -> Header {
        Header {
            version: PROTOCOL_VERSION,
            opcode: Opcode::EventEmit,
            priority: Priority::Normal,
            flags: Flags::empty(),
            capability_ref: 1,
            payload_len,
            sequence: seq,
            timestamp_ns: 0,
        }
    }

    #[tokio::test]
    async fn send_then_receive_round_trips() {
        let (client, server) = duplex(4096);
        let client_t = FramedTransport::new(client, 1024);
        let server_t = FramedTransport::new(server, 1024);

        let payload = b"hello".to_vec();
        client_t
            .send(&header(1, payload.len() as u32), &payload)
            .await
            .unwrap();

        let frame = server_t.receive().await.unwrap();
        assert_eq!(frame.header.sequence, 1);
        assert_eq!(frame.payload, payload);
    }

    #[tokio::test]
    async fn rejects_oversize_payload_on_receive() {
        let (client, server) = duplex(8192);
        let client_t = FramedTransport::new(client, 4096);
        let server_t = FramedTransport::new(server, 8); // tiny ceiling on the reader

        let payload = vec![0u8; 64];
        client_t
            .send(&header(1, payload.len() as u32), &payload)
            .await
            .unwrap();

        let result = server_t.receive().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_oversize_payload_on_send() {
        let (client, _server) = duplex(8192);
        let client_t = FramedTransport::new(client, 8);
        let payload = vec![0u8; 64];
        let result = client_t.send(&header(1, payload.len() as u32), &payload).await;
        assert!(result.is_err());
    }
}
