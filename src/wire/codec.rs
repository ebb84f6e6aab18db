//! Message codec (C2, spec §4.2): fixed header plus a content-typed payload
//! envelope. JSON is the default payload encoding; `postcard` is the
//! negotiated compact alternative. Following the teacher crate's own
//! documented security rule ("postcard for network, bincode for local
//! storage only" — bincode's unbounded length prefixes make it unsafe to
//! deserialize from an untrusted peer), `bincode` never appears on this
//! path; it is reserved for the ledger's local, trusted on-disk framing.

use crate::error::KernelError;
use crate::wire::frame::{Header, HEADER_LEN};
use serde::{de::DeserializeOwned, Serialize};

/// Payload encoding negotiated during handshake (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    Json,
    Postcard,
}

/// A decoded frame: header plus raw (still-encoded) payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// Encodes a typed payload under the negotiated encoding and builds the
/// full header+payload byte sequence ready for the transport to write.
///
/// Fatal only to the in-flight message (`ErrEncoding`, spec §4.2) — callers
/// should not tear down the session on an encode failure of their own
/// outbound message.
pub fn encode_frame<T: Serialize>(
    mut header: Header,
    payload: &T,
    encoding: PayloadEncoding,
) -> Result<Vec<u8>, KernelError> {
    let encoded_payload = match encoding {
        PayloadEncoding::Json => serde_json::to_vec(payload)
            .map_err(|e| KernelError::Internal(format!("json encode: {e}")))?,
        PayloadEncoding::Postcard => postcard::to_allocvec(payload)
            .map_err(|e| KernelError::Internal(format!("postcard encode: {e}")))?,
    };

    header.payload_len = encoded_payload
        .len()
        .try_into()
        .map_err(|_| KernelError::Internal("payload too large to address".into()))?;

    let mut out = Vec::with_capacity(HEADER_LEN + encoded_payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&encoded_payload);
    Ok(out)
}

/// Decodes a typed payload from a [`RawFrame`], verifying that
/// `payload_length == len(encoded_payload)` as required by spec §4.2.
pub fn decode_payload<T: DeserializeOwned>(
    frame: &RawFrame,
    encoding: PayloadEncoding,
) -> Result<T, KernelError> {
    if frame.payload.len() as u64 != frame.header.payload_len as u64 {
        return Err(KernelError::Protocol(
            "payload_length does not match encoded payload".into(),
        ));
    }
    match encoding {
        PayloadEncoding::Json => serde_json::from_slice(&frame.payload)
            .map_err(|e| KernelError::Internal(format!("json decode: {e}"))),
        PayloadEncoding::Postcard => postcard::from_bytes(&frame.payload)
            .map_err(|e| KernelError::Internal(format!("postcard decode: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::frame::{Flags, Opcode, Priority, PROTOCOL_VERSION};
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Demo {
        a: u32,
        b: String,
    }

    fn header() -> Header {
        Header {
            version: PROTOCOL_VERSION,
            opcode: Opcode::EventEmit,
            priority: Priority::Normal,
            flags: Flags::empty(),
            capability_ref: 1,
            payload_len: 0,
            sequence: 1,
            timestamp_ns: 0,
        }
    }

    #[test]
    fn json_round_trips() {
        let payload = Demo { a: 7, b: "hi".into() };
        let bytes = encode_frame(header(), &payload, PayloadEncoding::Json).unwrap();
        let (hdr_bytes, payload_bytes) = bytes.split_at(HEADER_LEN);
        let decoded_header = Header::decode(hdr_bytes.try_into().unwrap()).unwrap();
        let raw = RawFrame {
            header: decoded_header,
            payload: payload_bytes.to_vec(),
        };
        let decoded: Demo = decode_payload(&raw, PayloadEncoding::Json).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn postcard_round_trips() {
        let payload = Demo { a: 99, b: "bye".into() };
        let bytes = encode_frame(header(), &payload, PayloadEncoding::Postcard).unwrap();
        let (hdr_bytes, payload_bytes) = bytes.split_at(HEADER_LEN);
        let decoded_header = Header::decode(hdr_bytes.try_into().unwrap()).unwrap();
        let raw = RawFrame {
            header: decoded_header,
            payload: payload_bytes.to_vec(),
        };
        let decoded: Demo = decode_payload(&raw, PayloadEncoding::Postcard).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn rejects_length_mismatch() {
        let payload = Demo { a: 1, b: "x".into() };
        let mut h = header();
        h.payload_len = 999;
        let encoded_payload = serde_json::to_vec(&payload).unwrap();
        let raw = RawFrame {
            header: h,
            payload: encoded_payload,
        };
        let decoded: Result<Demo, _> = decode_payload(&raw, PayloadEncoding::Json);
        assert!(decoded.is_err());
    }
}
