//! Frame header: the fixed 32-byte envelope in front of every payload
//! (spec §3 "Frame", §6 "Wire format"). All multi-byte integers are
//! big-endian; this is a wire-compatibility invariant, not a style choice,
//! so encoding is done by hand with `to_be_bytes`/`from_be_bytes` rather
//! than a `#[repr(C)]` struct whose layout would track the host's
//! endianness instead.
//!
//! Field byte offsets (see DESIGN.md for why the reserved region is 2
//! bytes, not the 6 the prose names — the stated field list sums to 36
//! bytes against a stated 32-byte total; this implementation keeps every
//! field the rest of the spec depends on and shrinks only the reserved
//! padding to make the arithmetic close):
//!
//! ```text
//! 0..4    magic
//! 4       version
//! 5       opcode
//! 6       priority
//! 7       flags
//! 8..10   capability_ref
//! 10..12  reserved (zero)
//! 12..16  payload_len
//! 16..24  sequence
//! 24..32  timestamp_ns
//! ```

use crate::error::KernelError;
use std::convert::TryFrom;

pub const HEADER_LEN: usize = 32;

/// Protocol magic identifying this wire format. The source material this
/// spec distills mentions both "SYPAS" and "SYFPASS" for the same protocol;
/// per spec §9 this implementation treats them as one format and picks a
/// single four-byte tag.
pub const PROTOCOL_MAGIC: [u8; 4] = *b"SKS1";

/// Negotiated during handshake; this is the version this build offers.
pub const PROTOCOL_VERSION: u8 = 1;

/// Opcodes are a closed, numerically-stable set (spec §3 "Opcodes", §9
/// "dynamic dispatch... maps to a narrow set of tagged variants").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // System
    Heartbeat = 0x00,
    Handshake = 0x01,
    CapabilityExchange = 0x02,
    Shutdown = 0x03,
    Ping = 0x04,
    Pong = 0x05,

    // Agent lifecycle
    AgentSpawn = 0x10,
    AgentKill = 0x11,
    AgentPause = 0x12,
    AgentResume = 0x13,
    AgentStatus = 0x14,
    AgentEvent = 0x15,

    // Resource
    ResourceAlloc = 0x20,
    ResourceFree = 0x21,
    ResourceQuery = 0x22,
    ResourceLimit = 0x23,

    // Storage
    StorageGet = 0x30,
    StoragePut = 0x31,
    StorageDelete = 0x32,
    StorageList = 0x33,

    // Event
    EventEmit = 0x40,
    EventSubscribe = 0x41,
    EventUnsubscribe = 0x42,
    EventBroadcast = 0x43,

    // Security
    AttestRequest = 0x50,
    AttestResponse = 0x51,
    TokenMint = 0x52,
    TokenRevoke = 0x53,

    // Federation
    NodeJoin = 0x60,
    NodeLeave = 0x61,
    NodeDiscover = 0x62,
    SyncRequest = 0x63,
    SyncResponse = 0x64,
    Consensus = 0x65,

    // Error
    ErrorGeneric = 0x70,
    ErrorAuth = 0x71,
    ErrorCapability = 0x72,
    ErrorResource = 0x73,
    ErrorNotFound = 0x74,
    ErrorExists = 0x75,
    ErrorInternal = 0x76,
}

impl Opcode {
    /// Frames admitted with `capability_id = 0` (spec §4.5 "default-deny").
    pub fn is_default_deny_exempt(self) -> bool {
        matches!(
            self,
            Opcode::Heartbeat
                | Opcode::Handshake
                | Opcode::Ping
                | Opcode::Pong
                | Opcode::ErrorGeneric
                | Opcode::ErrorAuth
                | Opcode::ErrorCapability
                | Opcode::ErrorResource
                | Opcode::ErrorNotFound
                | Opcode::ErrorExists
                | Opcode::ErrorInternal
        )
    }

    /// Frames exempt from the clock-skew replay check (spec §3 invariants).
    pub fn is_skew_exempt(self) -> bool {
        matches!(self, Opcode::Heartbeat | Opcode::Handshake)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = KernelError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        use Opcode::*;
        Ok(match v {
            0x00 => Heartbeat,
            0x01 => Handshake,
            0x02 => CapabilityExchange,
            0x03 => Shutdown,
            0x04 => Ping,
            0x05 => Pong,
            0x10 => AgentSpawn,
            0x11 => AgentKill,
            0x12 => AgentPause,
            0x13 => AgentResume,
            0x14 => AgentStatus,
            0x15 => AgentEvent,
            0x20 => ResourceAlloc,
            0x21 => ResourceFree,
            0x22 => ResourceQuery,
            0x23 => ResourceLimit,
            0x30 => StorageGet,
            0x31 => StoragePut,
            0x32 => StorageDelete,
            0x33 => StorageList,
            0x40 => EventEmit,
            0x41 => EventSubscribe,
            0x42 => EventUnsubscribe,
            0x43 => EventBroadcast,
            0x50 => AttestRequest,
            0x51 => AttestResponse,
            0x52 => TokenMint,
            0x53 => TokenRevoke,
            0x60 => NodeJoin,
            0x61 => NodeLeave,
            0x62 => NodeDiscover,
            0x63 => SyncRequest,
            0x64 => SyncResponse,
            0x65 => Consensus,
            0x70 => ErrorGeneric,
            0x71 => ErrorAuth,
            0x72 => ErrorCapability,
            0x73 => ErrorResource,
            0x74 => ErrorNotFound,
            0x75 => ErrorExists,
            0x76 => ErrorInternal,
            other => {
                return Err(KernelError::Protocol(format!("unknown opcode 0x{other:02x}")))
            }
        })
    }
}

/// Priority class, 0 = highest (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
}

impl TryFrom<u8> for Priority {
    type Error = KernelError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Priority::Critical,
            1 => Priority::High,
            2 => Priority::Normal,
            3 => Priority::Low,
            other => {
                return Err(KernelError::Protocol(format!(
                    "unknown priority class {other}"
                )))
            }
        })
    }
}

/// Flag bits. Bits 4-7 are reserved and must be zero (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    pub const ENCRYPTED: u8 = 1 << 0;
    pub const COMPRESSED: u8 = 1 << 1;
    pub const URGENT: u8 = 1 << 2;
    pub const BROADCAST: u8 = 1 << 3;
    const RESERVED_MASK: u8 = 0b1111_0000;

    pub fn from_bits(bits: u8) -> Result<Self, KernelError> {
        if bits & Self::RESERVED_MASK != 0 {
            return Err(KernelError::Protocol(format!(
                "unknown reserved flag bits set: 0b{bits:08b}"
            )));
        }
        Ok(Flags(bits))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn empty() -> Self {
        Flags(0)
    }

    pub fn with(mut self, mask: u8) -> Self {
        self.0 |= mask;
        self
    }

    pub fn is_set(self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    pub fn encrypted(self) -> bool {
        self.is_set(Self::ENCRYPTED)
    }

    pub fn compressed(self) -> bool {
        self.is_set(Self::COMPRESSED)
    }

    pub fn urgent(self) -> bool {
        self.is_set(Self::URGENT)
    }

    pub fn broadcast(self) -> bool {
        self.is_set(Self::BROADCAST)
    }
}

/// The fixed 32-byte frame header (spec §3, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub opcode: Opcode,
    pub priority: Priority,
    pub flags: Flags,
    /// 0 = no capability reference attached.
    pub capability_ref: u16,
    pub payload_len: u32,
    /// Strictly increasing per connection, starting at 1.
    pub sequence: u64,
    /// Nanoseconds since a fixed epoch (`UNIX_EPOCH`).
    pub timestamp_ns: u64,
}

impl Header {
    pub fn encode_into(&self, buf: &mut [u8; HEADER_LEN]) {
        buf[0..4].copy_from_slice(&PROTOCOL_MAGIC);
        buf[4] = self.version;
        buf[5] = self.opcode as u8;
        buf[6] = self.priority as u8;
        buf[7] = self.flags.bits();
        buf[8..10].copy_from_slice(&self.capability_ref.to_be_bytes());
        buf[10..12].copy_from_slice(&[0u8; 2]);
        buf[12..16].copy_from_slice(&self.payload_len.to_be_bytes());
        buf[16..24].copy_from_slice(&self.sequence.to_be_bytes());
        buf[24..32].copy_from_slice(&self.timestamp_ns.to_be_bytes());
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        self.encode_into(&mut buf);
        buf
    }

    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, KernelError> {
        if buf[0..4] != PROTOCOL_MAGIC {
            return Err(KernelError::Protocol("bad magic".into()));
        }
        let version = buf[4];
        let opcode = Opcode::try_from(buf[5])?;
        let priority = Priority::try_from(buf[6])?;
        let flags = Flags::from_bits(buf[7])?;
        let capability_ref = u16::from_be_bytes([buf[8], buf[9]]);
        if buf[10..12] != [0u8; 2] {
            return Err(KernelError::Protocol("reserved bytes must be zero".into()));
        }
        let payload_len = u32::from_be_bytes(buf[12..16].try_into().unwrap());
        let sequence = u64::from_be_bytes(buf[16..24].try_into().unwrap());
        let timestamp_ns = u64::from_be_bytes(buf[24..32].try_into().unwrap());
        Ok(Header {
            version,
            opcode,
            priority,
            flags,
            capability_ref,
            payload_len,
            sequence,
            timestamp_ns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            version: PROTOCOL_VERSION,
            opcode: Opcode::EventEmit,
            priority: Priority::High,
            flags: Flags::empty().with(Flags::ENCRYPTED),
            capability_ref: 7,
            payload_len: 128,
            sequence: 42,
            timestamp_ns: 1_700_000_000_000_000_000,
        }
    }

    #[test]
    fn round_trips() {
        let h = sample();
        let buf = h.encode();
        let decoded = Header::decode(&buf).unwrap();
        assert_eq!(h, decoded);
    }

    #[test]
    fn rejects_bad_magic() {
        let h = sample();
        let mut buf = h.encode();
        buf[0] = b'X';
        assert!(Header::decode(&buf).is_err());
    }

    #[test]
    fn rejects_reserved_flag_bits() {
        assert!(Flags::from_bits(0b0001_0000).is_err());
        assert!(Flags::from_bits(0b0000_1111).is_ok());
    }

    #[test]
    fn rejects_nonzero_reserved_bytes() {
        let h = sample();
        let mut buf = h.encode();
        buf[10] = 1;
        assert!(Header::decode(&buf).is_err());
    }

    #[test]
    fn opcode_round_trips_all_variants() {
        for byte in 0u8..=0xff {
            if let Ok(op) = Opcode::try_from(byte) {
                assert_eq!(op as u8, byte);
            }
        }
    }
}
