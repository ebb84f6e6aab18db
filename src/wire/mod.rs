//! Wire protocol: frame header (C2 header format), payload codec, and the
//! framed transport that reads/writes whole frames (C1).

pub mod codec;
pub mod frame;
pub mod transport;

pub use codec::{decode_payload, encode_frame, PayloadEncoding, RawFrame};
pub use frame::{Flags, Header, Opcode, Priority, HEADER_LEN, PROTOCOL_MAGIC, PROTOCOL_VERSION};
pub use transport::FramedTransport;
