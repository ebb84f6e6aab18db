//! Ledger entry shape and the hash-chain function (spec §4.4).
//!
//! Hashing reuses `sha3::Sha3_256`, the same hash the teacher already
//! depends on for its own chain/Merkle hashing in `crypto.rs`, rather than
//! pulling in a new hash crate.

use crate::wire::frame::{Header, HEADER_LEN};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

pub type Hash = [u8; 32];

/// `h_{-1}`: the fixed constant preceding the first real entry (spec §4.4).
pub fn genesis_hash() -> Hash {
    Sha3_256::digest(b"sovereign-kernel-substrate/ledger-genesis").into()
}

/// A logical ledger record: index, Raft term, the originating frame's
/// header with its transient `capability_ref` zeroed (spec §4.4 — the
/// capability reference is per-connection and meaningless once replicated),
/// the payload, and the hash binding all of it to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub index: u64,
    pub term: u64,
    pub header: [u8; HEADER_LEN],
    pub payload: Vec<u8>,
    pub previous_hash: Hash,
    pub hash: Hash,
}

/// `h_i = H(h_{i-1} ‖ index_i ‖ term_i ‖ header_i ‖ payload_i)`.
pub fn chain_hash(previous_hash: &Hash, index: u64, term: u64, header: &[u8; HEADER_LEN], payload: &[u8]) -> Hash {
    let mut hasher = Sha3_256::new();
    hasher.update(previous_hash);
    hasher.update(index.to_be_bytes());
    hasher.update(term.to_be_bytes());
    hasher.update(header);
    hasher.update(payload);
    hasher.finalize().into()
}

/// Header bytes stored in a ledger entry: identical to the frame header's
/// wire encoding but with `capability_ref` zeroed.
pub fn strip_capability_ref(header: &Header) -> [u8; HEADER_LEN] {
    let mut bytes = header.encode();
    bytes[8..10].copy_from_slice(&[0u8; 2]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_hash_is_deterministic() {
        let prev = genesis_hash();
        let header = [0u8; HEADER_LEN];
        let a = chain_hash(&prev, 0, 0, &header, b"payload");
        let b = chain_hash(&prev, 0, 0, &header, b"payload");
        assert_eq!(a, b);
    }

    #[test]
    fn chain_hash_is_sensitive_to_payload() {
        let prev = genesis_hash();
        let header = [0u8; HEADER_LEN];
        let a = chain_hash(&prev, 0, 0, &header, b"a");
        let b = chain_hash(&prev, 0, 0, &header, b"b");
        assert_ne!(a, b);
    }
}
