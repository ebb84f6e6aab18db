//! Capability Store (C3, spec §4.3): mint, verify, revoke, rotate the
//! epoch, and refresh short-lived capability tokens.

pub mod signer;
pub mod store;
pub mod token;

pub use signer::{identity_of, verify_signature, CapabilitySigner, DilithiumSigner};
pub use store::CapabilityStore;
pub use token::{Permissions, Token, TokenKind, TOKEN_VERSION};
