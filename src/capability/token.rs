//! Capability token record and its permission bitmap (spec §4.3 "Capability
//! token"). The binding bytes signed by the issuer are produced by
//! `Token::signing_bytes`, a fixed, order-stable encoding — deliberately not
//! `serde_json`, since the signature must bind exact bytes rather than
//! whatever a future JSON field-ordering or whitespace change might
//! produce.

use crate::capability::signer::verify_signature;
use serde::{Deserialize, Serialize};

/// One bit per named permission (spec §4.3). Three bits are reserved for
/// future grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions(u16);

impl Permissions {
    pub const SPAWN: u16 = 1 << 0;
    pub const KILL: u16 = 1 << 1;
    pub const ALLOC: u16 = 1 << 2;
    pub const FREE: u16 = 1 << 3;
    pub const READ: u16 = 1 << 4;
    pub const WRITE: u16 = 1 << 5;
    pub const SUBMIT: u16 = 1 << 6;
    pub const EMIT: u16 = 1 << 7;
    pub const SUBSCRIBE: u16 = 1 << 8;
    pub const RECONFIGURE: u16 = 1 << 9;
    pub const SECURITY_ADMIN: u16 = 1 << 10;
    pub const FEDERATION_JOIN: u16 = 1 << 11;
    pub const FEDERATION_SYNC: u16 = 1 << 12;

    pub fn empty() -> Self {
        Permissions(0)
    }

    pub fn from_bits(bits: u16) -> Self {
        Permissions(bits)
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn with(mut self, mask: u16) -> Self {
        self.0 |= mask;
        self
    }

    /// True iff every bit set in `required` is also set here (spec §4.3:
    /// "the requested operation is a subset of the permission bitmap").
    pub fn allows(self, required: Permissions) -> bool {
        self.0 & required.0 == required.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    System,
    Agent,
    User,
    Federation,
    Ephemeral,
}

pub const TOKEN_VERSION: u8 = 1;

/// A signed capability grant (spec §4.3). `nonce` is the revocation key:
/// `CapabilityStore::revoke` blocks this exact nonce, not the whole
/// (issuer, subject) pair, so refreshed tokens are unaffected by revoking an
/// earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub version: u8,
    pub kind: TokenKind,
    pub permissions: u16,
    pub issuer: [u8; 32],
    pub subject: [u8; 32],
    pub issued_at: u64,
    pub expires_at: u64,
    pub epoch: u64,
    pub nonce: [u8; 16],
    pub signature: Vec<u8>,
}

impl Token {
    /// The exact bytes the issuer's signature binds: every field except the
    /// signature itself, in a fixed order with explicit big-endian widths.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 1 + 2 + 32 + 32 + 8 + 8 + 8 + 16);
        buf.push(self.version);
        buf.push(match self.kind {
            TokenKind::System => 0,
            TokenKind::Agent => 1,
            TokenKind::User => 2,
            TokenKind::Federation => 3,
            TokenKind::Ephemeral => 4,
        });
        buf.extend_from_slice(&self.permissions.to_be_bytes());
        buf.extend_from_slice(&self.issuer);
        buf.extend_from_slice(&self.subject);
        buf.extend_from_slice(&self.issued_at.to_be_bytes());
        buf.extend_from_slice(&self.expires_at.to_be_bytes());
        buf.extend_from_slice(&self.epoch.to_be_bytes());
        buf.extend_from_slice(&self.nonce);
        buf
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::from_bits(self.permissions)
    }

    /// Signature-only check; callers needing full validity (expiry, epoch,
    /// revocation) go through `CapabilityStore::verify`.
    pub fn signature_valid(&self, issuer_public_key: &[u8]) -> bool {
        verify_signature(issuer_public_key, &self.signing_bytes(), &self.signature)
    }

    /// A token with `expires_at == now` is already expired (spec §8 boundary
    /// behaviors: "A capability with `expires_at == now` is considered
    /// expired"), so the upper bound is strict.
    pub fn is_live_at(&self, now_unix_secs: u64) -> bool {
        now_unix_secs >= self.issued_at && (self.expires_at == 0 || now_unix_secs < self.expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_subset_check() {
        let granted = Permissions::empty().with(Permissions::EMIT).with(Permissions::SUBSCRIBE);
        assert!(granted.allows(Permissions::from_bits(Permissions::EMIT)));
        assert!(!granted.allows(Permissions::from_bits(Permissions::SPAWN)));
        assert!(granted.allows(Permissions::empty()));
    }

    #[test]
    fn never_expires_when_expires_at_zero() {
        let mut t = sample_token();
        t.expires_at = 0;
        assert!(t.is_live_at(u64::MAX / 2));
    }

    #[test]
    fn expires_at_equal_to_now_is_already_expired() {
        let t = sample_token();
        assert!(t.is_live_at(t.expires_at - 1));
        assert!(!t.is_live_at(t.expires_at));
    }

    fn sample_token() -> Token {
        Token {
            version: TOKEN_VERSION,
            kind: TokenKind::Agent,
            permissions: Permissions::EMIT,
            issuer: [1u8; 32],
            subject: [2u8; 32],
            issued_at: 0,
            expires_at: 100,
            epoch: 0,
            nonce: [0u8; 16],
            signature: Vec::new(),
        }
    }
}
