//! `CapabilitySigner`: the narrow trait that hides the concrete signature
//! scheme from the rest of the capability store. Grounded directly in the
//! teacher's `crypto.rs` (`pqcrypto_dilithium::dilithium3`, `sha3::Sha3_256`)
//! — the same keypair/sign/verify shape, renamed to the vocabulary this
//! substrate uses (issuer identity, not validator identity) and narrowed to
//! exactly the two operations the capability store needs.

use pqcrypto_dilithium::dilithium3 as dilithium;
use pqcrypto_traits::sign::{DetachedSignature, PublicKey as _, SecretKey as _};

/// 32-byte issuer/subject identities throughout this module are SHA3-256
/// digests of the long-term Dilithium public key, not the raw key itself —
/// the raw Dilithium3 public key (1952 bytes) does not fit the spec's
/// fixed 32-byte identity field.
pub fn identity_of(public_key: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Sha3_256};
    Sha3_256::digest(public_key).into()
}

pub trait CapabilitySigner: Send + Sync {
    /// Long-term public key of this signer, for embedding in attestation
    /// responses and for recomputing `identity_of`.
    fn public_key(&self) -> &[u8];

    /// Produces a detached signature over `message`.
    fn sign(&self, message: &[u8]) -> Vec<u8>;
}

/// Verifies a detached signature against an arbitrary Dilithium3 public key.
/// Free function rather than a trait method: verification never needs the
/// signer's secret material, so any holder of a public key can call it.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let pk = match dilithium::PublicKey::from_bytes(public_key) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let sig = match dilithium::DetachedSignature::from_bytes(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    dilithium::verify_detached_signature(&sig, message, &pk).is_ok()
}

/// Default signer backed by an in-memory Dilithium3 keypair.
pub struct DilithiumSigner {
    public: Vec<u8>,
    secret: dilithium::SecretKey,
}

impl DilithiumSigner {
    pub fn generate() -> Self {
        let (pk, sk) = dilithium::keypair();
        Self {
            public: pk.as_bytes().to_vec(),
            secret: sk,
        }
    }

    pub fn from_secret_bytes(public: Vec<u8>, secret: &[u8]) -> Result<Self, crate::error::KernelError> {
        let secret = dilithium::SecretKey::from_bytes(secret)
            .map_err(|_| crate::error::KernelError::Internal("malformed signer secret key".into()))?;
        Ok(Self { public, secret })
    }

    /// Raw secret key bytes, for persisting the keypair to disk (`keygen`).
    pub fn secret_key_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl CapabilitySigner for DilithiumSigner {
    fn public_key(&self) -> &[u8] {
        &self.public
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        dilithium::detached_sign(message, &self.secret)
            .as_bytes()
            .to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_succeeds() {
        let signer = DilithiumSigner::generate();
        let msg = b"capability binding bytes";
        let sig = signer.sign(msg);
        assert!(verify_signature(signer.public_key(), msg, &sig));
    }

    #[test]
    fn tampered_message_fails_verification() {
        let signer = DilithiumSigner::generate();
        let sig = signer.sign(b"original");
        assert!(!verify_signature(signer.public_key(), b"tampered", &sig));
    }

    #[test]
    fn identity_is_stable_digest() {
        let signer = DilithiumSigner::generate();
        let a = identity_of(signer.public_key());
        let b = identity_of(signer.public_key());
        assert_eq!(a, b);
    }
}
