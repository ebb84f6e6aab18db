//! `CapabilityStore` (C3, spec §4.3): the sole owner of token issuance and
//! revocation. One store per kernel process, shared as `Arc<CapabilityStore>`
//! with an internal `RwLock` — reads (`verify`) vastly outnumber writes
//! (`mint`/`revoke`/`rotate_epoch`), so a single reader-preferring lock
//! around a plain `HashMap`/`HashSet` is enough; this mirrors spec §5's
//! general locking guidance rather than anything the teacher does verbatim,
//! since the teacher has no equivalent single-writer registry.

use crate::capability::signer::{identity_of, CapabilitySigner};
use crate::capability::token::{Permissions, Token, TokenKind, TOKEN_VERSION};
use crate::error::KernelError;
use rand::RngCore;
use std::collections::HashSet;
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

struct Inner {
    current_epoch: u64,
    revoked_nonces: HashSet<[u8; 16]>,
    token_ttl_max: Duration,
}

pub struct CapabilityStore {
    signer: Box<dyn CapabilitySigner>,
    issuer_identity: [u8; 32],
    inner: RwLock<Inner>,
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn fresh_nonce() -> [u8; 16] {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

impl CapabilityStore {
    pub fn new(signer: impl CapabilitySigner + 'static, token_ttl_max: Duration) -> Self {
        let issuer_identity = identity_of(signer.public_key());
        Self {
            signer: Box::new(signer),
            issuer_identity,
            inner: RwLock::new(Inner {
                current_epoch: 0,
                revoked_nonces: HashSet::new(),
                token_ttl_max,
            }),
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.inner.read().unwrap().current_epoch
    }

    /// `mint(subject, kind, permissions, ttl) -> token` (spec §4.3).
    pub fn mint(
        &self,
        subject: [u8; 32],
        kind: TokenKind,
        permissions: Permissions,
        ttl: Duration,
    ) -> Result<Token, KernelError> {
        let inner = self.inner.read().unwrap();
        let ttl = ttl.min(inner.token_ttl_max);
        let now = now_unix_secs();
        let mut token = Token {
            version: TOKEN_VERSION,
            kind,
            permissions: permissions.bits(),
            issuer: self.issuer_identity,
            subject,
            issued_at: now,
            expires_at: now + ttl.as_secs(),
            epoch: inner.current_epoch,
            nonce: fresh_nonce(),
            signature: Vec::new(),
        };
        token.signature = self.signer.sign(&token.signing_bytes());
        Ok(token)
    }

    /// `verify(token, op) -> ok | reason` (spec §4.3). Ordering rule from
    /// spec §4.3: a revoked nonce is reported as `ErrRevoked` even when the
    /// signature is otherwise valid — checked before expiry and epoch.
    pub fn verify(
        &self,
        token: &Token,
        subject: [u8; 32],
        required: Permissions,
    ) -> Result<(), KernelError> {
        if !token.signature_valid(self.signer.public_key()) {
            return Err(KernelError::Auth("capability signature invalid".into()));
        }
        if token.subject != subject {
            return Err(KernelError::Auth("capability subject mismatch".into()));
        }

        let inner = self.inner.read().unwrap();
        if inner.revoked_nonces.contains(&token.nonce) {
            return Err(KernelError::Revoked);
        }
        let now = now_unix_secs();
        if !token.is_live_at(now) {
            return Err(KernelError::Expired);
        }
        if token.epoch < inner.current_epoch {
            return Err(KernelError::Epoch);
        }
        if !token.permissions().allows(required) {
            return Err(KernelError::Capability);
        }
        Ok(())
    }

    /// `revoke(token_id)`: the nonce is the token's unique identifier (spec
    /// §4.3 models `token_id` as the nonce, since the record has no other
    /// unique field). Entries are never pruned by this call; expired
    /// revocations are harmless dead weight the store could sweep
    /// periodically, which this implementation does not yet do.
    pub fn revoke(&self, nonce: [u8; 16]) {
        self.inner.write().unwrap().revoked_nonces.insert(nonce);
    }

    /// `rotate_epoch()`: invalidates every token minted under a lower epoch.
    pub fn rotate_epoch(&self) -> u64 {
        let mut inner = self.inner.write().unwrap();
        inner.current_epoch += 1;
        inner.current_epoch
    }

    /// `refresh(token) -> token'`: only succeeds if the presented token is
    /// still fully valid (spec §4.3).
    pub fn refresh(
        &self,
        token: &Token,
        subject: [u8; 32],
        ttl: Duration,
    ) -> Result<Token, KernelError> {
        self.verify(token, subject, Permissions::empty())?;
        self.mint(subject, token.kind, token.permissions(), ttl)
    }
}
