//! Crate-wide error taxonomy.
//!
//! Every component-level error (wire, capability, ledger, raft, session)
//! ultimately maps into one of these variants so that a frame's error
//! response can carry a single, well-known code (spec §6/§7). Component
//! modules define their own narrower `thiserror` enums and convert into
//! `KernelError` only at the boundary where a response frame is built.

use thiserror::Error;

/// The error taxonomy carried on the wire (spec §6 "Error codes").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("capability does not grant this operation")]
    Capability,

    #[error("capability token expired")]
    Expired,

    #[error("capability token revoked")]
    Revoked,

    #[error("capability token epoch is stale")]
    Epoch,

    #[error("resource exhausted: {0}")]
    Resource(String),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    Exists,

    #[error("operation timed out")]
    Timeout,

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl KernelError {
    /// Short stable code used in error frames and log fields.
    pub fn code(&self) -> &'static str {
        match self {
            KernelError::Protocol(_) => "ErrProtocol",
            KernelError::Auth(_) => "ErrAuth",
            KernelError::Capability => "ErrCapability",
            KernelError::Expired => "ErrExpired",
            KernelError::Revoked => "ErrRevoked",
            KernelError::Epoch => "ErrEpoch",
            KernelError::Resource(_) => "ErrResource",
            KernelError::NotFound => "ErrNotFound",
            KernelError::Exists => "ErrExists",
            KernelError::Timeout => "ErrTimeout",
            KernelError::Cancelled => "ErrCancelled",
            KernelError::Internal(_) => "ErrInternal",
        }
    }

    /// Whether the spec's retry policy (§7) allows an automatic retry.
    pub fn retryable(&self) -> bool {
        matches!(self, KernelError::Resource(_) | KernelError::Timeout)
    }

    /// Whether this error requires re-authentication before any retry.
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            KernelError::Auth(_)
                | KernelError::Capability
                | KernelError::Expired
                | KernelError::Revoked
                | KernelError::Epoch
        )
    }

    /// Whether this error tears down the owning session (spec §7).
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, KernelError::Protocol(_) | KernelError::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, KernelError>;
