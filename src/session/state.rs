//! Bridge Session state machine (C7, spec §4.7):
//!
//! ```text
//! Connect → Handshake → Attest → Established ↔ Heartbeat
//!                                     │
//!                                     └─→ Shutdown (terminal)
//! ```

use crate::error::KernelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connect,
    Handshake,
    Attest,
    Established,
    Heartbeat,
    Shutdown,
}

impl SessionState {
    /// Validates and applies one transition, per spec §4.7's transition
    /// table. Any transition not listed there is a programming error in the
    /// caller, not a recoverable protocol condition.
    pub fn transition(self, to: SessionState) -> Result<SessionState, KernelError> {
        use SessionState::*;
        let allowed = matches!(
            (self, to),
            (Connect, Handshake)
                | (Handshake, Attest)
                | (Attest, Established)
                | (Established, Heartbeat)
                | (Heartbeat, Established)
                | (Connect, Shutdown)
                | (Handshake, Shutdown)
                | (Attest, Shutdown)
                | (Established, Shutdown)
                | (Heartbeat, Shutdown)
        );
        if allowed {
            Ok(to)
        } else {
            Err(KernelError::Internal(format!(
                "illegal session transition {self:?} -> {to:?}"
            )))
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Shutdown)
    }
}
