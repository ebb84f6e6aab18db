//! Bridge Session (C7, spec §4.7): the per-connection state machine, replay
//! protection, heartbeat liveness, and reconnect backoff. One
//! `BridgeSession` per connected daemon, driven by one tokio task each (spec
//! §5: "each session is processed sequentially").

pub mod backoff;
pub mod ban;
pub mod replay;
pub mod state;

use crate::capability::Token;
use crate::error::KernelError;
use crate::session::replay::ReplayGuard;
use crate::session::state::SessionState;
use crate::wire::{FramedTransport, RawFrame};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncRead, AsyncWrite};

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

pub struct BridgeSession<S> {
    pub session_id: u64,
    pub principal: [u8; 32],
    transport: FramedTransport<S>,
    state: SessionState,
    replay_guard: ReplayGuard,
    installed_capability: Option<Token>,
    last_heartbeat_at: Instant,
    heartbeat_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> BridgeSession<S> {
    pub fn new(
        session_id: u64,
        principal: [u8; 32],
        transport: FramedTransport<S>,
        skew_window: Duration,
        heartbeat_timeout: Duration,
    ) -> Self {
        Self {
            session_id,
            principal,
            transport,
            state: SessionState::Connect,
            replay_guard: ReplayGuard::new(skew_window),
            installed_capability: None,
            last_heartbeat_at: Instant::now(),
            heartbeat_timeout,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Applies a state transition, rejecting anything not in spec §4.7's
    /// transition table.
    pub fn advance(&mut self, to: SessionState) -> Result<(), KernelError> {
        self.state = self.state.transition(to)?;
        Ok(())
    }

    /// Attest→Established (spec §4.7): installs the freshly minted
    /// capability at ref 1 and moves the state machine forward in one step.
    pub fn install_initial_capability(&mut self, token: Token) -> Result<(), KernelError> {
        self.advance(SessionState::Established)?;
        self.installed_capability = Some(token);
        Ok(())
    }

    pub fn installed_capability(&self) -> Option<&Token> {
        self.installed_capability.as_ref()
    }

    pub fn record_heartbeat(&mut self) {
        self.last_heartbeat_at = Instant::now();
    }

    pub fn is_heartbeat_expired(&self) -> bool {
        self.last_heartbeat_at.elapsed() > self.heartbeat_timeout
    }

    /// Reads the next frame and applies replay protection. A `Protocol`
    /// error here is session-fatal per `KernelError::is_session_fatal` —
    /// callers should transition to `Shutdown` and tear the connection down,
    /// never attempt to resynchronize.
    pub async fn receive_frame(&mut self) -> Result<RawFrame, KernelError> {
        let frame = self.transport.receive().await?;
        self.replay_guard.check(
            frame.header.opcode,
            frame.header.sequence,
            frame.header.timestamp_ns,
            now_ns(),
        )?;
        Ok(frame)
    }

    pub async fn send(&self, header: &crate::wire::Header, payload: &[u8]) -> Result<(), KernelError> {
        self.transport.send(header, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::frame::{Flags, Opcode, Priority, PROTOCOL_VERSION};
    use tokio::io::duplex;

    fn header(seq: u64, opcode: Opcode) -> crate::wire::Header {
        crate::wire::Header {
            version: PROTOCOL_VERSION,
            opcode,
            priority: Priority::Normal,
            flags: Flags::empty(),
            capability_ref: 0,
            payload_len: 0,
            sequence: seq,
            timestamp_ns: now_ns(),
        }
    }

    #[tokio::test]
    async fn receive_frame_rejects_replayed_sequence() {
        let (client, server) = duplex(4096);
        let client_transport = FramedTransport::new(client, 4096);
        let mut session = BridgeSession::new(
            1,
            [0u8; 32],
            FramedTransport::new(server, 4096),
            Duration::from_secs(30),
            Duration::from_secs(15),
        );

        client_transport.send(&header(1, Opcode::EventEmit), b"").await.unwrap();
        client_transport.send(&header(1, Opcode::EventEmit), b"").await.unwrap();

        assert!(session.receive_frame().await.is_ok());
        assert!(session.receive_frame().await.is_err());
    }

    #[test]
    fn heartbeat_tracks_liveness() {
        let (_client, server) = tokio::io::duplex(16);
        let mut session = BridgeSession::new(
            2,
            [0u8; 32],
            FramedTransport::new(server, 16),
            Duration::from_secs(30),
            Duration::from_secs(15),
        );
        assert!(!session.is_heartbeat_expired());
        session.record_heartbeat();
        assert!(!session.is_heartbeat_expired());
    }
}
