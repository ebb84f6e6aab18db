//! Replay protection (spec §4.7, §3 invariants): strictly increasing
//! per-connection sequence numbers plus a bounded clock-skew window.

use crate::error::KernelError;
use crate::wire::frame::Opcode;
use std::time::Duration;

pub struct ReplayGuard {
    last_sequence: Option<u64>,
    skew_window: Duration,
}

impl ReplayGuard {
    pub fn new(skew_window: Duration) -> Self {
        Self {
            last_sequence: None,
            skew_window,
        }
    }

    /// Checks one inbound frame's `sequence`/`timestamp_ns` against replay
    /// rules, recording `sequence` as the new high-water mark on success.
    /// Handshake and heartbeat frames are exempt from the skew check (spec
    /// §3: `is_skew_exempt`) since they may legitimately arrive before
    /// clocks have been reconciled.
    pub fn check(
        &mut self,
        opcode: Opcode,
        sequence: u64,
        timestamp_ns: u64,
        now_ns: u64,
    ) -> Result<(), KernelError> {
        if let Some(last) = self.last_sequence {
            if sequence <= last {
                return Err(KernelError::Protocol(format!(
                    "non-increasing sequence number: {sequence} <= {last}"
                )));
            }
        }

        if !opcode.is_skew_exempt() {
            let delta = now_ns.abs_diff(timestamp_ns);
            if delta > self.skew_window.as_nanos() as u64 {
                return Err(KernelError::Protocol(format!(
                    "timestamp outside clock-skew window: delta={delta}ns"
                )));
            }
        }

        self.last_sequence = Some(sequence);
        Ok(())
    }
}
