//! Misbehavior scoring and ban tracking (supplemented feature — spec.md
//! doesn't name this, but a session-facing substrate rejecting malformed
//! frames needs somewhere to record repeat offenders; grounded directly in
//! the teacher's `net/connection.rs` `BanEntry`/`BanList` and
//! `net/discouraged.rs` scoring pattern, narrowed from IP addresses to this
//! substrate's session/principal identity).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Scores for individual kinds of misbehavior, loosely mirroring the
/// teacher's discouragement scores (protocol violations weighted heavier
/// than liveness hiccups).
pub const SCORE_PROTOCOL_VIOLATION: u32 = 100;
pub const SCORE_REPLAY_ATTEMPT: u32 = 100;
pub const SCORE_AUTH_FAILURE: u32 = 20;
pub const SCORE_HEARTBEAT_MISS: u32 = 5;

/// A principal is banned once its accumulated score crosses this.
pub const BAN_THRESHOLD: u32 = 100;
pub const DEFAULT_BAN_DURATION_SECS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanEntry {
    pub banned_at: u64,
    pub ban_until: u64,
    pub reason: String,
}

impl BanEntry {
    fn new(duration_secs: u64, reason: String) -> Self {
        let now = now();
        Self {
            banned_at: now,
            ban_until: now.saturating_add(duration_secs),
            reason,
        }
    }

    pub fn is_expired(&self) -> bool {
        now() >= self.ban_until
    }
}

#[derive(Default)]
pub struct MisbehaviorTracker {
    scores: HashMap<[u8; 32], u32>,
    bans: HashMap<[u8; 32], BanEntry>,
}

impl MisbehaviorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a misbehavior score against `principal`, banning it outright
    /// if the accumulated score crosses the threshold.
    pub fn record(&mut self, principal: [u8; 32], score: u32, reason: &str) {
        let total = self.scores.entry(principal).or_insert(0);
        *total += score;
        if *total >= BAN_THRESHOLD {
            self.bans
                .insert(principal, BanEntry::new(DEFAULT_BAN_DURATION_SECS, reason.to_string()));
        }
    }

    pub fn is_banned(&mut self, principal: &[u8; 32]) -> bool {
        if let Some(entry) = self.bans.get(principal) {
            if entry.is_expired() {
                self.bans.remove(principal);
                self.scores.remove(principal);
                return false;
            }
            return true;
        }
        false
    }

    pub fn clear_on_success(&mut self, principal: &[u8; 32]) {
        self.scores.remove(principal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_protocol_violation_bans_outright() {
        let mut tracker = MisbehaviorTracker::new();
        let principal = [1u8; 32];
        tracker.record(principal, SCORE_PROTOCOL_VIOLATION, "malformed header");
        assert!(tracker.is_banned(&principal));
    }

    #[test]
    fn accumulated_minor_violations_eventually_ban() {
        let mut tracker = MisbehaviorTracker::new();
        let principal = [2u8; 32];
        for _ in 0..19 {
            tracker.record(principal, SCORE_HEARTBEAT_MISS, "missed heartbeat");
        }
        assert!(!tracker.is_banned(&principal));
        tracker.record(principal, SCORE_HEARTBEAT_MISS, "missed heartbeat");
        assert!(tracker.is_banned(&principal));
    }

    #[test]
    fn unrelated_principal_is_unaffected() {
        let mut tracker = MisbehaviorTracker::new();
        tracker.record([3u8; 32], SCORE_PROTOCOL_VIOLATION, "bad");
        assert!(!tracker.is_banned(&[4u8; 32]));
    }
}
