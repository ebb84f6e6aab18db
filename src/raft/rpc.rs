//! Wire-level shapes for the two Raft RPCs (spec §4.8). These travel as
//! ordinary frames (opcode `Consensus`) with a `serde_json`-or-`postcard`
//! encoded payload, same as any other message — Raft gets no private wire
//! format. `Consensus` is not in `Opcode::is_default_deny_exempt`; peer
//! frames carry a capability reference authorizing `FEDERATION_SYNC`
//! (`router/permission_map.rs`), the same admission path every other
//! privileged opcode goes through.

use crate::wire::frame::HEADER_LEN;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntryMeta {
    pub index: u64,
    pub term: u64,
    pub header: [u8; HEADER_LEN],
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestVoteArgs {
    pub term: u64,
    pub candidate_id: u64,
    pub last_log_index: u64,
    pub last_log_term: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestVoteReply {
    pub term: u64,
    pub vote_granted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesArgs {
    pub term: u64,
    pub leader_id: u64,
    pub prev_log_index: u64,
    pub prev_log_term: u64,
    pub entries: Vec<LogEntryMeta>,
    pub leader_commit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesReply {
    pub term: u64,
    pub success: bool,
    /// When `success` is false, the follower's `last_index` so the leader
    /// can decrement `next_index` in one step rather than one at a time.
    pub conflict_index: u64,
}
