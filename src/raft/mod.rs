//! Raft Core (C8, spec §4.8): term/vote/log state machine, election,
//! replication, and the safety invariants layered on top of the Ledger
//! (C4), which the Raft core treats as its log verbatim.

pub mod node;
pub mod rpc;

pub use node::{RaftNode, RaftTransport, Role};
pub use rpc::{AppendEntriesArgs, AppendEntriesReply, LogEntryMeta, RequestVoteArgs, RequestVoteReply};
