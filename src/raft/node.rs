//! Hand-rolled Raft state machine (C8, spec §4.8). Not a wrapper over the
//! `raft` crate: the ledger *is* the Raft log, so replication must call
//! straight into `Ledger::append`/`Ledger::truncate_suffix` rather than
//! fight an external crate's own storage trait. Grounded in the shape of
//! hand-rolled async Raft implementations elsewhere in the broader
//! retrieval pack, generalized to this crate's `Ledger`.

use crate::error::KernelError;
use crate::ledger::entry::strip_capability_ref;
use crate::ledger::{Ledger, RaftPersistentState};
use crate::raft::rpc::{AppendEntriesArgs, AppendEntriesReply, LogEntryMeta, RequestVoteArgs, RequestVoteReply};
use crate::wire::frame::Header;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// Sends the two Raft RPCs to a named peer. Implemented over the wire
/// protocol by supervision/session code; a test-only in-memory mock is used
/// below to exercise the state machine without a live transport.
pub trait RaftTransport: Send + Sync {
    fn send_request_vote(
        &self,
        peer: u64,
        args: RequestVoteArgs,
    ) -> impl std::future::Future<Output = Result<RequestVoteReply, KernelError>> + Send;

    fn send_append_entries(
        &self,
        peer: u64,
        args: AppendEntriesArgs,
    ) -> impl std::future::Future<Output = Result<AppendEntriesReply, KernelError>> + Send;
}

pub struct RaftNode {
    pub node_id: u64,
    pub peers: Vec<u64>,
    ledger: Arc<Ledger>,
    role: Role,
    current_term: u64,
    voted_for: Option<u64>,
    commit_index: u64,
    last_applied: u64,
    next_index: HashMap<u64, u64>,
    match_index: HashMap<u64, u64>,
    pub election_timeout: Duration,
    pub heartbeat_interval: Duration,
}

fn quorum_size(cluster_size: usize) -> usize {
    cluster_size / 2 + 1
}

impl RaftNode {
    pub fn new(node_id: u64, peers: Vec<u64>, ledger: Arc<Ledger>, election_timeout: Duration, heartbeat_interval: Duration) -> Result<Self, KernelError> {
        let persisted = ledger.load_raft_state()?;
        Ok(Self {
            node_id,
            peers,
            ledger,
            role: Role::Follower,
            current_term: persisted.current_term,
            voted_for: persisted.voted_for,
            commit_index: 0,
            last_applied: 0,
            next_index: HashMap::new(),
            match_index: HashMap::new(),
            election_timeout,
            heartbeat_interval,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn current_term(&self) -> u64 {
        self.current_term
    }

    pub fn commit_index(&self) -> u64 {
        self.commit_index
    }

    fn persist_state(&self) -> Result<(), KernelError> {
        self.ledger.save_raft_state(RaftPersistentState {
            current_term: self.current_term,
            voted_for: self.voted_for,
        })
    }

    fn last_log_term(&self) -> u64 {
        match self.ledger.last_index() {
            Some(idx) => self.ledger.read(idx).map(|e| e.term).unwrap_or(0),
            None => 0,
        }
    }

    /// Reverts to Follower on observing a higher term, per spec §4.8.
    fn observe_term(&mut self, term: u64) -> Result<(), KernelError> {
        if term > self.current_term {
            self.current_term = term;
            self.voted_for = None;
            self.role = Role::Follower;
            self.persist_state()?;
        }
        Ok(())
    }

    /// Follower→Candidate on election timeout (spec §4.8): increments the
    /// term, votes for self, and returns the `RequestVoteArgs` to fan out.
    pub fn start_election(&mut self) -> Result<RequestVoteArgs, KernelError> {
        self.current_term += 1;
        self.role = Role::Candidate;
        self.voted_for = Some(self.node_id);
        self.persist_state()?;

        Ok(RequestVoteArgs {
            term: self.current_term,
            candidate_id: self.node_id,
            last_log_index: self.ledger.last_index().unwrap_or(0),
            last_log_term: self.last_log_term(),
        })
    }

    /// Vote-granting rule (spec §4.8): at most one vote per term, and only
    /// if the candidate's log is at least as up-to-date (compare by last
    /// term, then last index).
    pub fn handle_request_vote(&mut self, args: RequestVoteArgs) -> Result<RequestVoteReply, KernelError> {
        self.observe_term(args.term)?;

        if args.term < self.current_term {
            return Ok(RequestVoteReply { term: self.current_term, vote_granted: false });
        }

        let already_voted_elsewhere = matches!(self.voted_for, Some(v) if v != args.candidate_id);
        let my_last_term = self.last_log_term();
        let my_last_index = self.ledger.last_index().unwrap_or(0);
        let candidate_up_to_date = (args.last_log_term, args.last_log_index) >= (my_last_term, my_last_index);

        let grant = !already_voted_elsewhere && candidate_up_to_date;
        if grant {
            self.voted_for = Some(args.candidate_id);
            self.persist_state()?;
        }

        Ok(RequestVoteReply { term: self.current_term, vote_granted: grant })
    }

    /// A Candidate that wins (strict majority among `peers.len() + 1`
    /// voters, itself included) becomes Leader and initializes replication
    /// tracking (spec §4.8).
    pub fn become_leader(&mut self) {
        self.role = Role::Leader;
        let next = self.ledger.last_index().map(|i| i + 1).unwrap_or(0);
        for peer in &self.peers {
            self.next_index.insert(*peer, next);
            self.match_index.insert(*peer, 0);
        }
    }

    pub fn has_majority(&self, vote_count: usize) -> bool {
        vote_count >= quorum_size(self.peers.len() + 1)
    }

    /// Leader-side single-node proposal path: with no peers, every proposal
    /// self-commits on append (spec §4.8 "single-node mode is legal").
    pub async fn propose(&mut self, header: Header, payload: Vec<u8>) -> Result<u64, KernelError> {
        if self.role != Role::Leader {
            return Err(KernelError::Internal("propose called on non-leader".into()));
        }
        let index = self.ledger.append(header, payload, self.current_term).await?;
        if self.peers.is_empty() {
            self.commit_index = index;
        }
        Ok(index)
    }

    /// Follower-side `AppendEntries` handling (spec §4.8): rejects on a
    /// `prev_index`/`prev_term` mismatch so the leader can back off
    /// `next_index`; otherwise truncates any conflicting suffix and appends
    /// the new entries in order.
    pub async fn handle_append_entries(&mut self, args: AppendEntriesArgs) -> Result<AppendEntriesReply, KernelError> {
        self.observe_term(args.term)?;
        if args.term < self.current_term {
            return Ok(AppendEntriesReply {
                term: self.current_term,
                success: false,
                conflict_index: self.ledger.last_index().unwrap_or(0),
            });
        }
        self.role = Role::Follower;

        if args.prev_log_index > 0 {
            match self.ledger.read(args.prev_log_index) {
                Ok(entry) if entry.term == args.prev_log_term => {}
                _ => {
                    return Ok(AppendEntriesReply {
                        term: self.current_term,
                        success: false,
                        conflict_index: self.ledger.last_index().unwrap_or(0),
                    });
                }
            }
        }

        if let Some(first_new) = args.entries.first() {
            if let Some(last_index) = self.ledger.last_index() {
                if last_index >= first_new.index {
                    self.ledger.truncate_suffix(first_new.index).await?;
                }
            }
        }

        for entry_meta in &args.entries {
            let header = Header::decode(&entry_meta.header)?;
            self.ledger.append(header, entry_meta.payload.clone(), entry_meta.term).await?;
        }

        if args.leader_commit > self.commit_index {
            self.commit_index = args.leader_commit.min(self.ledger.last_index().unwrap_or(0));
        }

        Ok(AppendEntriesReply {
            term: self.current_term,
            success: true,
            conflict_index: 0,
        })
    }

    /// Leader-side: records a follower's acknowledged index and advances
    /// `commit_index` to the highest `N` a majority has replicated,
    /// provided entry `N` was created in the current term (spec §4.8's
    /// "leader completeness" guard against committing a prior term's entry
    /// purely by replication count).
    pub fn record_replication_ack(&mut self, peer: u64, match_index: u64) -> Result<(), KernelError> {
        self.match_index.insert(peer, match_index);
        self.next_index.insert(peer, match_index + 1);

        let mut indices: Vec<u64> = self.match_index.values().copied().collect();
        indices.push(self.ledger.last_index().unwrap_or(0)); // leader's own log
        indices.sort_unstable_by(|a, b| b.cmp(a));

        if let Some(&candidate) = indices.get(quorum_size(self.peers.len() + 1) - 1) {
            if candidate > self.commit_index {
                if let Ok(entry) = self.ledger.read(candidate) {
                    if entry.term == self.current_term {
                        self.commit_index = candidate;
                    }
                }
            }
        }
        Ok(())
    }

    pub fn next_index_for(&self, peer: u64) -> u64 {
        *self.next_index.get(&peer).unwrap_or(&(self.ledger.last_index().map(|i| i + 1).unwrap_or(0)))
    }

    pub fn decrement_next_index(&mut self, peer: u64) {
        let entry = self.next_index.entry(peer).or_insert(1);
        *entry = entry.saturating_sub(1).max(1);
    }

    /// Builds the `AppendEntries` the leader should send to `peer` right
    /// now, given its current `next_index`.
    pub fn build_append_entries_for(&self, peer: u64) -> Result<AppendEntriesArgs, KernelError> {
        let next = self.next_index_for(peer);
        let prev_index = next.saturating_sub(1);
        let prev_term = if prev_index == 0 {
            0
        } else {
            self.ledger.read(prev_index)?.term
        };

        let mut entries = Vec::new();
        if let Some(last_index) = self.ledger.last_index() {
            let mut idx = next;
            while idx <= last_index {
                let e = self.ledger.read(idx)?;
                entries.push(LogEntryMeta {
                    index: e.index,
                    term: e.term,
                    header: e.header,
                    payload: e.payload,
                });
                idx += 1;
            }
        }

        Ok(AppendEntriesArgs {
            term: self.current_term,
            leader_id: self.node_id,
            prev_log_index: prev_index,
            prev_log_term: prev_term,
            entries,
            leader_commit: self.commit_index,
        })
    }

    pub fn strip_header_for_log(header: &Header) -> [u8; crate::wire::frame::HEADER_LEN] {
        strip_capability_ref(header)
    }
}
