//! Ledger (C4, spec §4.4): the append-only, hash-chained record of admitted
//! events, and the storage the Raft core (C8) treats as its log.
//!
//! Concretely, segment files under `<data_dir>/ledger/segment-<start_index>.log`,
//! a `checkpoint` file recording the last durably-appended index, and a
//! `raft_state` file holding `(current_term, voted_for)`. This supersedes
//! the teacher's use of `sled` for its own chain storage: `sled`'s LSM-tree
//! model doesn't expose the explicit segment/checkpoint layout this crate's
//! wire-compatibility section mandates, so raw file I/O with an explicit
//! `fsync` does the job instead (dropped dependency, see DESIGN.md).
//!
//! All blocking file I/O — which is all of it, this is local disk — runs on
//! `tokio::task::spawn_blocking`'s dedicated pool rather than the async
//! reactor thread.

pub mod entry;
pub mod segment;

use crate::config::FsyncMode;
use crate::error::KernelError;
use crate::ledger::entry::{chain_hash, genesis_hash, strip_capability_ref, Hash, LedgerEntry};
use crate::wire::frame::Header;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const ENTRIES_PER_SEGMENT: u64 = 4096;

struct State {
    entries: Vec<LedgerEntry>,
    current_segment_start: u64,
    appends_since_fsync: u64,
}

pub struct Ledger {
    data_dir: PathBuf,
    fsync_mode: FsyncMode,
    state: Mutex<State>,
}

fn segment_path(data_dir: &Path, start_index: u64) -> PathBuf {
    data_dir.join(format!("segment-{start_index:020}.log"))
}

fn checkpoint_path(data_dir: &Path) -> PathBuf {
    data_dir.join("checkpoint")
}

fn raft_state_path(data_dir: &Path) -> PathBuf {
    data_dir.join("raft_state")
}

#[derive(Serialize, Deserialize, Default, Clone, Copy)]
pub struct RaftPersistentState {
    pub current_term: u64,
    pub voted_for: Option<u64>,
}

impl Ledger {
    /// Opens (creating if absent) the ledger rooted at `data_dir`, replaying
    /// every segment file to rebuild the in-memory hash-chain index.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, KernelError> {
        Self::open_with_fsync(data_dir, FsyncMode::Always)
    }

    pub fn open_with_fsync(data_dir: impl Into<PathBuf>, fsync_mode: FsyncMode) -> Result<Self, KernelError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .map_err(|e| KernelError::Internal(format!("creating ledger dir: {e}")))?;

        let mut segment_starts = Vec::new();
        for entry in fs::read_dir(&data_dir)
            .map_err(|e| KernelError::Internal(format!("reading ledger dir: {e}")))?
        {
            let entry = entry.map_err(|e| KernelError::Internal(format!("reading ledger dir: {e}")))?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(rest) = name.strip_prefix("segment-").and_then(|s| s.strip_suffix(".log")) {
                    if let Ok(start) = rest.parse::<u64>() {
                        segment_starts.push(start);
                    }
                }
            }
        }
        segment_starts.sort_unstable();

        let mut entries = Vec::new();
        for start in &segment_starts {
            let path = segment_path(&data_dir, *start);
            let mut file = File::open(&path)
                .map_err(|e| KernelError::Internal(format!("opening segment {path:?}: {e}")))?;
            entries.extend(segment::read_all(&mut file)
                .map_err(|e| KernelError::Internal(format!("replaying segment {path:?}: {e}")))?);
        }

        let current_segment_start = segment_starts.last().copied().unwrap_or(0);

        Ok(Self {
            data_dir,
            fsync_mode,
            state: Mutex::new(State {
                entries,
                current_segment_start,
                appends_since_fsync: 0,
            }),
        })
    }

    pub fn last_index(&self) -> Option<u64> {
        let state = self.state.lock().unwrap();
        state.entries.last().map(|e| e.index)
    }

    pub fn last_hash(&self) -> Hash {
        let state = self.state.lock().unwrap();
        state.entries.last().map(|e| e.hash).unwrap_or_else(genesis_hash)
    }

    pub fn read(&self, index: u64) -> Result<LedgerEntry, KernelError> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .find(|e| e.index == index)
            .cloned()
            .ok_or(KernelError::NotFound)
    }

    /// `append(header, payload) -> index` (spec §4.4). Durable before this
    /// returns: the body and hash trailer are both on disk (and fsynced per
    /// the configured mode) before the index is handed back.
    pub async fn append(self: &Arc<Self>, header: Header, payload: Vec<u8>, term: u64) -> Result<u64, KernelError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.append_sync(header, payload, term))
            .await
            .map_err(|e| KernelError::Internal(format!("ledger append task panicked: {e}")))?
    }

    fn append_sync(&self, header: Header, payload: Vec<u8>, term: u64) -> Result<u64, KernelError> {
        let mut state = self.state.lock().unwrap();

        let next_index = state.entries.last().map(|e| e.index + 1).unwrap_or(0);
        let previous_hash = state.entries.last().map(|e| e.hash).unwrap_or_else(genesis_hash);
        let stripped_header = strip_capability_ref(&header);
        let hash = chain_hash(&previous_hash, next_index, term, &stripped_header, &payload);

        let entry = LedgerEntry {
            index: next_index,
            term,
            header: stripped_header,
            payload,
            previous_hash,
            hash,
        };

        if next_index > 0 && next_index - state.current_segment_start >= ENTRIES_PER_SEGMENT {
            state.current_segment_start = next_index;
        }
        let path = segment_path(&self.data_dir, state.current_segment_start);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| KernelError::Internal(format!("opening segment {path:?}: {e}")))?;
        segment::append_entry(&mut file, &entry)
            .map_err(|e| KernelError::Internal(format!("appending to segment {path:?}: {e}")))?;

        state.appends_since_fsync += 1;
        let should_fsync = match self.fsync_mode {
            FsyncMode::Always => true,
            FsyncMode::Periodic(every) => state.appends_since_fsync >= every,
        };
        if should_fsync {
            file.sync_all()
                .map_err(|e| KernelError::Internal(format!("fsync segment {path:?}: {e}")))?;
            state.appends_since_fsync = 0;
        }

        write_checkpoint(&self.data_dir, next_index)
            .map_err(|e| KernelError::Internal(format!("writing checkpoint: {e}")))?;

        state.entries.push(entry);
        Ok(next_index)
    }

    /// Truncates the log to drop every entry at or after `from_index`.
    /// Crate-internal: spec §4.4 permits this only from the Raft core
    /// reconciling a live uncommitted suffix, never from an external caller.
    pub(crate) async fn truncate_suffix(self: &Arc<Self>, from_index: u64) -> Result<(), KernelError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.truncate_suffix_sync(from_index))
            .await
            .map_err(|e| KernelError::Internal(format!("ledger truncate task panicked: {e}")))?
    }

    fn truncate_suffix_sync(&self, from_index: u64) -> Result<(), KernelError> {
        let mut state = self.state.lock().unwrap();
        state.entries.retain(|e| e.index < from_index);

        for existing in fs::read_dir(&self.data_dir)
            .map_err(|e| KernelError::Internal(format!("reading ledger dir: {e}")))?
        {
            let existing = existing.map_err(|e| KernelError::Internal(format!("reading ledger dir: {e}")))?;
            let name = existing.file_name();
            if name.to_string_lossy().starts_with("segment-") {
                fs::remove_file(existing.path())
                    .map_err(|e| KernelError::Internal(format!("removing segment: {e}")))?;
            }
        }

        state.current_segment_start = 0;
        let path = segment_path(&self.data_dir, 0);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| KernelError::Internal(format!("recreating segment {path:?}: {e}")))?;
        for entry in &state.entries {
            segment::append_entry(&mut file, entry)
                .map_err(|e| KernelError::Internal(format!("rewriting segment {path:?}: {e}")))?;
        }
        file.sync_all()
            .map_err(|e| KernelError::Internal(format!("fsync segment {path:?}: {e}")))?;

        let last = state.entries.last().map(|e| e.index);
        drop(state);
        if let Some(last) = last {
            write_checkpoint(&self.data_dir, last)
                .map_err(|e| KernelError::Internal(format!("writing checkpoint: {e}")))?;
        }
        Ok(())
    }

    /// Recomputes the hash chain over `range` and returns the first index
    /// whose stored hash doesn't match what the chain predicts (spec §4.4
    /// `verify(range)`), or `None` if the whole range is intact.
    pub fn verify(&self, range: Range<u64>) -> Option<u64> {
        let state = self.state.lock().unwrap();
        let mut expected_previous = if range.start == 0 {
            genesis_hash()
        } else {
            match state.entries.iter().find(|e| e.index == range.start - 1) {
                Some(e) => e.hash,
                None => return Some(range.start),
            }
        };

        for index in range {
            let Some(entry) = state.entries.iter().find(|e| e.index == index) else {
                return Some(index);
            };
            if entry.previous_hash != expected_previous {
                return Some(index);
            }
            let recomputed = chain_hash(&expected_previous, entry.index, entry.term, &entry.header, &entry.payload);
            if recomputed != entry.hash {
                return Some(index);
            }
            expected_previous = entry.hash;
        }
        None
    }

    pub fn load_raft_state(&self) -> Result<RaftPersistentState, KernelError> {
        let path = raft_state_path(&self.data_dir);
        if !path.exists() {
            return Ok(RaftPersistentState::default());
        }
        let bytes = fs::read(&path)
            .map_err(|e| KernelError::Internal(format!("reading raft_state: {e}")))?;
        bincode::deserialize(&bytes)
            .map_err(|e| KernelError::Internal(format!("decoding raft_state: {e}")))
    }

    pub fn save_raft_state(&self, state: RaftPersistentState) -> Result<(), KernelError> {
        let path = raft_state_path(&self.data_dir);
        let bytes = bincode::serialize(&state)
            .map_err(|e| KernelError::Internal(format!("encoding raft_state: {e}")))?;
        write_atomic(&path, &bytes)
    }
}

fn write_checkpoint(data_dir: &Path, last_index: u64) -> std::io::Result<()> {
    write_atomic(&checkpoint_path(data_dir), &last_index.to_be_bytes())
}

/// Write-to-temp-then-rename so a crash mid-write never leaves a partially
/// written checkpoint/raft-state file.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::frame::{Flags, Opcode, Priority, PROTOCOL_VERSION};

    fn header() -> Header {
        Header {
            version: PROTOCOL_VERSION,
            opcode: Opcode::EventEmit,
            priority: Priority::Normal,
            flags: Flags::empty(),
            capability_ref: 5,
            payload_len: 0,
            sequence: 1,
            timestamp_ns: 0,
        }
    }

    #[tokio::test]
    async fn append_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
        let idx = ledger.append(header(), b"a".to_vec(), 1).await.unwrap();
        assert_eq!(idx, 0);
        let entry = ledger.read(0).unwrap();
        assert_eq!(entry.payload, b"a");
        assert_eq!(entry.previous_hash, genesis_hash());
    }

    #[tokio::test]
    async fn chain_links_successive_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
        ledger.append(header(), b"a".to_vec(), 1).await.unwrap();
        ledger.append(header(), b"b".to_vec(), 1).await.unwrap();
        ledger.append(header(), b"c".to_vec(), 1).await.unwrap();

        assert!(ledger.verify(0..3).is_none());
        let e1 = ledger.read(1).unwrap();
        let e2 = ledger.read(2).unwrap();
        assert_eq!(e2.previous_hash, e1.hash);
    }

    #[tokio::test]
    async fn verify_detects_corrupted_entry() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
        ledger.append(header(), b"a".to_vec(), 1).await.unwrap();
        ledger.append(header(), b"b".to_vec(), 1).await.unwrap();
        ledger.append(header(), b"c".to_vec(), 1).await.unwrap();

        {
            let mut state = ledger.state.lock().unwrap();
            state.entries[1].payload = b"corrupted".to_vec();
        }

        assert_eq!(ledger.verify(0..3), Some(1));
    }

    #[tokio::test]
    async fn truncate_suffix_drops_uncommitted_tail() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
        ledger.append(header(), b"a".to_vec(), 1).await.unwrap();
        ledger.append(header(), b"b".to_vec(), 1).await.unwrap();
        ledger.append(header(), b"c".to_vec(), 1).await.unwrap();

        ledger.truncate_suffix(1).await.unwrap();
        assert_eq!(ledger.last_index(), Some(0));
        assert!(ledger.read(1).is_err());
    }

    #[tokio::test]
    async fn reopening_replays_persisted_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
            ledger.append(header(), b"a".to_vec(), 1).await.unwrap();
            ledger.append(header(), b"b".to_vec(), 1).await.unwrap();
        }
        let reopened = Ledger::open(dir.path()).unwrap();
        assert_eq!(reopened.last_index(), Some(1));
        assert!(reopened.verify(0..2).is_none());
    }

    proptest::proptest! {
        /// spec §8: corrupting a single byte of a ledger entry makes
        /// `verify` report that entry's index as the first offender, for
        /// any sequence of appended payloads.
        #[test]
        fn verify_reports_first_corrupted_index(
            payloads in proptest::collection::vec(proptest::collection::vec(proptest::prelude::any::<u8>(), 0..16), 1..8),
            corrupt_at in 0usize..8,
        ) {
            let corrupt_at = corrupt_at % payloads.len();
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let dir = tempfile::tempdir().unwrap();
                let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
                for payload in &payloads {
                    ledger.append(header(), payload.clone(), 1).await.unwrap();
                }
                proptest::prop_assert!(ledger.verify(0..payloads.len() as u64).is_none());

                {
                    let mut state = ledger.state.lock().unwrap();
                    state.entries[corrupt_at].payload.push(0xff);
                }

                proptest::prop_assert_eq!(ledger.verify(0..payloads.len() as u64), Some(corrupt_at as u64));
                Ok(())
            })?;
        }
    }

    #[test]
    fn raft_state_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        assert_eq!(ledger.load_raft_state().unwrap().current_term, 0);
        ledger
            .save_raft_state(RaftPersistentState { current_term: 7, voted_for: Some(3) })
            .unwrap();
        let reloaded = ledger.load_raft_state().unwrap();
        assert_eq!(reloaded.current_term, 7);
        assert_eq!(reloaded.voted_for, Some(3));
    }
}
