//! Configuration surface (spec §6).
//!
//! `KernelConfig` is the single source of truth for every tunable named in
//! the wire-compatibility section. Defaults match the spec exactly; callers
//! normally build one from `--config <path>` (TOML, see [`KernelConfig::load`])
//! and then override individual fields from CLI flags.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Ledger durability contract (spec §6 `fsync_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "interval_ms", rename_all = "snake_case")]
pub enum FsyncMode {
    Always,
    Periodic(u64),
}

impl Default for FsyncMode {
    fn default() -> Self {
        FsyncMode::Always
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    // Session keepalive (C7)
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,

    // Raft timers (C8)
    pub election_min: Duration,
    pub election_max: Duration,
    pub raft_heartbeat: Duration,

    // Transport (C1/C9)
    pub payload_ceiling: usize,
    pub shmem_threshold: usize,
    pub shmem_region_size: usize,

    // Capability store (C3)
    pub token_ttl_default: Duration,
    pub token_ttl_max: Duration,

    // Replay protection (C1/C7)
    pub clock_skew_window: Duration,

    // Anti-starvation (C5/C6)
    pub starvation_threshold: u64,
    pub boost_threshold: u64,

    // Ledger durability (C4)
    pub fsync_mode: FsyncMode,

    // Raft membership / identity (C8)
    pub node_id: u64,
    pub peers: Vec<u64>,

    // Resource caps (C5/C7)
    pub max_sessions: usize,
    pub outbound_queue_depth: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(15),
            election_min: Duration::from_millis(150),
            election_max: Duration::from_millis(300),
            raft_heartbeat: Duration::from_millis(50),
            payload_ceiling: 64 * 1024,
            shmem_threshold: 64 * 1024,
            shmem_region_size: 4 * 1024 * 1024,
            token_ttl_default: Duration::from_secs(3600),
            token_ttl_max: Duration::from_secs(3600),
            clock_skew_window: Duration::from_secs(30),
            starvation_threshold: 64,
            boost_threshold: 1000,
            fsync_mode: FsyncMode::Always,
            node_id: 1,
            peers: Vec::new(),
            max_sessions: 4096,
            outbound_queue_depth: 256,
        }
    }
}

impl KernelConfig {
    /// Load and merge a TOML config file over the defaults. Unknown keys are
    /// ignored rather than rejected, so older configs keep loading across
    /// additive schema changes.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&raw).map_err(ConfigError::Parse)
    }

    /// Validate cross-field invariants that serde alone can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.election_min >= self.election_max {
            return Err(ConfigError::Invalid(
                "election_min must be strictly less than election_max".into(),
            ));
        }
        if self.token_ttl_default > self.token_ttl_max {
            return Err(ConfigError::Invalid(
                "token_ttl_default must not exceed token_ttl_max".into(),
            ));
        }
        if !self.peers.is_empty() && self.peers.contains(&self.node_id) {
            return Err(ConfigError::Invalid(
                "peers must not include this node's own node_id".into(),
            ));
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
