//! Supervision (C10, spec §4.10): startup ordering, health sampling,
//! graceful shutdown, and crash-restart policy. Grounded in the teacher's
//! `main.rs` (one `tokio::spawn`ed task per subsystem, `ctrl_c` awaited to
//! trigger an orderly `network.shutdown().await`), generalized from "one
//! network task" to the full component lineup this crate defines.

use crate::session::backoff::ReconnectBackoff;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Startup order is fixed by component dependency (spec §4.10: C3 → C4 →
/// C5 → C6 → C7/C9 → C8). Graceful shutdown runs the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentId {
    CapabilityStore,
    Ledger,
    Router,
    Scheduler,
    SessionAndMux,
    Raft,
}

pub const STARTUP_ORDER: [ComponentId; 6] = [
    ComponentId::CapabilityStore,
    ComponentId::Ledger,
    ComponentId::Router,
    ComponentId::Scheduler,
    ComponentId::SessionAndMux,
    ComponentId::Raft,
];

impl ComponentId {
    /// The ledger's own failures are fatal to the process (spec §4.10: "C4
    /// corruption is fatal and halts the process, requiring external
    /// repair"); every other component restarts instead.
    pub fn is_fatal_on_crash(self) -> bool {
        matches!(self, ComponentId::Ledger)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    NotStarted,
    Running,
    Crashed,
    Stopped,
}

/// A health sample an operator or liveness probe can read (spec §4.10
/// "health sampling").
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub node_id: u64,
    pub uptime: Duration,
    pub raft_role: crate::raft::Role,
    pub raft_term: u64,
    pub commit_index: u64,
    pub active_sessions: usize,
    pub component_status: HashMap<ComponentId, ComponentStatus>,
}

struct ComponentState {
    status: ComponentStatus,
    backoff: ReconnectBackoff,
}

pub struct Supervisor {
    node_id: u64,
    started_at: Instant,
    components: HashMap<ComponentId, ComponentState>,
}

/// Outcome of reporting a crash to the supervisor: either the process must
/// halt (Ledger), or a jittered delay before the component may restart.
pub enum CrashOutcome {
    Fatal,
    RestartAfter(Duration),
}

impl Supervisor {
    pub fn new(node_id: u64) -> Self {
        let mut components = HashMap::new();
        for id in STARTUP_ORDER {
            components.insert(
                id,
                ComponentState {
                    status: ComponentStatus::NotStarted,
                    backoff: ReconnectBackoff::default(),
                },
            );
        }
        Self {
            node_id,
            started_at: Instant::now(),
            components,
        }
    }

    pub fn startup_order(&self) -> &'static [ComponentId] {
        &STARTUP_ORDER
    }

    pub fn shutdown_order(&self) -> Vec<ComponentId> {
        let mut order = STARTUP_ORDER.to_vec();
        order.reverse();
        order
    }

    pub fn mark_started(&mut self, id: ComponentId) {
        if let Some(state) = self.components.get_mut(&id) {
            state.status = ComponentStatus::Running;
            state.backoff.record_success();
        }
    }

    pub fn mark_stopped(&mut self, id: ComponentId) {
        if let Some(state) = self.components.get_mut(&id) {
            state.status = ComponentStatus::Stopped;
        }
    }

    /// Reports a crash and returns what should happen next.
    pub fn mark_crashed(&mut self, id: ComponentId) -> CrashOutcome {
        if let Some(state) = self.components.get_mut(&id) {
            state.status = ComponentStatus::Crashed;
        }
        if id.is_fatal_on_crash() {
            return CrashOutcome::Fatal;
        }
        let delay = self
            .components
            .get_mut(&id)
            .and_then(|s| s.backoff.next_delay())
            .unwrap_or(Duration::from_secs(1));
        CrashOutcome::RestartAfter(delay)
    }

    pub fn status_of(&self, id: ComponentId) -> ComponentStatus {
        self.components.get(&id).map(|s| s.status).unwrap_or(ComponentStatus::NotStarted)
    }

    pub fn snapshot(
        &self,
        raft_role: crate::raft::Role,
        raft_term: u64,
        commit_index: u64,
        active_sessions: usize,
    ) -> HealthSnapshot {
        HealthSnapshot {
            node_id: self.node_id,
            uptime: self.started_at.elapsed(),
            raft_role,
            raft_term,
            commit_index,
            active_sessions,
            component_status: self
                .components
                .iter()
                .map(|(id, state)| (*id, state.status))
                .collect(),
        }
    }
}
