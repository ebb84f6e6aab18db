//! Agent Scheduler (C6, spec §4.6): a cooperative, single-runtime scheduler
//! over anything implementing [`Runnable`]. The scheduler has no knowledge
//! of what an agent does — agents talk to each other only through the
//! Router (spec §4.6) — so this module is deliberately free of any
//! dependency on the router, capability, or ledger types.

use crate::wire::frame::Priority;
use std::collections::VecDeque;

/// Base quantum in scheduler ticks; multiplied per priority class up to 8x
/// (spec §4.6).
pub const BASE_QUANTUM: u32 = 100;

fn quantum_for(priority: Priority) -> u32 {
    let multiplier = match priority {
        Priority::Critical => 8,
        Priority::High => 4,
        Priority::Normal => 2,
        Priority::Low => 1,
    };
    BASE_QUANTUM * multiplier
}

/// What an agent reports after one scheduling slice.
pub enum RunState {
    /// The agent voluntarily yielded before its quantum expired.
    Yielded,
    /// The agent has no more work until external input arrives.
    Idle,
    /// The agent is finished and should be dropped from the scheduler.
    Done,
}

/// Implemented by anything the scheduler can run. `poll_tick` is called
/// repeatedly (once per scheduler tick) until the agent yields, goes idle,
/// finishes, or its quantum is exhausted — whichever comes first.
pub trait Runnable: Send {
    fn poll_tick(&mut self) -> RunState;
}

struct Entry {
    agent: Box<dyn Runnable>,
    priority: Priority,
    idle_ticks: u64,
}

/// Cooperative scheduler (spec §4.6). Holds one ready queue per priority
/// class; within a class, agents run round-robin.
pub struct Scheduler {
    queues: [VecDeque<Entry>; 4],
    boost_threshold: u64,
}

fn level(priority: Priority) -> usize {
    priority as usize
}

impl Scheduler {
    pub fn new(boost_threshold: u64) -> Self {
        Self {
            queues: [VecDeque::new(), VecDeque::new(), VecDeque::new(), VecDeque::new()],
            boost_threshold,
        }
    }

    pub fn spawn(&mut self, agent: Box<dyn Runnable>, priority: Priority) {
        self.queues[level(priority)].push_back(Entry { agent, priority, idle_ticks: 0 });
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    /// Runs the next scheduler tick: picks the highest-priority ready
    /// agent, runs it until it yields or its quantum expires, applies
    /// anti-starvation boosting to agents that have waited too long, and
    /// requeues or drops the agent depending on its reported state.
    pub fn run_one(&mut self) {
        self.apply_anti_starvation();

        let level_idx = match self.queues.iter().position(|q| !q.is_empty()) {
            Some(idx) => idx,
            None => return,
        };

        let Some(mut entry) = self.queues[level_idx].pop_front() else {
            return;
        };

        let quantum = quantum_for(entry.priority);
        let mut ticks_run = 0u32;
        let mut done = false;
        let mut idle = false;

        while ticks_run < quantum {
            ticks_run += 1;
            match entry.agent.poll_tick() {
                RunState::Yielded => break,
                RunState::Idle => {
                    idle = true;
                    break;
                }
                RunState::Done => {
                    done = true;
                    break;
                }
            }
        }

        if done {
            return;
        }

        entry.idle_ticks = if idle { entry.idle_ticks } else { 0 };
        self.queues[level(entry.priority)].push_back(entry);
    }

    /// Promotes an agent that has been Ready (queued, not idle) for more
    /// than `boost_threshold` ticks one priority class up (spec §4.6).
    /// Tracked per-entry via `idle_ticks`, which despite the name counts
    /// ticks spent waiting in queue rather than running.
    fn apply_anti_starvation(&mut self) {
        for level_idx in (1..self.queues.len()).rev() {
            let queue_len = self.queues[level_idx].len();
            for _ in 0..queue_len {
                let mut entry = self.queues[level_idx].pop_front().unwrap();
                entry.idle_ticks += 1;
                if entry.idle_ticks > self.boost_threshold {
                    entry.idle_ticks = 0;
                    self.queues[level_idx - 1].push_back(entry);
                } else {
                    self.queues[level_idx].push_back(entry);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingAgent {
        remaining: u32,
    }

    impl Runnable for CountingAgent {
        fn poll_tick(&mut self) -> RunState {
            if self.remaining == 0 {
                return RunState::Done;
            }
            self.remaining -= 1;
            if self.remaining == 0 {
                RunState::Done
            } else {
                RunState::Yielded
            }
        }
    }

    #[test]
    fn agent_is_dropped_once_done() {
        let mut scheduler = Scheduler::new(1000);
        scheduler.spawn(Box::new(CountingAgent { remaining: 1 }), Priority::Normal);
        scheduler.run_one();
        assert!(scheduler.is_empty());
    }

    #[test]
    fn yielded_agent_is_requeued() {
        let mut scheduler = Scheduler::new(1000);
        scheduler.spawn(Box::new(CountingAgent { remaining: 3 }), Priority::Normal);
        scheduler.run_one();
        assert!(!scheduler.is_empty());
    }

    struct NeverYields;
    impl Runnable for NeverYields {
        fn poll_tick(&mut self) -> RunState {
            RunState::Idle
        }
    }

    #[test]
    fn starved_low_priority_agent_is_promoted() {
        let mut scheduler = Scheduler::new(2);
        scheduler.spawn(Box::new(NeverYields), Priority::Low);
        for _ in 0..5 {
            scheduler.apply_anti_starvation();
        }
        assert!(scheduler.queues[level(Priority::Normal)].len() >= 1);
    }
}
