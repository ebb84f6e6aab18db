//! Event Bus / Router (C5, spec §4.5): topic subscriptions, capability
//! enforcement at the point of admission, and the priority-queued delivery
//! path out to subscribers.

pub mod permission_map;
pub mod queue;

use crate::capability::{CapabilityStore, Permissions, Token};
use crate::error::KernelError;
use crate::ledger::entry::LedgerEntry;
use crate::router::queue::PriorityQueues;
use crate::wire::frame::{Header, Priority};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub type SubscriberId = u64;

/// An admitted event ready for delivery to a topic's subscribers, carrying
/// the ledger index it was appended at so a subscriber can notice gaps.
#[derive(Debug, Clone)]
pub struct RoutedEvent {
    pub ledger_index: u64,
    pub topic: String,
    pub header: Header,
    pub payload: Vec<u8>,
}

enum QueueItem {
    Deliver {
        subscriber: SubscriberId,
        event: RoutedEvent,
    },
}

/// What the caller should do with a frame the Router has admitted. The
/// Router itself only decides *whether* a frame is admitted and to which
/// path it belongs; C8 (Raft) and session code perform the actual local
/// apply / proposal submission / broadcast.
pub enum RouteDecision {
    ApplyLocally,
    ProposeToRaft,
    Broadcast,
}

struct Subscriptions {
    by_topic: HashMap<String, HashSet<SubscriberId>>,
    senders: HashMap<SubscriberId, mpsc::Sender<RoutedEvent>>,
}

pub struct Router {
    capability_store: std::sync::Arc<CapabilityStore>,
    subscriptions: Mutex<Subscriptions>,
    queues: Mutex<PriorityQueues<QueueItem>>,
    starvation_threshold: u64,
}

impl Router {
    pub fn new(capability_store: std::sync::Arc<CapabilityStore>, starvation_threshold: u64) -> Self {
        Self {
            capability_store,
            subscriptions: Mutex::new(Subscriptions {
                by_topic: HashMap::new(),
                senders: HashMap::new(),
            }),
            queues: Mutex::new(PriorityQueues::default()),
            starvation_threshold,
        }
    }

    pub fn subscribe(&self, topic: &str, subscriber: SubscriberId, sender: mpsc::Sender<RoutedEvent>) {
        let mut subs = self.subscriptions.lock().unwrap();
        subs.by_topic.entry(topic.to_string()).or_default().insert(subscriber);
        subs.senders.insert(subscriber, sender);
    }

    pub fn unsubscribe(&self, topic: &str, subscriber: SubscriberId) {
        let mut subs = self.subscriptions.lock().unwrap();
        if let Some(set) = subs.by_topic.get_mut(topic) {
            set.remove(&subscriber);
        }
    }

    /// Drops every subscription for a subscriber, called when its owning
    /// session tears down (spec §3's ownership note: destroying a session
    /// releases its capability table entries, not ledger entries — the same
    /// applies to its Router subscriptions).
    pub fn drop_subscriber(&self, subscriber: SubscriberId) {
        let mut subs = self.subscriptions.lock().unwrap();
        for set in subs.by_topic.values_mut() {
            set.remove(&subscriber);
        }
        subs.senders.remove(&subscriber);
    }

    /// Admission check for one inbound frame (spec §4.5 step (a)).
    /// `capability` is `None` when the frame carries `capability_id = 0`.
    pub fn admit(
        &self,
        header: &Header,
        capability: Option<&Token>,
        subject: [u8; 32],
    ) -> Result<RouteDecision, KernelError> {
        let required = permission_map::required_permission(header.opcode);

        match (required, capability) {
            (None, _) => {}
            (Some(_), None) => return Err(KernelError::Auth("no capability presented".into())),
            (Some(required), Some(token)) => {
                self.capability_store.verify(token, subject, required)?;
            }
        }

        Ok(if header.flags.broadcast() {
            RouteDecision::Broadcast
        } else if header.opcode.is_default_deny_exempt() {
            RouteDecision::ApplyLocally
        } else {
            RouteDecision::ProposeToRaft
        })
    }

    /// Enqueues a committed entry for delivery to every subscriber of
    /// `topic`, preserving ledger-index order within each subscription
    /// (guaranteed here simply by enqueueing in append order — the ledger
    /// has exactly one appender, spec §4.4).
    pub fn publish(&self, topic: &str, entry: &LedgerEntry, priority: Priority) {
        let subscribers: Vec<SubscriberId> = {
            let subs = self.subscriptions.lock().unwrap();
            subs.by_topic
                .get(topic)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };

        let header = match crate::wire::frame::Header::decode(&entry.header) {
            Ok(h) => h,
            Err(_) => return,
        };

        let mut queues = self.queues.lock().unwrap();
        for subscriber in subscribers {
            queues.push(
                priority,
                QueueItem::Deliver {
                    subscriber,
                    event: RoutedEvent {
                        ledger_index: entry.index,
                        topic: topic.to_string(),
                        header,
                        payload: entry.payload.clone(),
                    },
                },
            );
        }
    }

    /// One Router tick (spec §4.5): promotes a starved lower-priority item
    /// if warranted, then delivers the next-highest-priority item, if any.
    pub async fn tick(&self) {
        let item = {
            let mut queues = self.queues.lock().unwrap();
            queues.tick(self.starvation_threshold)
        };
        let Some(QueueItem::Deliver { subscriber, event }) = item else {
            return;
        };

        let sender = {
            let subs = self.subscriptions.lock().unwrap();
            subs.senders.get(&subscriber).cloned()
        };
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
    }

    pub fn has_pending_work(&self) -> bool {
        !self.queues.lock().unwrap().is_empty()
    }
}
