//! Transport Mux (C9, spec §4.9): bulk payloads above `shmem_threshold`
//! bypass the inline wire path (C1) and travel through a named, bounded
//! ring-buffer region; only a small descriptor (region id, offset, length,
//! hash) crosses the primary stream.
//!
//! The ring's producer/consumer back-pressure uses `tokio::sync::Semaphore`
//! exactly the way the rest of this crate bounds queues (C1's outbound
//! queue, C5's router), rather than a hand-rolled wait/notify pair.

use crate::error::KernelError;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Semaphore;

/// What crosses the primary stream in place of a bulk payload (spec §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    pub region_id: String,
    pub offset: u64,
    pub length: u32,
    pub hash: [u8; 32],
}

struct Slot {
    offset: u64,
    payload: Vec<u8>,
    hash: [u8; 32],
}

/// One named bounded ring region. `capacity_bytes` is the total amount of
/// payload data the region may hold at once; writers block (back-pressure)
/// once it's exhausted, exactly as an over-full C1 outbound queue blocks.
pub struct RingRegion {
    name: String,
    capacity_bytes: usize,
    free_space: Semaphore,
    slots: Mutex<VecDeque<Slot>>,
    next_offset: Mutex<u64>,
}

impl RingRegion {
    pub fn new(name: impl Into<String>, capacity_bytes: usize) -> Self {
        Self {
            name: name.into(),
            capacity_bytes,
            free_space: Semaphore::new(capacity_bytes),
            slots: Mutex::new(VecDeque::new()),
            next_offset: Mutex::new(0),
        }
    }

    /// Places `payload` in the ring, blocking until enough space is free.
    /// Returns the descriptor the sender puts on the primary stream.
    pub async fn write(&self, payload: Vec<u8>) -> Result<Descriptor, KernelError> {
        if payload.len() > self.capacity_bytes {
            return Err(KernelError::Resource(format!(
                "payload of {} bytes exceeds region capacity {}",
                payload.len(),
                self.capacity_bytes
            )));
        }

        let permit = self
            .free_space
            .acquire_many(payload.len() as u32)
            .await
            .map_err(|_| KernelError::Cancelled)?;
        permit.forget();

        let hash: [u8; 32] = Sha3_256::digest(&payload).into();
        let offset = {
            let mut next = self.next_offset.lock().unwrap();
            let offset = *next;
            *next += 1;
            offset
        };
        let length = payload.len() as u32;
        self.slots.lock().unwrap().push_back(Slot { offset, payload, hash });

        Ok(Descriptor {
            region_id: self.name.clone(),
            offset,
            length,
            hash,
        })
    }

    /// Reads the slot named by `descriptor`, verifying its hash, then
    /// releases the space back to the producer side.
    pub fn read(&self, descriptor: &Descriptor) -> Result<Vec<u8>, KernelError> {
        let mut slots = self.slots.lock().unwrap();
        let position = slots
            .iter()
            .position(|s| s.offset == descriptor.offset)
            .ok_or(KernelError::NotFound)?;
        let slot = slots.remove(position).unwrap();
        drop(slots);

        if slot.hash != descriptor.hash || slot.payload.len() as u32 != descriptor.length {
            return Err(KernelError::Internal("mux descriptor/payload mismatch".into()));
        }

        self.free_space.add_permits(slot.payload.len());
        Ok(slot.payload)
    }
}

/// Registry of named ring regions, one per bulk-capable session or broadcast
/// group (spec §4.9's "named" region).
pub struct TransportMux {
    regions: Mutex<HashMap<String, std::sync::Arc<RingRegion>>>,
    default_region_size: usize,
}

impl TransportMux {
    pub fn new(default_region_size: usize) -> Self {
        Self {
            regions: Mutex::new(HashMap::new()),
            default_region_size,
        }
    }

    pub fn region(&self, name: &str) -> std::sync::Arc<RingRegion> {
        let mut regions = self.regions.lock().unwrap();
        regions
            .entry(name.to_string())
            .or_insert_with(|| std::sync::Arc::new(RingRegion::new(name, self.default_region_size)))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let region = RingRegion::new("bulk-1", 1024);
        let descriptor = region.write(b"large payload".to_vec()).await.unwrap();
        let payload = region.read(&descriptor).unwrap();
        assert_eq!(payload, b"large payload");
    }

    #[tokio::test]
    async fn oversize_payload_is_rejected() {
        let region = RingRegion::new("bulk-1", 4);
        let result = region.write(b"too big".to_vec()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reading_unknown_descriptor_fails() {
        let region = RingRegion::new("bulk-1", 1024);
        let bogus = Descriptor { region_id: "bulk-1".into(), offset: 999, length: 1, hash: [0u8; 32] };
        assert!(region.read(&bogus).is_err());
    }

    #[tokio::test]
    async fn write_frees_space_after_read() {
        let region = RingRegion::new("bulk-1", 8);
        let d1 = region.write(vec![0u8; 8]).await.unwrap();
        region.read(&d1).unwrap();
        // Space should be reclaimed; a second write of the same size must
        // not block forever.
        let d2 = region.write(vec![1u8; 8]).await.unwrap();
        assert_eq!(region.read(&d2).unwrap(), vec![1u8; 8]);
    }

    #[test]
    fn mux_reuses_region_by_name() {
        let mux = TransportMux::new(1024);
        let a = mux.region("topic-a");
        let b = mux.region("topic-a");
        assert!(std::sync::Arc::ptr_eq(&a, &b));
    }
}
