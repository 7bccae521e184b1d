//! Per-replica channel state: the transport handle, the outgoing buffer of
//! merged vectors, and the slot pool bounding concurrent polls.

use crate::ports::outbound::ReplicaTransport;
use bytes::Bytes;
use parking_lot::Mutex;
use shared_types::{DependencyEntry, PeerId, SequenceNumber, SortBuffer, WireError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Credit for one in-flight poll. Minted lazily up to the hard cap and
/// recycled through the idle pool between rounds.
#[derive(Debug)]
pub struct PollSlot {
    pub id: u32,
}

/// One replica's long-poll channel.
pub struct ReplicaChannel {
    pub index: usize,
    pub transport: Arc<dyn ReplicaTransport>,
    coordinator: Mutex<Option<PeerId>>,
    out: Mutex<SortBuffer>,
    idle: Mutex<Vec<PollSlot>>,
    minted: AtomicUsize,
    /// Polls currently in flight.
    pub active: AtomicUsize,
    hard_cap: usize,
}

impl ReplicaChannel {
    pub fn new(index: usize, transport: Arc<dyn ReplicaTransport>, hard_cap: usize) -> Self {
        Self {
            index,
            transport,
            coordinator: Mutex::new(None),
            out: Mutex::new(SortBuffer::new()),
            idle: Mutex::new(Vec::new()),
            minted: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            hard_cap,
        }
    }

    /// Pop an idle slot, minting a fresh one while under the hard cap.
    pub fn take_slot(&self) -> Option<PollSlot> {
        if let Some(slot) = self.idle.lock().pop() {
            return Some(slot);
        }
        let minted = self.minted.fetch_add(1, Ordering::AcqRel);
        if minted < self.hard_cap {
            Some(PollSlot { id: minted as u32 })
        } else {
            self.minted.fetch_sub(1, Ordering::AcqRel);
            None
        }
    }

    pub fn return_slot(&self, slot: PollSlot) {
        self.idle.lock().push(slot);
    }

    /// Drain queued merged vectors into the next poll's payload.
    pub fn take_outgoing(&self) -> Bytes {
        self.out.lock().take()
    }

    /// Queue one merged vector. Returns `(flush_now, displaced)`:
    /// `flush_now` is true when this call must schedule the flush poll, and
    /// `displaced` holds a full buffer's worth of earlier blocks that have
    /// to ride their own poll immediately.
    pub fn queue_block(
        &self,
        owner: SequenceNumber,
        entries: &[DependencyEntry],
    ) -> Result<(bool, Option<Bytes>), WireError> {
        let mut out = self.out.lock();
        let displaced = match out.append(owner, entries) {
            Ok(()) => None,
            Err(_) => {
                let displaced = out.take();
                out.append(owner, entries)?;
                Some(displaced)
            }
        };
        Ok((out.mark_flush_scheduled(), displaced))
    }

    pub fn set_coordinator(&self, id: PeerId) {
        *self.coordinator.lock() = Some(id);
    }

    pub fn coordinator(&self) -> Option<PeerId> {
        *self.coordinator.lock()
    }
}

impl std::fmt::Debug for ReplicaChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaChannel")
            .field("index", &self.index)
            .field("coordinator", &*self.coordinator.lock())
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish()
    }
}
