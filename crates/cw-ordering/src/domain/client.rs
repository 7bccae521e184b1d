//! Per-peer sequencing state.
//!
//! Each connected proxy peer owns a [`Client`]: two txn counters (next to
//! assign, next to execute), a fixed-slot pending table, the sort exchange
//! for its long-poll channel, and the watcher list that resumes requests
//! parked behind this peer's execution front.

use crate::domain::request::Request;
use crate::exchange::SortExchange;
use parking_lot::Mutex;
use shared_types::{PeerId, SequenceNumber};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Open-addressed txn index: slot = txn & mask, collisions chain in a Vec
/// kept sorted by txn. Sized once at client creation.
#[derive(Debug)]
pub struct PendingTable {
    slots: Vec<Vec<Arc<Request>>>,
    mask: u64,
    len: usize,
}

impl PendingTable {
    pub fn new(slot_count: usize) -> Self {
        assert!(slot_count.is_power_of_two(), "slot count must be a power of two");
        Self {
            slots: (0..slot_count).map(|_| Vec::new()).collect(),
            mask: (slot_count - 1) as u64,
            len: 0,
        }
    }

    fn slot(&self, txn: SequenceNumber) -> usize {
        (txn.value() & self.mask) as usize
    }

    pub fn insert(&mut self, request: Arc<Request>) {
        let slot = self.slot(request.txn());
        let bucket = &mut self.slots[slot];
        let at = bucket
            .binary_search_by(|r| r.txn().cmp(&request.txn()))
            .unwrap_or_else(|pos| pos);
        bucket.insert(at, request);
        self.len += 1;
    }

    pub fn get(&self, txn: SequenceNumber) -> Option<Arc<Request>> {
        let bucket = &self.slots[self.slot(txn)];
        bucket
            .binary_search_by(|r| r.txn().cmp(&txn))
            .ok()
            .map(|at| Arc::clone(&bucket[at]))
    }

    pub fn remove(&mut self, txn: SequenceNumber) -> Option<Arc<Request>> {
        let slot = self.slot(txn);
        let bucket = &mut self.slots[slot];
        let at = bucket.binary_search_by(|r| r.txn().cmp(&txn)).ok()?;
        self.len -= 1;
        Some(bucket.remove(at))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// State serialized by the client lock.
#[derive(Debug)]
pub struct ClientInner {
    /// Txn the next admitted operation must carry.
    pub next_to_assign: SequenceNumber,
    pub pending: PendingTable,
    pub exchange: SortExchange,
}

/// One proxy peer as seen by the coordinator.
#[derive(Debug)]
pub struct Client {
    pub id: PeerId,
    /// Execution front: every txn below it has completed.
    next_to_execute: AtomicU64,
    /// Registry reference count; mutated only under the registry write lock.
    refs: AtomicU32,
    pub inner: Mutex<ClientInner>,
    /// Requests parked until this peer's front advances.
    waiters: Mutex<Vec<Arc<Request>>>,
}

impl Client {
    /// `start` is the first txn the peer announced; both counters begin
    /// there.
    pub fn new(id: PeerId, start: SequenceNumber, pending_slots: usize) -> Self {
        Self {
            id,
            next_to_execute: AtomicU64::new(start.value()),
            refs: AtomicU32::new(0),
            inner: Mutex::new(ClientInner {
                next_to_assign: start,
                pending: PendingTable::new(pending_slots),
                exchange: SortExchange::new(),
            }),
            waiters: Mutex::new(Vec::new()),
        }
    }

    pub fn next_to_execute(&self) -> SequenceNumber {
        SequenceNumber::new(self.next_to_execute.load(Ordering::Acquire))
    }

    /// Advance the execution front past `txn`. Completions arrive strictly
    /// in txn order; anything else is a scheduler fault.
    pub fn advance_past(&self, txn: SequenceNumber) {
        let prev = self
            .next_to_execute
            .swap(txn.value() + 1, Ordering::AcqRel);
        assert_eq!(prev, txn.value(), "completion out of txn order");
    }

    pub fn acquire_ref(&self) -> u32 {
        self.refs.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn release_ref(&self) -> u32 {
        let prev = self.refs.fetch_sub(1, Ordering::AcqRel);
        assert!(prev > 0, "client reference underflow");
        prev - 1
    }

    pub fn ref_count(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    /// Park a request until this peer's front moves. Idempotent per request.
    pub fn add_waiter(&self, request: &Arc<Request>) {
        let mut waiters = self.waiters.lock();
        if !waiters.iter().any(|w| Arc::ptr_eq(w, request)) {
            waiters.push(Arc::clone(request));
        }
    }

    /// Take every parked request; called after the front advances.
    pub fn drain_waiters(&self) -> Vec<Arc<Request>> {
        std::mem::take(&mut *self.waiters.lock())
    }
}
