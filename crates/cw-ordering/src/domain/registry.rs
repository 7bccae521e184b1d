//! Client registry: hashed buckets of copy-on-write membership vectors.
//!
//! Lookups take a bucket read lock just long enough to clone the current
//! `Arc<Vec<_>>` snapshot. Membership changes serialize on one write mutex
//! and swap in a rebuilt vector, so readers never block behind a writer.

use crate::domain::client::Client;
use parking_lot::{Mutex, RwLock};
use shared_types::{PeerId, SequenceNumber};
use std::sync::Arc;
use tracing::debug;

type Bucket = RwLock<Arc<Vec<Arc<Client>>>>;

pub struct ClientRegistry {
    buckets: Vec<Bucket>,
    /// Serializes register/release; reference counts only change here.
    write_lock: Mutex<()>,
    pending_slots: usize,
}

impl ClientRegistry {
    pub fn new(bucket_count: usize, pending_slots: usize) -> Self {
        assert!(bucket_count.is_power_of_two(), "bucket count must be a power of two");
        Self {
            buckets: (0..bucket_count)
                .map(|_| RwLock::new(Arc::new(Vec::new())))
                .collect(),
            write_lock: Mutex::new(()),
            pending_slots,
        }
    }

    fn bucket(&self, peer: PeerId) -> &Bucket {
        // First byte spreads v4 ids well enough for a power-of-two table.
        let index = peer.as_bytes()[0] as usize & (self.buckets.len() - 1);
        &self.buckets[index]
    }

    /// Snapshot lookup; no reference is taken.
    pub fn lookup(&self, peer: PeerId) -> Option<Arc<Client>> {
        let snapshot = Arc::clone(&self.bucket(peer).read());
        snapshot.iter().find(|c| c.id == peer).cloned()
    }

    /// Find or create the client for `peer` and take a counted reference.
    /// `start` seeds a new client's txn counters; an existing client keeps
    /// its counters, so a re-announce cannot rewind a live sequence.
    pub fn register(&self, peer: PeerId, start: SequenceNumber) -> Arc<Client> {
        let _guard = self.write_lock.lock();
        if let Some(client) = self.lookup(peer) {
            client.acquire_ref();
            return client;
        }
        let client = Arc::new(Client::new(peer, start, self.pending_slots));
        client.acquire_ref();
        let bucket = self.bucket(peer);
        let mut slot = bucket.write();
        let mut next = Vec::with_capacity(slot.len() + 1);
        next.extend(slot.iter().cloned());
        next.push(Arc::clone(&client));
        *slot = Arc::new(next);
        debug!(peer = %peer, "client registered");
        client
    }

    /// Drop one counted reference; the last one removes the client.
    ///
    /// A departing peer must have no pending operations. Anything still in
    /// the table at zero is a lifecycle fault.
    pub fn release(&self, client: &Arc<Client>) {
        let _guard = self.write_lock.lock();
        if client.release_ref() > 0 {
            return;
        }
        assert!(
            client.inner.lock().pending.is_empty(),
            "client released with pending operations"
        );
        let bucket = self.bucket(client.id);
        let mut slot = bucket.write();
        let next: Vec<Arc<Client>> = slot
            .iter()
            .filter(|c| !Arc::ptr_eq(c, client))
            .cloned()
            .collect();
        *slot = Arc::new(next);
        debug!(peer = %client.id, "client retired");
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("buckets", &self.buckets.len())
            .field("pending_slots", &self.pending_slots)
            .finish()
    }
}
