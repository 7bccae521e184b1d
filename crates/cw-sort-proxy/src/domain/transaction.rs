//! In-flight transaction state on the proxy.

use crate::domain::merge;
use parking_lot::Mutex;
use shared_types::{DependencyEntry, PeerId, SequenceNumber};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// One client transaction tracked from `begin` to retirement.
///
/// Both counters count down as vectors and confirmations arrive and count
/// up once when [`ProxyTransaction::arm`] learns the replica count, so an
/// arrival that beats `end` needs no special casing: the counter simply
/// runs negative until armed.
#[derive(Debug)]
pub struct ProxyTransaction {
    id: SequenceNumber,
    /// Bit per replica channel that contributed a vector.
    mask: AtomicU64,
    /// Vector replies still missing; meaningful once armed.
    replies: AtomicI64,
    /// Execution confirmations still missing; meaningful once armed.
    completions: AtomicI64,
    armed: AtomicBool,
    merged: Mutex<Vec<DependencyEntry>>,
}

impl ProxyTransaction {
    pub fn new(id: SequenceNumber) -> Self {
        Self {
            id,
            mask: AtomicU64::new(0),
            replies: AtomicI64::new(0),
            completions: AtomicI64::new(0),
            armed: AtomicBool::new(false),
            merged: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> SequenceNumber {
        self.id
    }

    /// Record `channel` as a contributor and count its vector reply.
    /// True when this was the last missing reply.
    pub fn note_reply(&self, channel: usize) -> bool {
        self.mask.fetch_or(1 << channel, Ordering::AcqRel);
        self.replies.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Count one execution confirmation. True when it was the last.
    pub fn note_completion(&self) -> bool {
        self.completions.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Learn the replica count from `end`. Returns whether replies (and
    /// confirmations) were already all in, for arrivals that beat the arm.
    /// Must be called at most once per transaction.
    pub fn arm(&self, replicas: i64) -> (bool, bool) {
        if self.armed.load(Ordering::Acquire) {
            tracing::debug!(txn = %self.id, "transaction armed twice; ignoring");
            return (false, false);
        }
        let replies = self.replies.fetch_add(replicas, Ordering::AcqRel) + replicas;
        let completions = self.completions.fetch_add(replicas, Ordering::AcqRel) + replicas;
        self.armed.store(true, Ordering::Release);
        (replies == 0, completions == 0)
    }

    /// Every reply and confirmation is in.
    pub fn drained(&self) -> bool {
        self.armed.load(Ordering::Acquire)
            && self.replies.load(Ordering::Acquire) <= 0
            && self.completions.load(Ordering::Acquire) <= 0
    }

    /// Replica channels that contributed a vector, as a bit mask.
    pub fn contributors(&self) -> u64 {
        self.mask.load(Ordering::Acquire)
    }

    /// Fold one replica's entries into the merged vector.
    pub fn merge(&self, proxy: PeerId, entries: &[DependencyEntry]) {
        let mut merged = self.merged.lock();
        for &entry in entries {
            merge::merge_entry(proxy, &mut merged, entry);
        }
    }

    /// Snapshot of the merged vector.
    pub fn merged(&self) -> Vec<DependencyEntry> {
        self.merged.lock().clone()
    }
}
