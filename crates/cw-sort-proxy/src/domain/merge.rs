//! Deterministic causal-vector merging.
//!
//! Replicas report per-peer txns independently and replies arrive in no
//! fixed order, so folding must be commutative: for peers ordered below the
//! owning proxy the larger txn wins, for peers above it the smaller one
//! does. Every arrival order lands on the same merged vector.

use shared_types::{DependencyEntry, PeerId};

/// Fold one reported entry into the merged vector.
pub(crate) fn merge_entry(
    proxy: PeerId,
    merged: &mut Vec<DependencyEntry>,
    entry: DependencyEntry,
) {
    match merged.iter_mut().find(|stored| stored.peer == entry.peer) {
        Some(stored) => {
            if (entry.peer < proxy) ^ (stored.txn > entry.txn) {
                stored.txn = entry.txn;
            }
        }
        None => merged.push(entry),
    }
}
