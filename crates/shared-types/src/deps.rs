//! Dependency wait-sets.
//!
//! A [`DependencySet`] is the minimal cross-peer wait-set gating one
//! operation: a bounded collection of `(peer, required txn)` pairs meaning
//! "must not execute before `peer` has completed through `required txn`".
//! Merging keeps the maximum requirement per peer, so merges are idempotent
//! and order-independent.

use crate::errors::WireError;
use crate::ids::{PeerId, SequenceNumber};
use serde::{Deserialize, Serialize};

/// Entry capacity of a dependency set.
///
/// Derived from the 256-byte dependency record: an 8-byte owner prefix plus
/// ten 24-byte entries.
pub const MAX_DEPENDENCIES: usize = 10;

/// One `(peer, required txn)` requirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub peer: PeerId,
    pub txn: SequenceNumber,
}

/// Bounded per-operation wait-set, kept sorted by peer.
///
/// The sorted representation makes equality independent of insertion order,
/// which the round-trip tests rely on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySet {
    entries: Vec<DependencyEntry>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[DependencyEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyEntry> {
        self.entries.iter()
    }

    /// The requirement recorded for `peer`, if any.
    pub fn get(&self, peer: PeerId) -> Option<SequenceNumber> {
        self.position(peer).ok().map(|i| self.entries[i].txn)
    }

    /// Record `peer must have completed through txn`, keeping the maximum
    /// requirement when the peer is already present.
    pub fn require(
        &mut self,
        peer: PeerId,
        txn: SequenceNumber,
    ) -> Result<(), WireError> {
        match self.position(peer) {
            Ok(i) => {
                if txn > self.entries[i].txn {
                    self.entries[i].txn = txn;
                }
                Ok(())
            }
            Err(i) => {
                if self.entries.len() >= MAX_DEPENDENCIES {
                    return Err(WireError::DependencySetFull {
                        capacity: MAX_DEPENDENCIES,
                    });
                }
                self.entries.insert(i, DependencyEntry { peer, txn });
                Ok(())
            }
        }
    }

    /// Merge every entry of `other` into `self` (max per peer).
    pub fn merge(&mut self, other: &DependencySet) -> Result<(), WireError> {
        for entry in &other.entries {
            self.require(entry.peer, entry.txn)?;
        }
        Ok(())
    }

    /// Drop the requirement on `peer`, returning it if it was present.
    pub fn remove(&mut self, peer: PeerId) -> Option<SequenceNumber> {
        match self.position(peer) {
            Ok(i) => Some(self.entries.remove(i).txn),
            Err(_) => None,
        }
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&DependencyEntry) -> bool) {
        self.entries.retain(|entry| keep(entry));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, peer: PeerId) -> Result<usize, usize> {
        self.entries.binary_search_by(|entry| entry.peer.cmp(&peer))
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a DependencyEntry;
    type IntoIter = std::slice::Iter<'a, DependencyEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
