//! Per-resource dependency chains.
//!
//! Every resource with live operations owns a [`ResourceChain`]: one lane
//! per peer, each lane a txn-ordered queue of links. The lane front is the
//! only link of that peer eligible to run on this resource; everything
//! behind it waits for in-order completion.

use crate::domain::request::Request;
use crate::graph::arena::{LinkArena, LinkId, LinkRecord};
use shared_types::{PeerId, ResourceId, SequenceNumber};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
pub struct PeerLane {
    pub peer: PeerId,
    /// Link ids in ascending txn order.
    pub queue: VecDeque<LinkId>,
}

#[derive(Debug)]
pub struct ResourceChain {
    pub resource: ResourceId,
    pub arena: LinkArena,
    /// Lanes sorted by peer id; scans iterate them deterministically.
    lanes: Vec<PeerLane>,
    /// Set once the last link leaves, marking the chain collectable. A new
    /// link arriving before collection clears it again.
    pub retired: bool,
}

impl ResourceChain {
    pub fn new(resource: ResourceId) -> Self {
        Self {
            resource,
            arena: LinkArena::default(),
            lanes: Vec::new(),
            retired: false,
        }
    }

    fn lane_index(&self, peer: PeerId) -> Result<usize, usize> {
        self.lanes.binary_search_by(|lane| lane.peer.cmp(&peer))
    }

    /// Peers with a live lane on this chain, in id order.
    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.lanes.iter().map(|lane| lane.peer)
    }

    /// Splice a link for `request` into its peer's lane at resource slot
    /// `slot`. Admission assigns txns in order but the chain guard is taken
    /// afterwards, so links may arrive here out of order; the lane keeps
    /// itself sorted.
    pub fn attach(&mut self, request: &Arc<Request>, slot: usize) -> LinkId {
        self.retired = false;
        let id = self.arena.alloc(Arc::clone(request), slot);
        match self.lane_index(request.peer()) {
            Ok(at) => {
                let txn = request.txn();
                let pos = self.lanes[at]
                    .queue
                    .partition_point(|&other| self.arena.get(other).request.txn() < txn);
                self.lanes[at].queue.insert(pos, id);
            }
            Err(at) => self.lanes.insert(
                at,
                PeerLane {
                    peer: request.peer(),
                    queue: VecDeque::from([id]),
                },
            ),
        }
        id
    }

    /// Unlink the `(peer, txn)` link. Retires the chain when it empties.
    pub fn remove(&mut self, peer: PeerId, txn: SequenceNumber) -> Option<LinkRecord> {
        let at = self.lane_index(peer).ok()?;
        let lane = &mut self.lanes[at];
        let pos = lane
            .queue
            .iter()
            .position(|&id| self.arena.get(id).request.txn() == txn)?;
        let id = lane.queue.remove(pos)?;
        if lane.queue.is_empty() {
            self.lanes.remove(at);
        }
        if self.lanes.is_empty() {
            self.retired = true;
        }
        Some(self.arena.free(id))
    }

    pub fn lane_front(&self, peer: PeerId) -> Option<LinkId> {
        let at = self.lane_index(peer).ok()?;
        self.lanes[at].queue.front().copied()
    }

    /// Front link of every lane, in peer order.
    pub fn fronts(&self) -> Vec<LinkId> {
        self.lanes
            .iter()
            .filter_map(|lane| lane.queue.front().copied())
            .collect()
    }

    pub fn find(&self, peer: PeerId, txn: SequenceNumber) -> Option<LinkId> {
        let at = self.lane_index(peer).ok()?;
        self.lanes[at]
            .queue
            .iter()
            .copied()
            .find(|&id| self.arena.get(id).request.txn() == txn)
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}
