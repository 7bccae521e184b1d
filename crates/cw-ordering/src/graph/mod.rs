//! Resource link graph.
//!
//! Shared index from resources to their dependency chains. Chains live in a
//! sharded concurrent map; all per-chain work happens under that entry's
//! guard, and nothing ever holds two chain guards at once, so chain work
//! for distinct resources proceeds in parallel without lock cycles.

pub mod arena;
pub mod chain;
pub mod cycle;

pub use arena::{LinkArena, LinkId, LinkRecord, ScanState};
pub use chain::{PeerLane, ResourceChain};

use crate::domain::errors::OrderingError;
use crate::domain::registry::ClientRegistry;
use crate::domain::request::Request;
use dashmap::DashMap;
use shared_types::{DependencySet, ResourceId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Default)]
pub struct LinkGraph {
    chains: DashMap<ResourceId, ResourceChain>,
    /// Global scan counter; see [`arena::ScanState`].
    scan_ids: AtomicU64,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh scan id, never zero, never reused.
    pub fn next_scan_id(&self) -> u64 {
        self.scan_ids.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Attach `request` to every chain it names and collect the outbound
    /// dependency block: one entry per other peer holding a lane on each
    /// chain, valued at that peer's execution front at attach time.
    ///
    /// Links are attached even when the block overflows. The caller marks
    /// the request bad instead of shipping a truncated block, and the
    /// forced failure unwinds the links at the request's turn.
    pub fn attach(
        &self,
        registry: &ClientRegistry,
        request: &Arc<Request>,
    ) -> Result<DependencySet, OrderingError> {
        let mut block = DependencySet::new();
        let mut overflow = false;
        for (slot, &resource) in request.op.resources.iter().enumerate() {
            let mut chain = self
                .chains
                .entry(resource)
                .or_insert_with(|| ResourceChain::new(resource));
            let peers: Vec<_> = chain.peers().collect();
            for peer in peers {
                if peer == request.peer() {
                    continue;
                }
                let Some(other) = registry.lookup(peer) else {
                    warn!(resource = %resource, peer = %peer, "lane peer without client skipped");
                    continue;
                };
                if block.require(peer, other.next_to_execute()).is_err() {
                    overflow = true;
                }
            }
            chain.attach(request, slot);
        }
        if overflow {
            return Err(OrderingError::ResourceExhaustion {
                what: "dependency block",
            });
        }
        Ok(block)
    }

    /// Run `f` under the chain guard for `resource`. `f` must not touch any
    /// other chain.
    pub fn with_chain<R>(
        &self,
        resource: ResourceId,
        f: impl FnOnce(&mut ResourceChain) -> R,
    ) -> Option<R> {
        self.chains.get_mut(&resource).map(|mut chain| f(&mut chain))
    }

    /// Drop the chain for `resource` once it has retired. A link attached
    /// between retirement and collection keeps the chain alive.
    pub fn collect(&self, resource: ResourceId) {
        self.chains.remove_if(&resource, |_, chain| chain.retired);
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }
}
