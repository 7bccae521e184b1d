//! Chain evaluation.
//!
//! Runs every ready, unlatched lane front of one chain through the
//! satisfaction predicate until a fixpoint. An entry `(peer, txn)` stays
//! unsatisfied while that peer's lane front on this chain is at or below
//! `txn`; past the lane it falls through to the peer's execution counter.
//! Remaining entries either belong to a cycle, broken deterministically at
//! the smallest peer id, or park the request on the blocking peers'
//! watcher lists.
//!
//! Callers hold the chain guard; returned requests are dispatched after it
//! drops.

use crate::domain::client::Client;
use crate::domain::errors::OrderingError;
use crate::domain::registry::ClientRegistry;
use crate::domain::request::Request;
use crate::graph::arena::LinkId;
use crate::graph::chain::ResourceChain;
use crate::graph::{cycle, LinkGraph};
use shared_types::PeerId;
use std::sync::Arc;
use tracing::{debug, trace};

enum Verdict {
    /// The wait-set emptied, or the request degraded; latch the link.
    Satisfied,
    /// Entries remain and no cycle explains them; the request parked.
    Parked,
}

/// Evaluate the chain to a fixpoint, returning requests whose join counter
/// reached zero in the process.
pub(crate) fn evaluate_chain(
    graph: &LinkGraph,
    registry: &ClientRegistry,
    chain: &mut ResourceChain,
) -> Vec<Arc<Request>> {
    let mut admitted = Vec::new();
    loop {
        let mut progress = false;
        for id in chain.fronts() {
            let (request, slot) = {
                let record = chain.arena.get(id);
                (Arc::clone(&record.request), record.slot)
            };
            if !request.is_ready() || request.is_latched(slot) {
                continue;
            }
            if request.is_bad() {
                // Degraded requests skip the wait; their forced failure
                // still honors link order because latching all slots takes
                // them through the same dispatch path.
                if request.latch_all() {
                    admitted.push(Arc::clone(&request));
                }
                progress = true;
                continue;
            }
            let (verdict, broke) = evaluate_front(graph, registry, chain, id, &request);
            if broke {
                progress = true;
            }
            if let Verdict::Satisfied = verdict {
                progress = true;
                let zeroed = if request.is_bad() {
                    request.latch_all()
                } else {
                    request.latch_slot(slot)
                };
                if zeroed {
                    admitted.push(request);
                }
            }
        }
        if !progress {
            break;
        }
    }
    admitted
}

/// One front through the predicate. Loops break-and-refilter until the
/// wait-set empties or genuinely blocks. The second return is true when any
/// cycle was broken, which obliges the caller to re-run the other fronts.
fn evaluate_front(
    graph: &LinkGraph,
    registry: &ClientRegistry,
    chain: &mut ResourceChain,
    id: LinkId,
    request: &Arc<Request>,
) -> (Verdict, bool) {
    let mut broke = false;
    loop {
        let mut watch: Vec<Arc<Client>> = Vec::new();
        let mut cascade = false;
        let mut unknown: Option<PeerId> = None;
        {
            let mut state = request.state.lock();
            state.deps.retain(|entry| {
                if let Some(front_id) = chain.lane_front(entry.peer) {
                    let front = &chain.arena.get(front_id).request;
                    if front.txn() <= entry.txn {
                        if front.is_bad() {
                            cascade = true;
                        }
                        return true;
                    }
                }
                match registry.lookup(entry.peer) {
                    Some(other) => {
                        if other.next_to_execute() > entry.txn {
                            false
                        } else {
                            watch.push(other);
                            true
                        }
                    }
                    None => {
                        unknown.get_or_insert(entry.peer);
                        false
                    }
                }
            });
            if let Some(peer) = unknown {
                request.mark_bad_locked(&mut state, OrderingError::UnknownPeer { peer });
            } else if cascade {
                request.mark_bad_locked(
                    &mut state,
                    OrderingError::Aborted {
                        reason: "ordered behind a degraded operation",
                    },
                );
            }
            if request.is_bad() || state.deps.is_empty() {
                return (Verdict::Satisfied, broke);
            }
        }

        let scan_id = graph.next_scan_id();
        let members = cycle::scan(chain, id, scan_id);
        match cycle::break_smallest(chain, &members) {
            Some((victim, cleared)) => {
                debug!(
                    resource = %chain.resource,
                    victim = %victim,
                    members = members.len(),
                    cleared,
                    "dependency cycle broken"
                );
                broke = true;
            }
            None => {
                for client in watch {
                    client.add_waiter(request);
                }
                trace!(peer = %request.peer(), txn = %request.txn(), "front parked");
                return (Verdict::Parked, broke);
            }
        }
    }
}
