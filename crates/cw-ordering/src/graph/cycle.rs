//! Cycle detection and deterministic breaking.
//!
//! Wait-for edges run from a lane front to the lane front of every peer its
//! dependency set still names. Concurrent admission on different replicas
//! can close a loop over those edges; the scan finds the strongly connected
//! components reachable from the evaluating link, and the break clears the
//! lexicographically smallest member's entries into the cycle. Every
//! replica sees the same peer ids, so every replica picks the same victim.

use crate::graph::arena::LinkId;
use crate::graph::chain::ResourceChain;
use shared_types::PeerId;

struct Frame {
    node: LinkId,
    edges: Vec<LinkId>,
    next_edge: usize,
}

/// Union of all non-singleton strongly connected components reachable from
/// `start`. Empty means no cycle involves anything `start` waits on.
///
/// Tarjan, iterative. Marks are tagged with `scan_id`, so stale state from
/// earlier scans reads as unvisited and never needs clearing.
pub(crate) fn scan(chain: &mut ResourceChain, start: LinkId, scan_id: u64) -> Vec<LinkId> {
    let mut members = Vec::new();
    let mut next_index = 0u32;
    let mut stack: Vec<LinkId> = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();

    visit(chain, start, scan_id, &mut next_index, &mut stack, &mut frames);

    loop {
        let (node, target) = {
            let Some(top) = frames.last_mut() else { break };
            if top.next_edge < top.edges.len() {
                let target = top.edges[top.next_edge];
                top.next_edge += 1;
                (top.node, Some(target))
            } else {
                (top.node, None)
            }
        };
        match target {
            Some(target) => {
                let (seen, on_stack, target_index) = {
                    let scan = &chain.arena.get(target).scan;
                    (scan.scan_id == scan_id, scan.on_stack, scan.index)
                };
                if !seen {
                    visit(chain, target, scan_id, &mut next_index, &mut stack, &mut frames);
                } else if on_stack {
                    let state = &mut chain.arena.get_mut(node).scan;
                    state.lowlink = state.lowlink.min(target_index);
                }
            }
            None => {
                frames.pop();
                let (index, lowlink) = {
                    let scan = &chain.arena.get(node).scan;
                    (scan.index, scan.lowlink)
                };
                if let Some(parent) = frames.last() {
                    let parent_node = parent.node;
                    let state = &mut chain.arena.get_mut(parent_node).scan;
                    state.lowlink = state.lowlink.min(lowlink);
                }
                if lowlink == index {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        chain.arena.get_mut(member).scan.on_stack = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    if component.len() > 1 {
                        members.extend(component);
                    }
                }
            }
        }
    }
    members
}

fn visit(
    chain: &mut ResourceChain,
    node: LinkId,
    scan_id: u64,
    next_index: &mut u32,
    stack: &mut Vec<LinkId>,
    frames: &mut Vec<Frame>,
) {
    {
        let state = &mut chain.arena.get_mut(node).scan;
        state.scan_id = scan_id;
        state.index = *next_index;
        state.lowlink = *next_index;
        state.on_stack = true;
    }
    *next_index += 1;
    stack.push(node);
    frames.push(Frame {
        node,
        edges: edges_of(chain, node),
        next_edge: 0,
    });
}

/// Lane fronts this link waits on, straight from its dependency set. An
/// entry satisfied since the set was last filtered can widen the component;
/// the break still only clears entries that really exist, so a wide scan is
/// harmless.
fn edges_of(chain: &ResourceChain, node: LinkId) -> Vec<LinkId> {
    let record = chain.arena.get(node);
    let state = record.request.state.lock();
    state
        .deps
        .iter()
        .filter_map(|entry| chain.lane_front(entry.peer))
        .collect()
}

/// Clear the smallest member peer's entries that target other members.
/// Returns the victim and how many entries went; `None` when there is no
/// cycle to break.
pub(crate) fn break_smallest(
    chain: &ResourceChain,
    members: &[LinkId],
) -> Option<(PeerId, usize)> {
    let victim_id = members
        .iter()
        .copied()
        .min_by_key(|&id| chain.arena.get(id).request.peer())?;
    let cycle_peers: Vec<PeerId> = members
        .iter()
        .map(|&id| chain.arena.get(id).request.peer())
        .collect();
    let victim = &chain.arena.get(victim_id).request;
    let mut state = victim.state.lock();
    let before = state.deps.len();
    state.deps.retain(|entry| !cycle_peers.contains(&entry.peer));
    Some((victim.peer(), before - state.deps.len()))
}
