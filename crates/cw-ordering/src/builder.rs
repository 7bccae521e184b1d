//! Dependency payload ingest and the release gate.
//!
//! Merged causal vectors arrive on the long-poll channel as framed blocks,
//! one per admitted txn. Each block populates its request's wait-set; once
//! the execution front's data is in (or the front has degraded), the front
//! releases for evaluation. Exactly one request per client is released at a
//! time, so completions are strictly txn-ordered by construction.

use crate::domain::client::Client;
use crate::domain::errors::OrderingError;
use crate::domain::registry::ClientRegistry;
use crate::domain::request::Request;
use bytes::Bytes;
use shared_types::{SortReader, SortRecord};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// What one inbound payload did.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct IngestReport {
    pub blocks: usize,
    pub discarded: usize,
}

/// Apply every block in `payload` to the client's pending requests.
///
/// A framing violation rejects the whole payload. Blocks owned by txns no
/// longer pending, or by requests that already timed out, are counted and
/// dropped.
pub(crate) fn ingest(
    registry: &ClientRegistry,
    client: &Arc<Client>,
    payload: Bytes,
) -> Result<IngestReport, OrderingError> {
    let mut reader = SortReader::new(payload);
    let mut report = IngestReport::default();
    while let Some(record) = reader.next_record()? {
        report.blocks += 1;
        let request = client.inner.lock().pending.get(record.owner);
        let Some(request) = request else {
            debug!(peer = %client.id, txn = %record.owner, "block for unknown txn discarded");
            report.discarded += 1;
            continue;
        };
        if !apply(registry, &request, &record) {
            report.discarded += 1;
        }
    }
    Ok(report)
}

/// Merge one block into its request's wait-set. Entries the target peer's
/// execution counter already satisfies never enter the set; a self entry is
/// dropped; an entry naming an unknown peer degrades the request. False
/// when the block lost its race with the dependency timer and was dropped.
fn apply(registry: &ClientRegistry, request: &Arc<Request>, record: &SortRecord) -> bool {
    let mut state = request.state.lock();
    if let Some(timer) = state.timer.take() {
        if !timer.cancel() {
            warn!(
                peer = %request.peer(),
                txn = %request.txn(),
                "dependency data arrived after timeout"
            );
            return false;
        }
    }
    if request.is_bad() {
        // Degraded before its data came in; the forced failure owns it.
        return false;
    }
    for entry in &record.entries {
        if entry.peer == request.peer() {
            trace!(peer = %request.peer(), txn = %request.txn(), "self entry dropped");
            continue;
        }
        match registry.lookup(entry.peer) {
            None => {
                warn!(
                    peer = %request.peer(),
                    txn = %request.txn(),
                    target = %entry.peer,
                    "dependency on unknown peer"
                );
                request.mark_bad_locked(
                    &mut state,
                    OrderingError::UnknownPeer { peer: entry.peer },
                );
            }
            Some(other) if other.next_to_execute() > entry.txn => {
                trace!(target = %entry.peer, required = %entry.txn, "entry already satisfied");
            }
            Some(_) => {
                if state.deps.require(entry.peer, entry.txn).is_err() {
                    request.mark_bad_locked(
                        &mut state,
                        OrderingError::ResourceExhaustion { what: "wait-set" },
                    );
                }
            }
        }
    }
    state.data_received = true;
    true
}

/// Release the execution front if its payload is in or it has degraded.
///
/// The released request leaves the pending table; it lives on through its
/// chain links and the scheduler until completion. Returns `None` when the
/// front is absent or still waiting for data.
pub(crate) fn try_release(client: &Arc<Client>) -> Option<Arc<Request>> {
    let front = client.next_to_execute();
    let mut inner = client.inner.lock();
    let request = inner.pending.get(front)?;
    let eligible = request.is_bad() || request.state.lock().data_received;
    if !eligible {
        return None;
    }
    inner.pending.remove(front);
    drop(inner);
    if request.mark_ready() {
        trace!(peer = %client.id, txn = %front, "request released");
        Some(request)
    } else {
        None
    }
}
