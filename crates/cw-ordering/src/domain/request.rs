//! In-flight operation state.
//!
//! A [`Request`] is created at admission and destroyed after its completion
//! (normal or forced). Its wait-set starts empty: the raw dependency block
//! built at attach time travels to the proxy, and the merged vector coming
//! back populates [`RequestState::deps`] at release.

use crate::domain::errors::OrderingError;
use crate::timer::DelayedTask;
use parking_lot::Mutex;
use shared_types::{DependencySet, FieldMap, OpKind, PeerId, ResourceId, SequenceNumber};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Result delivered to the submitting caller.
pub type OpResult = Result<(), OrderingError>;

/// A submitted operation plus its metadata carrier.
#[derive(Debug)]
pub struct Submission {
    pub kind: OpKind,
    pub read_only: bool,
    /// Resources the operation touches; at most two.
    pub resources: Vec<ResourceId>,
    pub fields: FieldMap,
}

/// What the execution collaborator sees: the operation minus ordering state.
#[derive(Clone, Debug)]
pub struct Operation {
    pub peer: PeerId,
    pub txn: SequenceNumber,
    pub kind: OpKind,
    pub read_only: bool,
    pub resources: Vec<ResourceId>,
}

/// Receiving side of an admitted operation's completion.
///
/// Resolves exactly once: to the executor's result, or to the failure the
/// coordinator synthesized for a degraded operation.
#[derive(Debug)]
pub struct CompletionTicket {
    rx: oneshot::Receiver<OpResult>,
}

impl CompletionTicket {
    pub async fn wait(self) -> OpResult {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(OrderingError::Shutdown),
        }
    }
}

/// Outcome of a submission.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// No protocol fields: the operation executes outside the ordering layer.
    Unmanaged(Submission),
    /// Admitted; the ticket resolves when the operation completes.
    Managed(CompletionTicket),
}

/// Mutable request state guarded by one mutex.
#[derive(Debug, Default)]
pub struct RequestState {
    /// Wait-set; populated from the merged payload at release.
    pub deps: DependencySet,
    /// The merged payload has been applied.
    pub data_received: bool,
    /// Dependency-data timer, armed at admission.
    pub timer: Option<DelayedTask>,
    /// Completion channel; taken exactly once.
    pub ticket: Option<oneshot::Sender<OpResult>>,
    /// Failure recorded when the request was marked bad; first cause wins.
    pub failure: Option<OrderingError>,
}

/// One admitted operation flowing through the scheduler.
pub struct Request {
    pub op: Operation,
    /// Resource links not yet satisfied; dispatch when it reaches zero.
    join: AtomicU32,
    /// Released for evaluation, in strict per-peer txn order.
    ready: AtomicBool,
    /// Degraded: completes as a synthesized failure, skipping the executor.
    bad: AtomicBool,
    /// Per-link satisfied latches, one per resource slot.
    latched: [AtomicBool; 2],
    pub state: Mutex<RequestState>,
}

impl Request {
    pub fn new(op: Operation) -> (Arc<Self>, CompletionTicket) {
        let (tx, rx) = oneshot::channel();
        let join = op.resources.len() as u32;
        let request = Arc::new(Self {
            op,
            join: AtomicU32::new(join),
            ready: AtomicBool::new(false),
            bad: AtomicBool::new(false),
            latched: [AtomicBool::new(false), AtomicBool::new(false)],
            state: Mutex::new(RequestState {
                ticket: Some(tx),
                ..RequestState::default()
            }),
        });
        (request, CompletionTicket { rx })
    }

    pub fn peer(&self) -> PeerId {
        self.op.peer
    }

    pub fn txn(&self) -> SequenceNumber {
        self.op.txn
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Mark released. True the first time.
    pub fn mark_ready(&self) -> bool {
        !self.ready.swap(true, Ordering::AcqRel)
    }

    pub fn is_bad(&self) -> bool {
        self.bad.load(Ordering::Acquire)
    }

    /// Mark degraded, recording the failure the caller will see.
    pub fn mark_bad(&self, failure: OrderingError) {
        if self.flag_bad() {
            self.state.lock().failure = Some(failure);
        }
    }

    /// [`Request::mark_bad`] for callers already holding the state lock.
    pub(crate) fn mark_bad_locked(&self, st: &mut RequestState, failure: OrderingError) {
        if self.flag_bad() {
            st.failure = Some(failure);
        }
    }

    fn flag_bad(&self) -> bool {
        !self.bad.swap(true, Ordering::AcqRel)
    }

    pub fn is_latched(&self, slot: usize) -> bool {
        self.latched[slot].load(Ordering::Acquire)
    }

    /// Latch one link slot as satisfied. True when this decrement brought
    /// the join counter to zero.
    pub fn latch_slot(&self, slot: usize) -> bool {
        if self.latched[slot].swap(true, Ordering::AcqRel) {
            return false;
        }
        self.join.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Latch every slot; an empty wait-set satisfies all links at once, and
    /// degraded requests skip the dependency wait entirely. True when the
    /// join counter reached zero in this call.
    pub fn latch_all(&self) -> bool {
        let mut zeroed = false;
        for slot in 0..self.op.resources.len() {
            if self.latch_slot(slot) {
                zeroed = true;
            }
        }
        zeroed
    }

    pub fn join_remaining(&self) -> u32 {
        self.join.load(Ordering::Acquire)
    }

    /// Resolve the caller's ticket now. No-op when already delivered.
    pub fn deliver(&self, result: OpResult) {
        if let Some(tx) = self.state.lock().ticket.take() {
            let _ = tx.send(result);
        }
    }

    /// The failure recorded for a degraded request.
    pub fn take_failure(&self) -> OrderingError {
        self.state.lock().failure.take().unwrap_or(OrderingError::Aborted {
            reason: "operation degraded",
        })
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("peer", &self.op.peer)
            .field("txn", &self.op.txn)
            .field("join", &self.join_remaining())
            .field("ready", &self.is_ready())
            .field("bad", &self.is_bad())
            .finish()
    }
}
