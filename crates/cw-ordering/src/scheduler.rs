//! Dispatch and completion bookkeeping.
//!
//! Owns the registry, the link graph and the execution port. Admission
//! validates the txn sequence, arms the dependency-data timer, attaches
//! chain links and ships the outbound block. Completion delivers the
//! result, advances the peer's execution front, unlinks and re-evaluates
//! each chain, releases the peer's next front, and gives watchers a fresh
//! look. Completion work drains an explicit queue, so a run of degraded
//! fronts costs no stack.

use crate::builder;
use crate::config::CoordinatorConfig;
use crate::domain::client::Client;
use crate::domain::errors::OrderingError;
use crate::domain::registry::ClientRegistry;
use crate::domain::request::{CompletionTicket, OpResult, Operation, Request};
use crate::evaluator;
use crate::graph::LinkGraph;
use crate::ports::outbound::OperationExecutor;
use crate::timer::DelayedTask;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

pub(crate) struct Scheduler {
    pub(crate) registry: ClientRegistry,
    pub(crate) graph: LinkGraph,
    executor: Arc<dyn OperationExecutor>,
    config: CoordinatorConfig,
}

impl Scheduler {
    pub(crate) fn new(config: CoordinatorConfig, executor: Arc<dyn OperationExecutor>) -> Self {
        Self {
            registry: ClientRegistry::new(config.registry_buckets, config.pending_slots),
            graph: LinkGraph::new(),
            executor,
            config,
        }
    }

    /// Admit one managed operation.
    pub(crate) fn admit(self: &Arc<Self>, op: Operation) -> Result<CompletionTicket, OrderingError> {
        let client = self
            .registry
            .lookup(op.peer)
            .ok_or(OrderingError::UnknownPeer { peer: op.peer })?;

        // 1. Strict sequencing. A gap would wedge the release gate forever,
        //    so anything but the expected txn is rejected outright.
        {
            let mut inner = client.inner.lock();
            if op.txn != inner.next_to_assign {
                return Err(OrderingError::InvalidSequence {
                    peer: op.peer,
                    got: op.txn,
                    expected: inner.next_to_assign,
                });
            }
            inner.next_to_assign = op.txn.next();
        }

        let (request, ticket) = Request::new(op);

        // 2. Arm the dependency-data timer before anything can race it.
        let sched = Arc::clone(self);
        let armed = Arc::clone(&request);
        let timer = DelayedTask::schedule(self.config.dependency_timeout(), move || {
            sched.on_dependency_timeout(&armed);
        });
        request.state.lock().timer = Some(timer);

        // 3. Attach chain links, collecting the raw dependency block.
        let block = match self.graph.attach(&self.registry, &request) {
            Ok(block) => Some(block),
            Err(err) => {
                debug!(
                    peer = %request.peer(),
                    txn = %request.txn(),
                    error = %err,
                    "degraded at admission"
                );
                request.mark_bad(err);
                None
            }
        };

        // 4. Pend the request and queue its block on the long-poll channel.
        {
            let mut inner = client.inner.lock();
            inner.pending.insert(Arc::clone(&request));
            if let Some(block) = block {
                if inner
                    .exchange
                    .append_block(request.txn(), block.entries())
                    .is_err()
                {
                    request.mark_bad(OrderingError::ResourceExhaustion { what: "sort buffer" });
                } else {
                    let claimed = inner.exchange.flush();
                    trace!(
                        peer = %request.peer(),
                        txn = %request.txn(),
                        entries = block.len(),
                        claimed,
                        "dependency block queued"
                    );
                }
            }
        }

        // A request degraded at admission may already be the front.
        if request.is_bad() {
            self.release_and_run(&client);
        }
        Ok(ticket)
    }

    /// Release the client's execution front if it is eligible, then run
    /// everything that becomes dispatchable.
    pub(crate) fn release_and_run(self: &Arc<Self>, client: &Arc<Client>) {
        if let Some(request) = builder::try_release(client) {
            let batch = self.open(request);
            self.dispatch(batch);
        }
    }

    /// A freshly released request: disarm a timer still pending (degraded
    /// requests release without data and keep theirs), then evaluate its
    /// chains, or pass it straight through when it holds no resources.
    fn open(self: &Arc<Self>, request: Arc<Request>) -> Vec<Arc<Request>> {
        if let Some(timer) = request.state.lock().timer.take() {
            timer.cancel();
        }
        if request.op.resources.is_empty() {
            return vec![request];
        }
        let mut ready = Vec::new();
        for &resource in &request.op.resources {
            let admitted = self.graph.with_chain(resource, |chain| {
                evaluator::evaluate_chain(&self.graph, &self.registry, chain)
            });
            ready.extend(admitted.unwrap_or_default());
        }
        ready
    }

    /// Run dispatchable requests. Degraded ones complete as failures right
    /// here, off the queue; live ones go to the executor on their own task.
    fn dispatch(self: &Arc<Self>, batch: Vec<Arc<Request>>) {
        let mut queue: VecDeque<Arc<Request>> = batch.into();
        while let Some(request) = queue.pop_front() {
            if request.is_bad() {
                let failure = request.take_failure();
                debug!(
                    peer = %request.peer(),
                    txn = %request.txn(),
                    error = %failure,
                    "forced failure completion"
                );
                request.deliver(Err(failure));
                queue.extend(self.finish(&request));
                continue;
            }
            trace!(peer = %request.peer(), txn = %request.txn(), "dispatching");
            let sched = Arc::clone(self);
            let running = Arc::clone(&request);
            tokio::spawn(async move {
                let result = sched
                    .executor
                    .execute(&running.op)
                    .await
                    .map_err(OrderingError::from);
                sched.complete(&running, result);
            });
        }
    }

    /// Executor completion: deliver first, then the bookkeeping.
    fn complete(self: &Arc<Self>, request: &Arc<Request>, result: OpResult) {
        if let Err(err) = &result {
            debug!(
                peer = %request.peer(),
                txn = %request.txn(),
                error = %err,
                "execution failed"
            );
        }
        request.deliver(result);
        let follow = self.finish(request);
        self.dispatch(follow);
    }

    /// Post-completion bookkeeping. Returns whatever became dispatchable:
    /// chain successors, the peer's next released front, and watchers whose
    /// counter requirement just cleared.
    fn finish(self: &Arc<Self>, request: &Arc<Request>) -> Vec<Arc<Request>> {
        let peer = request.peer();
        let txn = request.txn();
        let Some(client) = self.registry.lookup(peer) else {
            error!(peer = %peer, txn = %txn, "completion for unregistered peer");
            return Vec::new();
        };

        // 1. Advance the execution front; strict order is asserted.
        client.advance_past(txn);

        // 2. Unlink from each chain and re-evaluate it, one guard at a time.
        let mut ready = Vec::new();
        for &resource in &request.op.resources {
            let admitted = self.graph.with_chain(resource, |chain| {
                if chain.remove(peer, txn).is_none() {
                    debug!(resource = %resource, peer = %peer, txn = %txn, "link already gone");
                }
                evaluator::evaluate_chain(&self.graph, &self.registry, chain)
            });
            ready.extend(admitted.unwrap_or_default());
            self.graph.collect(resource);
        }

        // 3. The next front may have been waiting only on this completion.
        if let Some(next) = builder::try_release(&client) {
            ready.extend(self.open(next));
        }

        // 4. Watchers parked on this peer's counter get a fresh look.
        for waiter in client.drain_waiters() {
            if waiter.join_remaining() == 0 {
                continue;
            }
            for &resource in &waiter.op.resources {
                let admitted = self.graph.with_chain(resource, |chain| {
                    evaluator::evaluate_chain(&self.graph, &self.registry, chain)
                });
                ready.extend(admitted.unwrap_or_default());
            }
        }
        ready
    }

    /// Timer path: the merged vector never arrived. The request degrades,
    /// the caller learns immediately, and the forced completion happens at
    /// the request's turn in the release order.
    fn on_dependency_timeout(self: &Arc<Self>, request: &Arc<Request>) {
        let failure = OrderingError::Timeout {
            waited_ms: self.config.dependency_timeout_ms,
        };
        warn!(peer = %request.peer(), txn = %request.txn(), "dependency data timed out");
        request.mark_bad(failure.clone());
        request.deliver(Err(failure));
        if let Some(client) = self.registry.lookup(request.peer()) {
            self.release_and_run(&client);
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("registry", &self.registry)
            .field("chains", &self.graph.chain_count())
            .finish()
    }
}
