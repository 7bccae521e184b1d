//! Coordinator Service
//!
//! Implements [`OrderingApi`] on top of the scheduler: field analysis on
//! submit, registry bookkeeping on announce, and the long-poll exchange
//! loop that ships dependency blocks out and takes merged vectors in.

use crate::builder;
use crate::config::CoordinatorConfig;
use crate::domain::errors::OrderingError;
use crate::domain::request::{Operation, Submission, SubmitOutcome};
use crate::exchange::PollWait;
use crate::intake::{self, Intake};
use crate::ports::inbound::OrderingApi;
use crate::ports::outbound::OperationExecutor;
use crate::scheduler::Scheduler;
use async_trait::async_trait;
use bytes::Bytes;
use shared_types::{PeerId, SequenceNumber};
use std::sync::Arc;
use tracing::{debug, info};

/// Coordinator-side ordering service.
///
/// One instance per coordinator node. Cheap to share behind an `Arc`; all
/// state lives in the scheduler's registry and link graph.
pub struct Coordinator {
    id: PeerId,
    config: CoordinatorConfig,
    sched: Arc<Scheduler>,
}

impl Coordinator {
    /// Create a coordinator with default config.
    pub fn new(executor: Arc<dyn OperationExecutor>) -> Self {
        Self::with_config(CoordinatorConfig::default(), executor)
    }

    /// Create a coordinator with custom config.
    pub fn with_config(config: CoordinatorConfig, executor: Arc<dyn OperationExecutor>) -> Self {
        let sched = Arc::new(Scheduler::new(config.clone(), executor));
        Self {
            id: PeerId::generate(),
            config,
            sched,
        }
    }

    /// This coordinator's identity, handed to proxies at announce.
    pub fn id(&self) -> PeerId {
        self.id
    }
}

#[async_trait]
impl OrderingApi for Coordinator {
    async fn submit(&self, mut submission: Submission) -> Result<SubmitOutcome, OrderingError> {
        // 1. Classify by protocol fields; they are consumed here.
        match intake::analyze(&mut submission.fields)? {
            Intake::Passthrough => {
                debug!(kind = %submission.kind, "unmanaged submission");
                Ok(SubmitOutcome::Unmanaged(submission))
            }
            Intake::Managed { peer, txn } => {
                // 2. Bound the resource set before it reaches the graph.
                if submission.resources.len() > 2 {
                    return Err(OrderingError::MalformedFields {
                        reason: "an operation may span at most two resources".to_string(),
                    });
                }

                // 3. Hand over to the scheduler.
                let op = Operation {
                    peer,
                    txn,
                    kind: submission.kind,
                    read_only: submission.read_only,
                    resources: submission.resources,
                };
                let ticket = self.sched.admit(op)?;
                Ok(SubmitOutcome::Managed(ticket))
            }
            Intake::Exchange { .. } => Err(OrderingError::MalformedFields {
                reason: "sort payload on an operation submission".to_string(),
            }),
        }
    }

    async fn announce(&self, peer: PeerId, start: SequenceNumber) -> Result<PeerId, OrderingError> {
        self.sched.registry.register(peer, start);
        info!(peer = %peer, start = %start, "peer announced");
        Ok(self.id)
    }

    async fn poll(&self, peer: PeerId, payload: Bytes) -> Result<Bytes, OrderingError> {
        let client = self
            .sched
            .registry
            .lookup(peer)
            .ok_or(OrderingError::UnknownPeer { peer })?;

        // 1. Apply whatever merged vectors rode in on the query.
        if !payload.is_empty() {
            let report = builder::ingest(&self.sched.registry, &client, payload)?;
            if report.discarded > 0 {
                debug!(
                    peer = %peer,
                    discarded = report.discarded,
                    "stale sort records discarded"
                );
            }
            self.sched.release_and_run(&client);
        }

        // 2. Hand back queued blocks, or park until one shows up. The lock
        //    is held only for the claim; the wait happens outside it.
        let wait = { client.inner.lock().exchange.claim_or_park() };
        match wait {
            PollWait::Ready(block) => Ok(block),
            PollWait::Parked(rx) => {
                match tokio::time::timeout(self.config.poll_timeout(), rx).await {
                    Ok(Ok(block)) => Ok(block),
                    Ok(Err(_)) => Err(OrderingError::Shutdown),
                    Err(_) => Err(OrderingError::Timeout {
                        waited_ms: self.config.poll_timeout_ms,
                    }),
                }
            }
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").field("id", &self.id).finish()
    }
}
