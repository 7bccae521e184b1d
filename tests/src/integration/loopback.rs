//! # Proxy to Coordinator Round Trips
//!
//! Wires real [`SortProxy`] instances onto real [`Coordinator`] instances
//! over in-process transports and drives whole transactions through:
//! vector collection, merging, broadcast, release and execution.

#[cfg(test)]
mod tests {
    use crate::support::executor::EventLogExecutor;
    use crate::support::loopback::{BlackholeTransport, LoopbackTransport};
    use cw_ordering::{
        CompletionTicket, Coordinator, CoordinatorConfig, OrderingApi, OrderingError,
        SubmitOutcome, Submission,
    };
    use cw_sort_proxy::{AggregatorApi, AggregatorConfig, ReplicaTransport, SortProxy};
    use shared_types::{FieldMap, OpKind, PeerId, ResourceId, SequenceNumber};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_secs(5);

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn coordinator(executor: Arc<EventLogExecutor>, dependency_timeout_ms: u64) -> Arc<Coordinator> {
        Arc::new(Coordinator::with_config(
            CoordinatorConfig {
                registry_buckets: 16,
                pending_slots: 64,
                dependency_timeout_ms,
                poll_timeout_ms: 50,
            },
            executor,
        ))
    }

    fn proxy(id: PeerId, transports: Vec<Arc<dyn ReplicaTransport>>) -> SortProxy {
        SortProxy::with_id(
            id,
            AggregatorConfig {
                pool_target: 2,
                pool_hard_cap: 8,
            },
            transports,
        )
    }

    /// Build the submission the filesystem client would send alongside the
    /// operation: proxy identity and txn stamped into the fields.
    fn submission(proxy: &SortProxy, txn: SequenceNumber, resource: ResourceId) -> Submission {
        let mut fields = FieldMap::new();
        proxy.attach(txn, &mut fields);
        Submission {
            kind: OpKind(2),
            read_only: false,
            resources: vec![resource],
            fields,
        }
    }

    async fn managed(coordinator: &Coordinator, submission: Submission) -> CompletionTicket {
        match coordinator.submit(submission).await.unwrap() {
            SubmitOutcome::Managed(ticket) => ticket,
            SubmitOutcome::Unmanaged(_) => panic!("expected a managed submission"),
        }
    }

    // =========================================================================
    // ROUND TRIPS
    // =========================================================================

    /// One proxy, one replica: the vector rides out on a poll, comes back
    /// merged, and the operation executes.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_single_replica_round_trip() {
        crate::support::trace_init();
        let executor = Arc::new(EventLogExecutor::default());
        let replica = coordinator(Arc::clone(&executor), 2000);
        let aggregator = proxy(
            PeerId::from_bytes([1; 16]),
            vec![Arc::new(LoopbackTransport::new(Arc::clone(&replica)))],
        );
        aggregator.start().await.unwrap();

        let txn = aggregator.begin();
        let disk = ResourceId::generate();
        let ticket = managed(&replica, submission(&aggregator, txn, disk)).await;
        aggregator.end(txn, 1).await.unwrap();

        timeout(TICK, ticket.wait()).await.unwrap().unwrap();
        assert_eq!(executor.finished(aggregator.id()), vec![0]);

        assert!(aggregator.complete(txn).await.unwrap(), "last confirmation retires");
        assert_eq!(aggregator.pending_transactions(), 0);
    }

    /// Two proxies write the same resource through two replicas, each
    /// submitting in the opposite order. The replicas disagree about who
    /// came first, the merged vectors form a mutual wait, and both
    /// coordinators break it the same way: identical execution order.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_conflicting_writes_execute_identically_on_both_replicas() {
        crate::support::trace_init();
        let exec_a = Arc::new(EventLogExecutor::default());
        let exec_b = Arc::new(EventLogExecutor::default());
        let replica_a = coordinator(Arc::clone(&exec_a), 3000);
        let replica_b = coordinator(Arc::clone(&exec_b), 3000);

        let p1 = PeerId::from_bytes([1; 16]);
        let p2 = PeerId::from_bytes([2; 16]);
        let proxy1 = proxy(
            p1,
            vec![
                Arc::new(LoopbackTransport::new(Arc::clone(&replica_a))),
                Arc::new(LoopbackTransport::new(Arc::clone(&replica_b))),
            ],
        );
        let proxy2 = proxy(
            p2,
            vec![
                Arc::new(LoopbackTransport::new(Arc::clone(&replica_a))),
                Arc::new(LoopbackTransport::new(Arc::clone(&replica_b))),
            ],
        );
        proxy1.start().await.unwrap();
        proxy2.start().await.unwrap();

        let disk = ResourceId::generate();
        let txn1 = proxy1.begin();
        let txn2 = proxy2.begin();

        // Opposite arrival orders: replica A sees p1 first, replica B p2.
        let t1a = managed(&replica_a, submission(&proxy1, txn1, disk)).await;
        let t2b = managed(&replica_b, submission(&proxy2, txn2, disk)).await;
        let t2a = managed(&replica_a, submission(&proxy2, txn2, disk)).await;
        let t1b = managed(&replica_b, submission(&proxy1, txn1, disk)).await;
        proxy1.end(txn1, 2).await.unwrap();
        proxy2.end(txn2, 2).await.unwrap();

        for ticket in [t1a, t2b, t2a, t1b] {
            timeout(TICK, ticket.wait()).await.unwrap().unwrap();
        }

        let order_a = exec_a.finish_order();
        let order_b = exec_b.finish_order();
        assert_eq!(order_a, order_b, "replicas must agree");
        assert_eq!(order_a, vec![(p1, 0), (p2, 0)], "smallest peer first");

        // Each replica confirms each transaction.
        assert!(!proxy1.complete(txn1).await.unwrap());
        assert!(proxy1.complete(txn1).await.unwrap());
        assert!(!proxy2.complete(txn2).await.unwrap());
        assert!(proxy2.complete(txn2).await.unwrap());
        assert_eq!(proxy1.pending_transactions(), 0);
        assert_eq!(proxy2.pending_transactions(), 0);
    }

    /// A dark replica never contributes its vector: the operation times out
    /// on the live replica, later traffic flows normally, and the stranded
    /// transaction stays pending on the proxy.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_dark_replica_strands_only_its_transaction() {
        crate::support::trace_init();
        let executor = Arc::new(EventLogExecutor::default());
        let replica = coordinator(Arc::clone(&executor), 400);
        let aggregator = proxy(
            PeerId::from_bytes([3; 16]),
            vec![
                Arc::new(LoopbackTransport::new(Arc::clone(&replica))),
                Arc::new(BlackholeTransport::new()),
            ],
        );
        aggregator.start().await.unwrap();
        let disk = ResourceId::generate();

        // txn 0 claims two replicas but only one will ever reply.
        let starved_txn = aggregator.begin();
        let starved = managed(&replica, submission(&aggregator, starved_txn, disk)).await;
        aggregator.end(starved_txn, 2).await.unwrap();

        let healthy_txn = aggregator.begin();
        let healthy = managed(&replica, submission(&aggregator, healthy_txn, disk)).await;
        aggregator.end(healthy_txn, 1).await.unwrap();

        let result = timeout(TICK, starved.wait()).await.unwrap();
        assert!(matches!(result, Err(OrderingError::Timeout { .. })));
        timeout(TICK, healthy.wait()).await.unwrap().unwrap();
        assert_eq!(executor.finished(aggregator.id()), vec![1]);

        // The live replica confirms both; the dark one never does, so the
        // starved transaction stays pending.
        assert!(!aggregator.complete(starved_txn).await.unwrap());
        assert!(aggregator.complete(healthy_txn).await.unwrap());
        assert_eq!(aggregator.pending_transactions(), 1);
    }
}
