//! # Coordinator Ordering Properties
//!
//! Drives the coordinator through its public API, standing in for the
//! proxy: dependency blocks are collected over `poll` and merged vectors
//! are pushed back the same way. Covers dependency holds, deterministic
//! cycle breaking, dependency-data timeouts and degradation cascades.

#[cfg(test)]
mod tests {
    use crate::support::executor::{Event, EventLogExecutor};
    use bytes::Bytes;
    use cw_ordering::{
        CompletionTicket, Coordinator, CoordinatorConfig, OrderingApi, OrderingError,
        SubmitOutcome, Submission,
    };
    use shared_types::{
        DependencyEntry, FieldMap, OpKind, PeerId, ResourceId, SequenceNumber, SortBuffer,
        FIELD_PEER, FIELD_TXN,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_secs(3);

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn coordinator(executor: Arc<EventLogExecutor>) -> Coordinator {
        Coordinator::with_config(
            CoordinatorConfig {
                registry_buckets: 16,
                pending_slots: 64,
                dependency_timeout_ms: 150,
                poll_timeout_ms: 50,
            },
            executor,
        )
    }

    fn submission(peer: PeerId, txn: u64, resources: Vec<ResourceId>) -> Submission {
        let mut fields = FieldMap::new();
        fields.insert_id(FIELD_PEER, *peer.as_bytes());
        fields.insert_int(FIELD_TXN, txn as i64);
        Submission {
            kind: OpKind(2),
            read_only: false,
            resources,
            fields,
        }
    }

    async fn admit(
        coordinator: &Coordinator,
        peer: PeerId,
        txn: u64,
        resources: Vec<ResourceId>,
    ) -> CompletionTicket {
        match coordinator
            .submit(submission(peer, txn, resources))
            .await
            .unwrap()
        {
            SubmitOutcome::Managed(ticket) => ticket,
            SubmitOutcome::Unmanaged(_) => panic!("expected a managed submission"),
        }
    }

    /// Stand in for the proxy: deliver a merged vector for `txn`.
    async fn feed(coordinator: &Coordinator, peer: PeerId, txn: u64, entries: &[(PeerId, u64)]) {
        let entries: Vec<DependencyEntry> = entries
            .iter()
            .map(|&(peer, txn)| DependencyEntry {
                peer,
                txn: SequenceNumber::new(txn),
            })
            .collect();
        let mut buffer = SortBuffer::new();
        buffer
            .append(SequenceNumber::new(txn), &entries)
            .unwrap();

        // The poll both delivers the vector and drains queued blocks.
        match coordinator.poll(peer, buffer.take()).await {
            Ok(_) | Err(OrderingError::Timeout { .. }) => {}
            Err(err) => panic!("feed poll failed: {err}"),
        }
    }

    async fn announce_all(coordinator: &Coordinator, peers: &[PeerId]) {
        for &peer in peers {
            coordinator
                .announce(peer, SequenceNumber::ZERO)
                .await
                .unwrap();
        }
    }

    // =========================================================================
    // DEPENDENCY HOLDS
    // =========================================================================

    /// An operation that requires another peer's txn must not start before
    /// that txn finished, however early its own vector arrives.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_cross_peer_requirement_orders_execution() {
        let executor = Arc::new(EventLogExecutor::default());
        let coordinator = coordinator(Arc::clone(&executor));
        let p1 = PeerId::from_bytes([1; 16]);
        let p2 = PeerId::from_bytes([2; 16]);
        announce_all(&coordinator, &[p1, p2]).await;
        let disk = ResourceId::generate();

        let mut tickets = Vec::new();
        for txn in 0..3 {
            tickets.push(admit(&coordinator, p1, txn, vec![disk]).await);
        }
        tickets.push(admit(&coordinator, p2, 0, vec![disk]).await);

        // p2's vector arrives before any of p1's: it needs p1's txn 1 done.
        feed(&coordinator, p2, 0, &[(p1, 1)]).await;
        for txn in 0..3 {
            feed(&coordinator, p1, txn, &[]).await;
        }

        for ticket in tickets {
            timeout(TICK, ticket.wait()).await.unwrap().unwrap();
        }

        let started = executor.position(Event::Start, p2, 0).unwrap();
        let required = executor.position(Event::Finish, p1, 1).unwrap();
        assert!(
            required < started,
            "p2 started at {started} before p1 finished txn 1 at {required}"
        );
    }

    /// One peer's pipeline executes in txn order no matter how the merged
    /// vectors are reordered on the wire.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_survives_reordered_vectors() {
        let executor = Arc::new(EventLogExecutor::default());
        let coordinator = coordinator(Arc::clone(&executor));
        let peer = PeerId::from_bytes([5; 16]);
        announce_all(&coordinator, &[peer]).await;
        let disk = ResourceId::generate();

        let tickets: Vec<_> = {
            let mut tickets = Vec::new();
            for txn in 0..6 {
                tickets.push(admit(&coordinator, peer, txn, vec![disk]).await);
            }
            tickets
        };

        for txn in (0..6).rev() {
            feed(&coordinator, peer, txn, &[]).await;
        }
        for ticket in tickets {
            timeout(TICK, ticket.wait()).await.unwrap().unwrap();
        }

        assert_eq!(executor.finished(peer), vec![0, 1, 2, 3, 4, 5]);
    }

    // =========================================================================
    // CYCLE BREAKING
    // =========================================================================

    /// Replica disagreement: both peers wait on each other. The wait of the
    /// lexicographically smallest peer is discarded and it runs first.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_mutual_wait_breaks_toward_the_smallest_peer() {
        let executor = Arc::new(EventLogExecutor::default());
        let coordinator = coordinator(Arc::clone(&executor));
        let p1 = PeerId::from_bytes([1; 16]);
        let p2 = PeerId::from_bytes([2; 16]);
        announce_all(&coordinator, &[p1, p2]).await;
        let disk = ResourceId::generate();

        let t1 = admit(&coordinator, p1, 0, vec![disk]).await;
        let t2 = admit(&coordinator, p2, 0, vec![disk]).await;
        feed(&coordinator, p1, 0, &[(p2, 0)]).await;
        feed(&coordinator, p2, 0, &[(p1, 0)]).await;

        timeout(TICK, t1.wait()).await.unwrap().unwrap();
        timeout(TICK, t2.wait()).await.unwrap().unwrap();
        assert_eq!(executor.finish_order(), vec![(p1, 0), (p2, 0)]);
    }

    /// A three-peer ring unwinds fully once the smallest peer's wait is
    /// discarded, in dependency order.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_ring_unwinds_in_dependency_order() {
        let executor = Arc::new(EventLogExecutor::default());
        let coordinator = coordinator(Arc::clone(&executor));
        let a = PeerId::from_bytes([1; 16]);
        let b = PeerId::from_bytes([2; 16]);
        let c = PeerId::from_bytes([3; 16]);
        announce_all(&coordinator, &[a, b, c]).await;
        let disk = ResourceId::generate();

        let tickets = vec![
            admit(&coordinator, a, 0, vec![disk]).await,
            admit(&coordinator, b, 0, vec![disk]).await,
            admit(&coordinator, c, 0, vec![disk]).await,
        ];

        // a waits on b, b waits on c, c waits on a.
        feed(&coordinator, a, 0, &[(b, 0)]).await;
        feed(&coordinator, b, 0, &[(c, 0)]).await;
        feed(&coordinator, c, 0, &[(a, 0)]).await;

        for ticket in tickets {
            timeout(TICK, ticket.wait()).await.unwrap().unwrap();
        }

        // a's wait is discarded; c only needed a, b only needed c.
        assert_eq!(executor.finish_order(), vec![(a, 0), (c, 0), (b, 0)]);
    }

    /// Identical inputs produce identical execution orders on independent
    /// coordinators.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_cycle_verdict_is_reproducible() {
        let mut orders = Vec::new();
        for _ in 0..2 {
            let executor = Arc::new(EventLogExecutor::default());
            let coordinator = coordinator(Arc::clone(&executor));
            let p1 = PeerId::from_bytes([1; 16]);
            let p2 = PeerId::from_bytes([2; 16]);
            announce_all(&coordinator, &[p1, p2]).await;
            let disk = ResourceId::generate();

            let t1 = admit(&coordinator, p1, 0, vec![disk]).await;
            let t2 = admit(&coordinator, p2, 0, vec![disk]).await;
            feed(&coordinator, p2, 0, &[(p1, 0)]).await;
            feed(&coordinator, p1, 0, &[(p2, 0)]).await;

            timeout(TICK, t1.wait()).await.unwrap().unwrap();
            timeout(TICK, t2.wait()).await.unwrap().unwrap();
            orders.push(executor.finish_order());
        }
        assert_eq!(orders[0], orders[1]);
    }

    // =========================================================================
    // TIMEOUTS AND DEGRADATION
    // =========================================================================

    /// A starved operation fails at the timeout, its successor proceeds,
    /// and vectors arriving after the fact are discarded.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_vector_times_out_without_wedging_the_peer() {
        let executor = Arc::new(EventLogExecutor::default());
        let coordinator = coordinator(Arc::clone(&executor));
        let peer = PeerId::from_bytes([4; 16]);
        announce_all(&coordinator, &[peer]).await;
        let disk = ResourceId::generate();

        let starved = admit(&coordinator, peer, 0, vec![disk]).await;
        let healthy = admit(&coordinator, peer, 1, vec![disk]).await;
        feed(&coordinator, peer, 1, &[]).await;

        let result = timeout(TICK, starved.wait()).await.unwrap();
        assert!(matches!(result, Err(OrderingError::Timeout { .. })));
        timeout(TICK, healthy.wait()).await.unwrap().unwrap();
        assert_eq!(executor.finished(peer), vec![1]);

        // The vector showing up late changes nothing.
        feed(&coordinator, peer, 0, &[]).await;
        assert_eq!(executor.finished(peer), vec![1]);
    }

    /// A vector naming an unknown peer degrades its operation, and anything
    /// ordered behind the degraded front fails with it instead of running
    /// on half-checked dependencies.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_degraded_front_cascades_to_dependents() {
        let executor = Arc::new(EventLogExecutor::default());
        let coordinator = coordinator(Arc::clone(&executor));
        let p1 = PeerId::from_bytes([1; 16]);
        let p2 = PeerId::from_bytes([2; 16]);
        let ghost = PeerId::from_bytes([9; 16]);
        announce_all(&coordinator, &[p1, p2]).await;
        let disk = ResourceId::generate();

        let t1 = admit(&coordinator, p1, 0, vec![disk]).await;
        let t2 = admit(&coordinator, p2, 0, vec![disk]).await;

        feed(&coordinator, p2, 0, &[(p1, 0)]).await;
        feed(&coordinator, p1, 0, &[(ghost, 3)]).await;

        let r1 = timeout(TICK, t1.wait()).await.unwrap();
        assert!(matches!(r1, Err(OrderingError::UnknownPeer { .. })));
        let r2 = timeout(TICK, t2.wait()).await.unwrap();
        assert!(matches!(r2, Err(OrderingError::Aborted { .. })));
        assert!(executor.events().is_empty(), "nothing may execute");
    }
}
