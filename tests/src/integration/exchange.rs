//! # Long-Poll Channel Behavior
//!
//! The exchange side of the coordinator API: block batching, parked polls
//! waking on admission, and competition between concurrent pollers.

#[cfg(test)]
mod tests {
    use crate::support::executor::EventLogExecutor;
    use bytes::Bytes;
    use cw_ordering::{
        Coordinator, CoordinatorConfig, OrderingApi, OrderingError, SubmitOutcome, Submission,
    };
    use shared_types::{
        FieldMap, OpKind, PeerId, ResourceId, SequenceNumber, SortReader, FIELD_PEER, FIELD_TXN,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const TICK: Duration = Duration::from_secs(3);

    fn coordinator() -> Arc<Coordinator> {
        Arc::new(Coordinator::with_config(
            CoordinatorConfig {
                registry_buckets: 16,
                pending_slots: 64,
                dependency_timeout_ms: 500,
                poll_timeout_ms: 60,
            },
            Arc::new(EventLogExecutor::default()),
        ))
    }

    async fn admit(coordinator: &Coordinator, peer: PeerId, txn: u64, resource: ResourceId) {
        let mut fields = FieldMap::new();
        fields.insert_id(FIELD_PEER, *peer.as_bytes());
        fields.insert_int(FIELD_TXN, txn as i64);
        let submission = Submission {
            kind: OpKind(2),
            read_only: false,
            resources: vec![resource],
            fields,
        };
        match coordinator.submit(submission).await.unwrap() {
            SubmitOutcome::Managed(_ticket) => {}
            SubmitOutcome::Unmanaged(_) => panic!("expected a managed submission"),
        }
    }

    /// Blocks queued between polls ride out together, oldest first.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_one_poll_batches_all_queued_blocks() {
        let coordinator = coordinator();
        let peer = PeerId::from_bytes([7; 16]);
        coordinator.announce(peer, SequenceNumber::ZERO).await.unwrap();

        for txn in 0..3 {
            admit(&coordinator, peer, txn, ResourceId::generate()).await;
        }

        let payload = coordinator.poll(peer, Bytes::new()).await.unwrap();
        let mut reader = SortReader::new(payload);
        let mut owners = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            owners.push(record.owner.value());
        }
        assert_eq!(owners, vec![0, 1, 2]);
    }

    /// With two pollers parked, one admission wakes exactly one of them;
    /// the other idles out empty-handed.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_one_block_wakes_one_of_two_pollers() {
        let coordinator = coordinator();
        let peer = PeerId::from_bytes([7; 16]);
        coordinator.announce(peer, SequenceNumber::ZERO).await.unwrap();

        let pollers: Vec<_> = (0..2)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.poll(peer, Bytes::new()).await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        admit(&coordinator, peer, 0, ResourceId::generate()).await;

        let mut served = 0;
        let mut idled = 0;
        for poller in pollers {
            match timeout(TICK, poller).await.unwrap().unwrap() {
                Ok(payload) => {
                    assert!(!payload.is_empty());
                    served += 1;
                }
                Err(OrderingError::Timeout { .. }) => idled += 1,
                Err(err) => panic!("unexpected poll failure: {err}"),
            }
        }
        assert_eq!((served, idled), (1, 1));
    }

    /// A poller that parked before the admission still gets the block.
    #[tokio::test(flavor = "multi_thread")]
    async fn test_parked_poller_wakes_on_admission() {
        let coordinator = coordinator();
        let peer = PeerId::from_bytes([7; 16]);
        coordinator.announce(peer, SequenceNumber::ZERO).await.unwrap();

        let poller = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.poll(peer, Bytes::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        admit(&coordinator, peer, 0, ResourceId::generate()).await;

        let payload = timeout(TICK, poller).await.unwrap().unwrap().unwrap();
        let mut reader = SortReader::new(payload);
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.owner.value(), 0);
        assert_eq!(record.entries.len(), 0);
    }
}
