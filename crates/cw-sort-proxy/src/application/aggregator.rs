//! Sort Aggregator Service
//!
//! Client-side half of the ordering layer. Assigns per-proxy txn numbers,
//! gathers every replica's causal vector for each transaction, merges them
//! deterministically and broadcasts the merged vector back to the
//! contributing replicas, where it releases the operation for evaluation.
//!
//! The poll pump keeps a bounded number of long polls in flight per replica
//! channel; merged vectors ride out on poll queries, dependency blocks ride
//! back on their replies.

use crate::config::AggregatorConfig;
use crate::domain::errors::ProxyError;
use crate::domain::transaction::ProxyTransaction;
use crate::ports::inbound::AggregatorApi;
use crate::ports::outbound::ReplicaTransport;
use crate::replica::{PollSlot, ReplicaChannel};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use shared_types::{FieldMap, PeerId, SequenceNumber, SortReader, FIELD_PEER, FIELD_TXN};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

struct ProxyInner {
    id: PeerId,
    config: AggregatorConfig,
    channels: Vec<Arc<ReplicaChannel>>,
    /// Pending transactions keyed by txn value.
    table: DashMap<u64, Arc<ProxyTransaction>>,
    next_txn: AtomicU64,
}

/// Proxy-side sort aggregator. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct SortProxy {
    inner: Arc<ProxyInner>,
}

impl SortProxy {
    /// Create a proxy with a fresh identity.
    pub fn new(config: AggregatorConfig, transports: Vec<Arc<dyn ReplicaTransport>>) -> Self {
        Self::with_id(PeerId::generate(), config, transports)
    }

    /// Create a proxy with a persisted identity. Coordinators keep per-peer
    /// counters across announcements, so a restarting proxy must come back
    /// under the same id.
    pub fn with_id(
        id: PeerId,
        config: AggregatorConfig,
        transports: Vec<Arc<dyn ReplicaTransport>>,
    ) -> Self {
        let hard_cap = config.pool_hard_cap;
        let channels = transports
            .into_iter()
            .enumerate()
            .map(|(index, transport)| Arc::new(ReplicaChannel::new(index, transport, hard_cap)))
            .collect();
        Self {
            inner: Arc::new(ProxyInner {
                id,
                config,
                channels,
                table: DashMap::new(),
                next_txn: AtomicU64::new(0),
            }),
        }
    }

    pub fn id(&self) -> PeerId {
        self.inner.id
    }

    /// Announce to every replica coordinator, then prime the poll pump.
    pub async fn start(&self) -> Result<(), ProxyError> {
        let start = SequenceNumber::new(self.inner.next_txn.load(Ordering::Acquire));
        for channel in &self.inner.channels {
            let coordinator = channel.transport.announce(self.inner.id, start).await?;
            channel.set_coordinator(coordinator);
            info!(
                replica = channel.index,
                coordinator = %coordinator,
                "replica channel announced"
            );
        }
        for channel in &self.inner.channels {
            for _ in 0..self.inner.config.pool_target {
                match channel.take_slot() {
                    Some(slot) => spawn_poll(&self.inner, channel, slot, Bytes::new()),
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Transactions still waiting for vectors or confirmations.
    pub fn pending_transactions(&self) -> usize {
        self.inner.table.len()
    }

    fn lookup(&self, txn: SequenceNumber) -> Result<Arc<ProxyTransaction>, ProxyError> {
        match self.inner.table.get(&txn.value()) {
            Some(found) => Ok(Arc::clone(found.value())),
            None => Err(ProxyError::UnknownTransaction { txn }),
        }
    }
}

#[async_trait]
impl AggregatorApi for SortProxy {
    fn begin(&self) -> SequenceNumber {
        let txn = self.inner.next_txn.fetch_add(1, Ordering::AcqRel);
        let tx = Arc::new(ProxyTransaction::new(SequenceNumber::new(txn)));
        self.inner.table.insert(txn, tx);
        trace!(txn, "transaction opened");
        SequenceNumber::new(txn)
    }

    fn attach(&self, txn: SequenceNumber, fields: &mut FieldMap) {
        fields.insert_id(FIELD_PEER, *self.inner.id.as_bytes());
        fields.insert_int(FIELD_TXN, txn.value() as i64);
    }

    async fn end(&self, txn: SequenceNumber, replicas: usize) -> Result<(), ProxyError> {
        let tx = self.lookup(txn)?;

        // 1. Arm the counters with the replica count.
        let (replies_done, _) = tx.arm(replicas as i64);
        debug!(txn = %txn, replicas, "transaction submitted");

        // 2. Replies may all have beaten the arm.
        if replies_done {
            broadcast(&self.inner, &tx)?;
        }
        if tx.drained() {
            retire(&self.inner, &tx);
        }
        Ok(())
    }

    async fn complete(&self, txn: SequenceNumber) -> Result<bool, ProxyError> {
        let tx = self.lookup(txn)?;
        tx.note_completion();
        let drained = tx.drained();
        if drained {
            retire(&self.inner, &tx);
        }
        Ok(drained)
    }
}

impl std::fmt::Debug for SortProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortProxy")
            .field("id", &self.inner.id)
            .field("replicas", &self.inner.channels.len())
            .field("pending", &self.inner.table.len())
            .finish()
    }
}

/// One poll round against a replica coordinator, recycling its slot after.
fn spawn_poll(
    inner: &Arc<ProxyInner>,
    channel: &Arc<ReplicaChannel>,
    slot: PollSlot,
    payload: Bytes,
) {
    channel.active.fetch_add(1, Ordering::AcqRel);
    let inner = Arc::clone(inner);
    let channel = Arc::clone(channel);
    tokio::spawn(async move {
        let result = channel.transport.query(inner.id, payload).await;
        channel.active.fetch_sub(1, Ordering::AcqRel);
        match result {
            Ok(reply) => {
                if !reply.is_empty() {
                    if let Err(err) = ingest(&inner, &channel, reply) {
                        warn!(replica = channel.index, error = %err, "poll reply rejected");
                    }
                }
            }
            // Idle polls expire all the time; go round again.
            Err(ProxyError::PollTimeout) => {
                trace!(replica = channel.index, slot = slot.id, "poll idled out");
            }
            Err(err) => {
                warn!(replica = channel.index, error = %err, "poll failed");
            }
        }
        recycle(&inner, &channel, slot);
    });
}

/// Return the slot, then top the channel back up to its target poll depth.
fn recycle(inner: &Arc<ProxyInner>, channel: &Arc<ReplicaChannel>, slot: PollSlot) {
    channel.return_slot(slot);
    while channel.active.load(Ordering::Acquire) < inner.config.pool_target {
        let Some(slot) = channel.take_slot() else { break };
        spawn_poll(inner, channel, slot, channel.take_outgoing());
    }
}

/// Apply one poll reply: every framed block in it is one replica's vector
/// for a pending transaction.
fn ingest(
    inner: &Arc<ProxyInner>,
    channel: &Arc<ReplicaChannel>,
    reply: Bytes,
) -> Result<(), ProxyError> {
    let mut reader = SortReader::new(reply);
    while let Some(record) = reader.next_record()? {
        let tx = match inner.table.get(&record.owner.value()) {
            Some(found) => Arc::clone(found.value()),
            None => {
                debug!(
                    replica = channel.index,
                    txn = %record.owner,
                    "vector for an unknown transaction discarded"
                );
                continue;
            }
        };

        tx.merge(inner.id, &record.entries);
        if tx.note_reply(channel.index) {
            broadcast(inner, &tx)?;
        }
        if tx.drained() {
            retire(inner, &tx);
        }
    }
    Ok(())
}

/// Ship the merged vector to every replica that contributed to it.
fn broadcast(inner: &Arc<ProxyInner>, tx: &Arc<ProxyTransaction>) -> Result<(), ProxyError> {
    let merged = tx.merged();
    let mask = tx.contributors();
    debug!(txn = %tx.id(), entries = merged.len(), mask, "merged vector complete");

    for channel in &inner.channels {
        if mask & (1 << channel.index) == 0 {
            continue;
        }
        let (flush_now, displaced) = channel.queue_block(tx.id(), &merged)?;
        if let Some(displaced) = displaced {
            send_now(inner, channel, displaced);
        }
        if flush_now {
            let payload = channel.take_outgoing();
            if !payload.is_empty() {
                send_now(inner, channel, payload);
            }
        }
    }
    Ok(())
}

/// Put a payload on the wire immediately, pooled when a slot is free.
fn send_now(inner: &Arc<ProxyInner>, channel: &Arc<ReplicaChannel>, payload: Bytes) {
    match channel.take_slot() {
        Some(slot) => spawn_poll(inner, channel, slot, payload),
        None => {
            // Hard cap reached: send unpooled rather than strand the vector.
            warn!(replica = channel.index, "slot pool exhausted; unpooled send");
            let inner = Arc::clone(inner);
            let channel = Arc::clone(channel);
            tokio::spawn(async move {
                match channel.transport.query(inner.id, payload).await {
                    Ok(reply) if !reply.is_empty() => {
                        if let Err(err) = ingest(&inner, &channel, reply) {
                            warn!(replica = channel.index, error = %err, "poll reply rejected");
                        }
                    }
                    Ok(_) | Err(ProxyError::PollTimeout) => {}
                    Err(err) => {
                        warn!(replica = channel.index, error = %err, "unpooled send failed");
                    }
                }
            });
        }
    }
}

/// Drop a fully-drained transaction from the table.
fn retire(inner: &Arc<ProxyInner>, tx: &Arc<ProxyTransaction>) {
    if inner.table.remove(&tx.id().value()).is_some() {
        debug!(txn = %tx.id(), "transaction retired");
    }
}
