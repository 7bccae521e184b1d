//! Inbound port: the coordinator's driving API.

use crate::domain::errors::OrderingError;
use crate::domain::request::{SubmitOutcome, Submission};
use async_trait::async_trait;
use bytes::Bytes;
use shared_types::{PeerId, SequenceNumber};

/// Driving interface of the ordering coordinator.
///
/// One implementation serves every connected proxy peer; per-peer state
/// hangs off the registry, keyed by the ids the calls carry.
#[async_trait]
pub trait OrderingApi: Send + Sync {
    /// Submit one operation. A submission carrying identity fields is
    /// managed: it resolves through the returned completion ticket, in
    /// dependency-safe order. A submission without protocol fields passes
    /// through untouched.
    async fn submit(&self, submission: Submission) -> Result<SubmitOutcome, OrderingError>;

    /// Register `peer`, or refresh an existing registration, with the txn
    /// its numbering starts at. Returns this coordinator's own node id for
    /// the peer's tie-break bookkeeping.
    async fn announce(&self, peer: PeerId, start: SequenceNumber)
        -> Result<PeerId, OrderingError>;

    /// One long-poll round: ingest `payload` (empty on the first round),
    /// then answer with the next batch of dependency blocks. Parks up to
    /// the poll timeout when nothing is queued.
    async fn poll(&self, peer: PeerId, payload: Bytes) -> Result<Bytes, OrderingError>;
}
