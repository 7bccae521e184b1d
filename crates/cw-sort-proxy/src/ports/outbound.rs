//! Outbound port: the long-poll link to one replica's coordinator.

use crate::domain::errors::ProxyError;
use async_trait::async_trait;
use bytes::Bytes;
use shared_types::{PeerId, SequenceNumber};

/// Long-poll transport to a replica-side coordinator.
///
/// `query` delivers merged vectors and then parks server-side until a
/// dependency block is available or the idle period elapses; the pump
/// treats [`ProxyError::PollTimeout`] as routine and simply polls again.
#[async_trait]
pub trait ReplicaTransport: Send + Sync {
    /// Introduce the proxy and the first txn it will assign. Returns the
    /// coordinator's identity.
    async fn announce(&self, proxy: PeerId, start: SequenceNumber)
        -> Result<PeerId, ProxyError>;

    /// One poll round.
    async fn query(&self, proxy: PeerId, payload: Bytes) -> Result<Bytes, ProxyError>;
}
