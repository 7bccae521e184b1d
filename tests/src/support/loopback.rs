//! In-process transports: a proxy channel wired straight into a
//! coordinator, and one that leads nowhere.

use async_trait::async_trait;
use bytes::Bytes;
use cw_ordering::{Coordinator, OrderingApi, OrderingError};
use cw_sort_proxy::{ProxyError, ReplicaTransport};
use shared_types::{PeerId, SequenceNumber};
use std::sync::Arc;
use std::time::Duration;

/// Bridges [`ReplicaTransport`] onto a coordinator in the same process.
pub struct LoopbackTransport {
    coordinator: Arc<Coordinator>,
}

impl LoopbackTransport {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl ReplicaTransport for LoopbackTransport {
    async fn announce(
        &self,
        proxy: PeerId,
        start: SequenceNumber,
    ) -> Result<PeerId, ProxyError> {
        self.coordinator
            .announce(proxy, start)
            .await
            .map_err(|err| ProxyError::Transport {
                reason: err.to_string(),
            })
    }

    async fn query(&self, proxy: PeerId, payload: Bytes) -> Result<Bytes, ProxyError> {
        match self.coordinator.poll(proxy, payload).await {
            Ok(block) => Ok(block),
            Err(OrderingError::Timeout { .. }) => Err(ProxyError::PollTimeout),
            Err(err) => Err(ProxyError::Transport {
                reason: err.to_string(),
            }),
        }
    }
}

/// A replica that never answers: announces fine, then every poll idles out.
/// Stands in for a storage node that accepted the connection and went dark.
pub struct BlackholeTransport {
    coordinator: PeerId,
    idle: Duration,
}

impl BlackholeTransport {
    pub fn new() -> Self {
        Self {
            coordinator: PeerId::generate(),
            idle: Duration::from_millis(20),
        }
    }
}

impl Default for BlackholeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReplicaTransport for BlackholeTransport {
    async fn announce(
        &self,
        _proxy: PeerId,
        _start: SequenceNumber,
    ) -> Result<PeerId, ProxyError> {
        Ok(self.coordinator)
    }

    async fn query(&self, _proxy: PeerId, _payload: Bytes) -> Result<Bytes, ProxyError> {
        tokio::time::sleep(self.idle).await;
        Err(ProxyError::PollTimeout)
    }
}
