//! Inbound port: the transaction lifecycle driven by the filesystem client.

use crate::domain::errors::ProxyError;
use async_trait::async_trait;
use shared_types::{FieldMap, SequenceNumber};

/// Lifecycle of managed transactions on the proxy.
///
/// `begin` assigns the txn, `attach` stamps the protocol fields onto the
/// outgoing operation, `end` reports how many replicas received it, and
/// `complete` counts one replica's execution confirmation. A transaction is
/// dropped once every replica has both contributed a vector and confirmed.
#[async_trait]
pub trait AggregatorApi: Send + Sync {
    /// Open a transaction and assign its per-proxy sequence number.
    fn begin(&self) -> SequenceNumber;

    /// Stamp the identity and txn fields onto an outgoing operation.
    fn attach(&self, txn: SequenceNumber, fields: &mut FieldMap);

    /// The operation went out to `replicas` storage replicas.
    async fn end(&self, txn: SequenceNumber, replicas: usize) -> Result<(), ProxyError>;

    /// One replica confirmed execution. True when the transaction retired.
    async fn complete(&self, txn: SequenceNumber) -> Result<bool, ProxyError>;
}
