//! Proxy-side error taxonomy.

use shared_types::{SequenceNumber, WireError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// Lifecycle call for a transaction this proxy is not tracking.
    #[error("transaction {txn} is not pending on this proxy")]
    UnknownTransaction { txn: SequenceNumber },

    /// A payload failed to frame or decode; it is rejected whole.
    #[error("wire codec failure: {0}")]
    Codec(#[from] WireError),

    /// The replica link failed outright.
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    /// A long poll came back empty; the pump treats this as routine.
    #[error("poll idle period elapsed")]
    PollTimeout,
}
