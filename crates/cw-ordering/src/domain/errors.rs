//! Error taxonomy of the ordering coordinator.
//!
//! Local, recoverable conditions degrade the single affected operation;
//! invariant violations (out-of-order completion, teardown with pending
//! work) panic instead of appearing here.

use shared_types::{FieldError, PeerId, SequenceNumber, WireError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    /// Registry miss for an operation that carried protocol fields.
    #[error("peer {peer} is not registered")]
    UnknownPeer { peer: PeerId },

    /// Submission reusing a pending or already-completed sequence number.
    #[error("invalid sequence from {peer}: submitted {got}, expected {expected}")]
    InvalidSequence {
        peer: PeerId,
        got: SequenceNumber,
        expected: SequenceNumber,
    },

    /// Protocol fields present only partially, badly typed, or out of range.
    #[error("malformed protocol fields: {reason}")]
    MalformedFields { reason: String },

    /// Malformed causal-vector buffer.
    #[error("invalid dependency payload: {0}")]
    InvalidDependencyPayload(#[from] WireError),

    /// A bounded structure reached capacity; the operation degrades.
    #[error("capacity exhausted: {what}")]
    ResourceExhaustion { what: &'static str },

    /// Dependency data did not arrive in time.
    #[error("dependency data did not arrive within {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    /// The ordering layer aborted the operation without executing it.
    #[error("operation aborted: {reason}")]
    Aborted { reason: &'static str },

    /// The execution collaborator failed the operation.
    #[error("execution failed: {reason}")]
    ExecutionFailed { reason: String },

    /// The coordinator went away before the operation completed.
    #[error("coordinator shut down before completion")]
    Shutdown,
}

impl From<FieldError> for OrderingError {
    fn from(err: FieldError) -> Self {
        OrderingError::MalformedFields {
            reason: err.to_string(),
        }
    }
}

/// Failure reported by the execution collaborator for one operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ExecutionError {
    pub reason: String,
}

impl From<ExecutionError> for OrderingError {
    fn from(err: ExecutionError) -> Self {
        OrderingError::ExecutionFailed { reason: err.reason }
    }
}
