//! Outbound port: storage-side execution.

use crate::domain::errors::ExecutionError;
use crate::domain::request::Operation;
use async_trait::async_trait;

/// Executes admitted operations against the local replica.
///
/// Called once per operation after every ordering constraint has cleared;
/// operations of one peer arrive in strict txn order. A returned error
/// resolves the submitter's ticket as [`ExecutionError`] but does not
/// disturb the ordering state of anything behind it.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    async fn execute(&self, op: &Operation) -> Result<(), ExecutionError>;
}
