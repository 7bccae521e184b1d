//! Proxy domain model: tracked transactions and the merge rule.

pub mod errors;
pub mod merge;
pub mod transaction;

pub use errors::ProxyError;
pub use transaction::ProxyTransaction;
