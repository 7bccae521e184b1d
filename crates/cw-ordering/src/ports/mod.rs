//! Boundary traits of the ordering coordinator.
//!
//! Inbound: what a transport adapter drives. Outbound: the collaborators
//! the coordinator drives in turn.

pub mod inbound;
pub mod outbound;

pub use inbound::OrderingApi;
pub use outbound::OperationExecutor;
