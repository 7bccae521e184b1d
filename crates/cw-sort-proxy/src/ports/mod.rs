//! Hexagonal ports: the lifecycle API in, the replica transport out.

pub mod inbound;
pub mod outbound;

pub use inbound::AggregatorApi;
pub use outbound::ReplicaTransport;
