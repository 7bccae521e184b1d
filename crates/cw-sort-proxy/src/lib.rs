//! # Causeway Sort Proxy
//!
//! Client-side sort aggregation for the ordering layer. The proxy assigns
//! each transaction a per-proxy sequence number, collects the causal vector
//! every storage replica computed for it, merges those vectors into one
//! deterministic result, and feeds the merged vector back to the replicas,
//! where the coordinator releases the operation for dependency evaluation.
//!
//! ## Architecture
//!
//! - **Domain**: Tracked transactions, the merge rule, error taxonomy
//! - **Replica**: Per-channel poll-slot pool and outgoing vector buffer
//! - **Ports**: Inbound ([`AggregatorApi`]) and outbound ([`ReplicaTransport`])
//! - **Application**: The [`SortProxy`] service and its poll pump
//!
//! ## Determinism
//!
//! Merging is commutative: for peers ordered below the proxy the larger
//! reported txn wins, for peers above it the smaller one does. Replica
//! replies can therefore arrive in any order on any proxy and still produce
//! identical merged vectors, which is what lets independent coordinators
//! agree on a single execution order without talking to each other.

pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod replica;

pub use application::aggregator::SortProxy;
pub use config::AggregatorConfig;
pub use domain::errors::ProxyError;
pub use domain::transaction::ProxyTransaction;
pub use ports::inbound::AggregatorApi;
pub use ports::outbound::ReplicaTransport;
