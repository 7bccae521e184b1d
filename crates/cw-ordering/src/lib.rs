//! # Causeway Ordering Subsystem
//!
//! Coordinator-side causal ordering for replicated operations. Builds
//! per-operation wait-sets from the causal vectors merged by the sort
//! proxy, breaks replica-disagreement cycles deterministically, and admits
//! each peer's operations to execution in dependency-safe order.
//!
//! ## Architecture
//!
//! - **Domain**: Clients, requests, the client registry, error taxonomy
//! - **Graph**: Resource chains, the link arena, cycle detection
//! - **Scheduler**: Admission, release gate, dispatch, completion
//! - **Exchange**: Long-poll channel carrying dependency blocks
//! - **Ports**: Inbound ([`OrderingApi`]) and outbound ([`OperationExecutor`])
//! - **Application**: The [`Coordinator`] service
//!
//! ## Ordering model
//!
//! Every managed operation carries a per-peer sequence number assigned by
//! its proxy. The coordinator sends the operation's raw dependency block to
//! the proxy, the proxy merges the causal vectors of all storage replicas,
//! and the merged vector comes back on a later poll. Only then is the
//! operation released: it executes once every (peer, txn) requirement in
//! its wait-set has been satisfied, with ties and cycles broken toward the
//! lexicographically smallest peer so that every coordinator reaches the
//! same verdict independently.

pub mod application;
pub mod builder;
pub mod config;
pub mod domain;
pub mod evaluator;
pub mod exchange;
pub mod graph;
pub mod intake;
pub mod ports;
pub mod scheduler;
pub mod timer;

pub use application::service::Coordinator;
pub use config::CoordinatorConfig;
pub use domain::errors::{ExecutionError, OrderingError};
pub use domain::request::{
    CompletionTicket, OpResult, Operation, Submission, SubmitOutcome,
};
pub use intake::Intake;
pub use ports::inbound::OrderingApi;
pub use ports::outbound::OperationExecutor;
