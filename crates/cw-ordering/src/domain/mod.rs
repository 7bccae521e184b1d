//! Coordinator domain model: requests, per-peer clients, and the registry.

pub mod client;
pub mod errors;
pub mod registry;
pub mod request;

pub use client::{Client, ClientInner, PendingTable};
pub use errors::{ExecutionError, OrderingError};
pub use registry::ClientRegistry;
pub use request::{CompletionTicket, OpResult, Operation, Request, RequestState, SubmitOutcome, Submission};
