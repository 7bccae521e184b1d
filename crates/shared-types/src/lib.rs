//! # Shared Types Crate
//!
//! Vocabulary shared by both halves of the ordering layer: the proxy-side
//! sort aggregator and the coordinator-side scheduler.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: identifiers, wait-sets and the causal-vector
//!   wire format are defined here and nowhere else.
//! - **Opaque identifiers**: `PeerId` and `ResourceId` are compared
//!   byte-lexicographically; the scheduler relies on that total order as its
//!   deterministic tie-break.
//! - **Bounded buffers**: wait-sets and sort buffers carry hard capacities;
//!   overflow is an explicit error, never silent truncation.

pub mod deps;
pub mod errors;
pub mod fields;
pub mod ids;
pub mod wire;

pub use deps::{DependencyEntry, DependencySet, MAX_DEPENDENCIES};
pub use errors::{FieldError, WireError};
pub use fields::{FieldMap, FieldValue, FIELD_PEER, FIELD_SORT, FIELD_TXN};
pub use ids::{OpKind, PeerId, ResourceId, SequenceNumber};
pub use wire::{SortBuffer, SortReader, SortRecord, SORT_BUFFER_CAPACITY};
