//! # Error Types
//!
//! Wire-level and field-level errors shared by both halves.

use thiserror::Error;

/// Violations of the causal-vector wire format or of a bounded buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Buffer ended in the middle of a record.
    #[error("truncated record: {remaining} bytes remain, need {needed}")]
    Truncated { remaining: usize, needed: usize },

    /// A block length field that cannot frame a whole number of entries.
    #[error("bad block length {length}: not owner prefix + whole entries")]
    BadBlockLength { length: u32 },

    /// Appending a block would exceed the sort buffer capacity.
    #[error("sort buffer full: block of {needed} bytes, {available} available")]
    BufferFull { needed: usize, available: usize },

    /// A dependency set reached its entry capacity.
    #[error("dependency set full: capacity {capacity} entries")]
    DependencySetFull { capacity: usize },
}

/// A protocol field present with an unexpected value type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("field `{field}` has the wrong type")]
    WrongType { field: String },
}
