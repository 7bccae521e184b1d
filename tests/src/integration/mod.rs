//! Cross-crate choreography tests.

pub mod exchange;
pub mod loopback;
pub mod ordering;
