//! # Causeway Test Suite
//!
//! Unified test crate for cross-crate behavior.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── support/          # Shared fixtures: executors, loopback transports
//! │   ├── executor.rs
//! │   └── loopback.rs
//! │
//! └── integration/      # Cross-crate choreography
//!     ├── ordering.rs   # Coordinator-side scheduling properties
//!     ├── exchange.rs   # Long-poll channel behavior
//!     └── loopback.rs   # Proxy to coordinator round trips
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p cw-tests
//!
//! # By category
//! cargo test -p cw-tests integration::
//! cargo test -p cw-tests integration::loopback::
//! ```

#![allow(dead_code)]

pub mod integration;
