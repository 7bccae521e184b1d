//! Application layer wiring the inbound API onto the scheduler.

pub mod service;

pub use service::Coordinator;
