//! Application layer: the aggregator service and its poll pump.

pub mod aggregator;

pub use aggregator::SortProxy;
