//! Unified calendar aggregation
//!
//! Services and port interfaces for fetching events from connected provider
//! accounts, merging them into a single timeline, and recording sync history.

pub mod aggregator;
pub mod history;
pub mod ports;
pub mod refresh;
pub mod window;
