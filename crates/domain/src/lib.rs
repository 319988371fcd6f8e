//! # Trellis Domain
//!
//! Business domain types and models for the Trellis calendar service.
//!
//! This crate contains:
//! - Domain data types (canonical events, account tokens, sync history)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Trellis crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
