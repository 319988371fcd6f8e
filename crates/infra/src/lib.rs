//! # Trellis Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Database implementations (SQLite token and sync-history stores)
//! - HTTP client implementation
//! - Calendar provider adapters (Google, Outlook, Apple)
//!
//! ## Architecture
//! - Implements traits defined in `trellis-core`
//! - Depends on `trellis-domain` and `trellis-core`
//! - Contains all "impure" code (I/O, provider APIs)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use http::*;
pub use integrations::*;
