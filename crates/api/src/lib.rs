//! # Trellis API
//!
//! HTTP surface for the calendar aggregation service. Wires the SQLite
//! stores and provider adapters into the core services and exposes them
//! as an axum router.

pub mod context;
pub mod routes;

pub use context::AppContext;
pub use routes::build_router;
