//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Provider fetch configuration
/// Per-token outbound call budget; a call past this is treated as a fetch
/// failure for that token.
pub const PROVIDER_FETCH_TIMEOUT_SECS: u64 = 30;
/// Page size requested from provider event listings.
pub const PROVIDER_PAGE_SIZE: u32 = 250;
/// Hard cap on pagination rounds per token, so a misbehaving provider
/// cannot hold an aggregation open indefinitely.
pub const PROVIDER_MAX_PAGES: u32 = 20;

// Sync history read path
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 200;

// Database configuration
pub const DEFAULT_DB_POOL_SIZE: u32 = 8;

// HTTP server defaults
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8460";
