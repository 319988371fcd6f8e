//! # Trellis Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for providers and storage
//! - The unified calendar aggregation service
//! - Sync history and token refresh use cases
//!
//! ## Architecture Principles
//! - Only depends on `trellis-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod calendar;

// Re-export specific items to avoid ambiguity
pub use calendar::aggregator::UnifiedCalendarService;
pub use calendar::history::SyncHistoryService;
pub use calendar::ports::{CalendarProvider, ProviderRegistry, SyncHistoryStore, TokenStore};
pub use calendar::refresh::TokenRefreshService;
pub use calendar::window::AggregationWindow;
