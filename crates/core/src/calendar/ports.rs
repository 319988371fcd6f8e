//! Port interfaces for calendar aggregation
//!
//! These traits define the boundaries between core business logic
//! and infrastructure implementations.

use std::sync::Arc;

use async_trait::async_trait;
use trellis_domain::{
    CalendarAccountToken, CalendarAccountTokenParams, CalendarEvent, CalendarProviderKind, Result,
    SyncHistoryEntry, SyncHistoryParams, TokenRefresh,
};

use super::window::AggregationWindow;

/// Trait for fetching events from one calendar provider's API
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// The provider this adapter speaks to.
    fn kind(&self) -> CalendarProviderKind;

    /// Fetch events for the token's calendar within the window, already
    /// converted to the canonical shape.
    async fn fetch_events(
        &self,
        token: &CalendarAccountToken,
        window: &AggregationWindow,
    ) -> Result<Vec<CalendarEvent>>;

    /// Exchange a refresh token for a new access token.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenRefresh>;
}

/// Trait for resolving the adapter that speaks a given provider's protocol
pub trait ProviderRegistry: Send + Sync {
    fn provider_for(&self, kind: CalendarProviderKind) -> Option<Arc<dyn CalendarProvider>>;
}

/// Trait for persisting calendar account tokens
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// All tokens for a user, regardless of sync state.
    async fn list_tokens(&self, user_id: &str) -> Result<Vec<CalendarAccountToken>>;

    /// Tokens eligible for aggregation (sync enabled).
    async fn list_enabled_tokens(&self, user_id: &str) -> Result<Vec<CalendarAccountToken>>;

    /// Fetch a single token by id, scoped to the owning user.
    async fn get_token(&self, user_id: &str, token_id: &str) -> Result<CalendarAccountToken>;

    /// Insert or replace the token for (user, provider, calendar).
    async fn upsert_token(&self, params: CalendarAccountTokenParams)
        -> Result<CalendarAccountToken>;

    /// Remove a token. Errors with NotFound if it does not exist.
    async fn delete_token(&self, user_id: &str, token_id: &str) -> Result<()>;

    /// Persist a refreshed access token and its new expiry.
    async fn update_access_token(
        &self,
        token_id: &str,
        access_token: &str,
        expires_at: Option<i64>,
    ) -> Result<()>;
}

/// Trait for the append-only sync history log
#[async_trait]
pub trait SyncHistoryStore: Send + Sync {
    /// Append one entry. Entries are never updated or deleted.
    async fn append(&self, params: SyncHistoryParams) -> Result<SyncHistoryEntry>;

    /// Most recent entries for a user, newest first.
    async fn list(&self, user_id: &str, limit: u32) -> Result<Vec<SyncHistoryEntry>>;
}
