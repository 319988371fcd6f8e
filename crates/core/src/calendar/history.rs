//! Sync history recording and retrieval

use std::sync::Arc;

use tracing::instrument;
use trellis_domain::constants::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use trellis_domain::{Result, SyncHistoryEntry, SyncHistoryParams, TrellisError};

use super::ports::SyncHistoryStore;

/// Append-only audit log of calendar state transitions.
pub struct SyncHistoryService {
    store: Arc<dyn SyncHistoryStore>,
}

impl SyncHistoryService {
    pub fn new(store: Arc<dyn SyncHistoryStore>) -> Self {
        Self { store }
    }

    /// Record one observation. The entry is immutable once written.
    #[instrument(skip(self, params), fields(user_id = %params.user_id, action = %params.action.as_str()))]
    pub async fn record(&self, params: SyncHistoryParams) -> Result<SyncHistoryEntry> {
        if params.user_id.trim().is_empty() {
            return Err(TrellisError::Validation("user_id must not be empty".to_string()));
        }
        if params.event_id.trim().is_empty() {
            return Err(TrellisError::Validation("event_id must not be empty".to_string()));
        }
        self.store.append(params).await
    }

    /// Most recent entries for a user, newest first.
    ///
    /// A missing limit falls back to the default page size; an oversized
    /// one is clamped rather than rejected.
    #[instrument(skip(self))]
    pub async fn recent(&self, user_id: &str, limit: Option<u32>) -> Result<Vec<SyncHistoryEntry>> {
        if user_id.trim().is_empty() {
            return Err(TrellisError::Validation("user_id must not be empty".to_string()));
        }
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
        self.store.list(user_id, limit).await
    }
}
