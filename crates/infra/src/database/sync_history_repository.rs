//! SQLite-backed implementation of the SyncHistoryStore port.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};
use trellis_core::calendar::ports::SyncHistoryStore;
use trellis_domain::{
    Result, SyncAction, SyncHistoryEntry, SyncHistoryParams, SyncSource, TrellisError,
};
use uuid::Uuid;

use super::manager::DbPool;
use crate::errors::InfraError;

/// SQLite implementation of SyncHistoryStore
pub struct SqliteSyncHistoryStore {
    pool: DbPool,
}

impl SqliteSyncHistoryStore {
    /// Create a new sync history store
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_history_row(row: &Row<'_>) -> rusqlite::Result<SyncHistoryEntry> {
    let action: String = row.get(3)?;
    let action = action.parse::<SyncAction>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let source: String = row.get(4)?;
    let source = source.parse::<SyncSource>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SyncHistoryEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        event_id: row.get(2)?,
        action,
        source,
        details: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[async_trait]
impl SyncHistoryStore for SqliteSyncHistoryStore {
    #[instrument(skip(self, params), fields(user_id = %params.user_id, action = %params.action.as_str()))]
    async fn append(&self, params: SyncHistoryParams) -> Result<SyncHistoryEntry> {
        let conn = self.pool.get().map_err(|e| TrellisError::from(InfraError::from(e)))?;

        let entry = SyncHistoryEntry {
            id: Uuid::now_v7().to_string(),
            user_id: params.user_id,
            event_id: params.event_id,
            action: params.action,
            source: params.source,
            details: params.details,
            created_at: Utc::now().timestamp(),
        };

        conn.execute(
            "INSERT INTO calendar_sync_history (
                id, user_id, event_id, action, source, details, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            [
                &entry.id as &dyn ToSql,
                &entry.user_id,
                &entry.event_id,
                &entry.action.as_str(),
                &entry.source.as_str(),
                &entry.details,
                &entry.created_at,
            ],
        )
        .map_err(InfraError::from)?;

        debug!(entry_id = %entry.id, "recorded sync history entry");
        Ok(entry)
    }

    #[instrument(skip(self))]
    async fn list(&self, user_id: &str, limit: u32) -> Result<Vec<SyncHistoryEntry>> {
        let conn = self.pool.get().map_err(|e| TrellisError::from(InfraError::from(e)))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, event_id, action, source, details, created_at
                 FROM calendar_sync_history
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(InfraError::from)?;

        let entries = stmt
            .query_map([&user_id as &dyn ToSql, &limit], map_history_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(entries)
    }
}
