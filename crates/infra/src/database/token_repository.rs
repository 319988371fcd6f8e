//! SQLite-backed implementation of the TokenStore port.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};
use trellis_core::calendar::ports::TokenStore;
use trellis_domain::{
    CalendarAccountToken, CalendarAccountTokenParams, CalendarProviderKind, Result, TrellisError,
};
use uuid::Uuid;

use super::manager::DbPool;
use crate::errors::InfraError;

const TOKEN_COLUMNS: &str = "id, user_id, provider, account_label, access_token, refresh_token,
        calendar_id, calendar_name, is_primary, sync_enabled, expires_at, created_at, updated_at";

/// SQLite implementation of TokenStore
pub struct SqliteTokenStore {
    pool: DbPool,
}

impl SqliteTokenStore {
    /// Create a new token store
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        self.pool.get().map_err(|e| TrellisError::from(InfraError::from(e)))
    }
}

fn map_token_row(row: &Row<'_>) -> rusqlite::Result<CalendarAccountToken> {
    let provider: String = row.get(2)?;
    let provider = provider.parse::<CalendarProviderKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CalendarAccountToken {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider,
        account_label: row.get(3)?,
        access_token: row.get(4)?,
        refresh_token: row.get(5)?,
        calendar_id: row.get(6)?,
        calendar_name: row.get(7)?,
        is_primary: row.get(8)?,
        sync_enabled: row.get(9)?,
        expires_at: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    #[instrument(skip(self))]
    async fn list_tokens(&self, user_id: &str) -> Result<Vec<CalendarAccountToken>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TOKEN_COLUMNS}
                 FROM calendar_account_tokens
                 WHERE user_id = ?1
                 ORDER BY created_at ASC"
            ))
            .map_err(InfraError::from)?;

        let tokens = stmt
            .query_map([&user_id as &dyn ToSql], map_token_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        debug!(user_id, count = tokens.len(), "listed calendar tokens");
        Ok(tokens)
    }

    #[instrument(skip(self))]
    async fn list_enabled_tokens(&self, user_id: &str) -> Result<Vec<CalendarAccountToken>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {TOKEN_COLUMNS}
                 FROM calendar_account_tokens
                 WHERE user_id = ?1 AND sync_enabled = 1
                 ORDER BY created_at ASC"
            ))
            .map_err(InfraError::from)?;

        let tokens = stmt
            .query_map([&user_id as &dyn ToSql], map_token_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(tokens)
    }

    #[instrument(skip(self))]
    async fn get_token(&self, user_id: &str, token_id: &str) -> Result<CalendarAccountToken> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {TOKEN_COLUMNS}
                 FROM calendar_account_tokens
                 WHERE id = ?1 AND user_id = ?2"
            ),
            [&token_id as &dyn ToSql, &user_id],
            map_token_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                TrellisError::NotFound(format!("calendar account {token_id}"))
            }
            other => InfraError::from(other).into(),
        })
    }

    #[instrument(skip(self, params), fields(user_id = %params.user_id, provider = %params.provider))]
    async fn upsert_token(
        &self,
        params: CalendarAccountTokenParams,
    ) -> Result<CalendarAccountToken> {
        let mut conn = self.conn()?;
        let now = Utc::now().timestamp();
        let id = Uuid::now_v7().to_string();

        let tx = conn.transaction().map_err(InfraError::from)?;

        // At most one primary account per (user, provider).
        if params.is_primary {
            tx.execute(
                "UPDATE calendar_account_tokens SET is_primary = 0, updated_at = ?1
                 WHERE user_id = ?2 AND provider = ?3 AND is_primary = 1",
                [&now as &dyn ToSql, &params.user_id, &params.provider.as_str()],
            )
            .map_err(InfraError::from)?;
        }

        tx.execute(
            "INSERT INTO calendar_account_tokens (
                id, user_id, provider, account_label, access_token, refresh_token,
                calendar_id, calendar_name, is_primary, sync_enabled, expires_at,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
            ON CONFLICT(user_id, provider, calendar_id) DO UPDATE SET
                account_label = excluded.account_label,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                calendar_name = excluded.calendar_name,
                is_primary = excluded.is_primary,
                sync_enabled = excluded.sync_enabled,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            [
                &id as &dyn ToSql,
                &params.user_id,
                &params.provider.as_str(),
                &params.account_label,
                &params.access_token,
                &params.refresh_token,
                &params.calendar_id,
                &params.calendar_name,
                &params.is_primary,
                &params.sync_enabled,
                &params.expires_at,
                &now,
            ],
        )
        .map_err(InfraError::from)?;

        let token = tx
            .query_row(
                &format!(
                    "SELECT {TOKEN_COLUMNS}
                     FROM calendar_account_tokens
                     WHERE user_id = ?1 AND provider = ?2 AND calendar_id = ?3"
                ),
                [&params.user_id as &dyn ToSql, &params.provider.as_str(), &params.calendar_id],
                map_token_row,
            )
            .map_err(InfraError::from)?;

        tx.commit().map_err(InfraError::from)?;

        debug!(token_id = %token.id, "stored calendar token");
        Ok(token)
    }

    #[instrument(skip(self))]
    async fn delete_token(&self, user_id: &str, token_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM calendar_account_tokens WHERE id = ?1 AND user_id = ?2",
                [&token_id as &dyn ToSql, &user_id],
            )
            .map_err(InfraError::from)?;

        if deleted == 0 {
            return Err(TrellisError::NotFound(format!("calendar account {token_id}")));
        }

        debug!(token_id, "deleted calendar token");
        Ok(())
    }

    #[instrument(skip(self, access_token))]
    async fn update_access_token(
        &self,
        token_id: &str,
        access_token: &str,
        expires_at: Option<i64>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();

        let updated = conn
            .execute(
                "UPDATE calendar_account_tokens
                 SET access_token = ?1, expires_at = ?2, updated_at = ?3
                 WHERE id = ?4",
                [&access_token as &dyn ToSql, &expires_at, &now, &token_id],
            )
            .map_err(InfraError::from)?;

        if updated == 0 {
            return Err(TrellisError::NotFound(format!("calendar account {token_id}")));
        }

        Ok(())
    }
}
