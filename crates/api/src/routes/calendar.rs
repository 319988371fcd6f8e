//! Calendar endpoints
//!
//! All routes are scoped under a user id; the service trusts the caller's
//! identity layer to have resolved it.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use trellis_core::AggregationWindow;
use trellis_domain::{
    CalendarAccountTokenParams, CalendarConnectionStatus, CalendarProviderKind, SyncAction,
    SyncHistoryEntry, SyncHistoryParams, SyncSource, UnifiedEvents,
};

use super::ApiError;
use crate::context::AppContext;

pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/users/{user_id}/calendar/events", get(unified_events))
        .route("/users/{user_id}/calendar/accounts", get(list_accounts))
        .route("/users/{user_id}/calendar/accounts", post(connect_account))
        .route("/users/{user_id}/calendar/accounts/{token_id}", delete(disconnect_account))
        .route("/users/{user_id}/calendar/accounts/{token_id}/refresh", post(refresh_account))
        .route("/users/{user_id}/calendar/sync-history", get(list_sync_history))
        .route("/users/{user_id}/calendar/sync-history", post(record_sync_history))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// GET /users/{user_id}/calendar/events?start&end
///
/// Merged timeline across every enabled account, with per-calendar
/// failures reported alongside whatever succeeded.
async fn unified_events(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<UnifiedEvents>, ApiError> {
    let window = AggregationWindow::new(query.start, query.end)?;
    let unified = ctx.unified_calendar.unified_events(&user_id, &window).await?;
    Ok(Json(unified))
}

/// GET /users/{user_id}/calendar/accounts
async fn list_accounts(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<CalendarConnectionStatus>>, ApiError> {
    let tokens = ctx.tokens.list_tokens(&user_id).await?;
    Ok(Json(CalendarConnectionStatus::from_tokens(&tokens)))
}

/// Request body for connecting a calendar account. Credentials come from
/// the caller's completed OAuth flow (or an app-specific password for
/// CalDAV accounts).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectAccountRequest {
    provider: CalendarProviderKind,
    account_label: String,
    access_token: String,
    refresh_token: Option<String>,
    calendar_id: String,
    calendar_name: String,
    #[serde(default)]
    is_primary: bool,
    #[serde(default = "default_true")]
    sync_enabled: bool,
    expires_at: Option<i64>,
}

fn default_true() -> bool {
    true
}

/// POST /users/{user_id}/calendar/accounts
async fn connect_account(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
    Json(body): Json<ConnectAccountRequest>,
) -> Result<(StatusCode, Json<CalendarConnectionStatus>), ApiError> {
    let params = CalendarAccountTokenParams {
        user_id,
        provider: body.provider,
        account_label: body.account_label,
        access_token: body.access_token,
        refresh_token: body.refresh_token,
        calendar_id: body.calendar_id,
        calendar_name: body.calendar_name,
        is_primary: body.is_primary,
        sync_enabled: body.sync_enabled,
        expires_at: body.expires_at,
    };

    let token = ctx.tokens.upsert_token(params).await?;
    Ok((StatusCode::CREATED, Json(CalendarConnectionStatus::from(&token))))
}

/// DELETE /users/{user_id}/calendar/accounts/{token_id}
async fn disconnect_account(
    State(ctx): State<Arc<AppContext>>,
    Path((user_id, token_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    ctx.tokens.delete_token(&user_id, &token_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/{user_id}/calendar/accounts/{token_id}/refresh
async fn refresh_account(
    State(ctx): State<Arc<AppContext>>,
    Path((user_id, token_id)): Path<(String, String)>,
) -> Result<Json<CalendarConnectionStatus>, ApiError> {
    let token = ctx.token_refresh.refresh(&user_id, &token_id).await?;
    Ok(Json(CalendarConnectionStatus::from(&token)))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

/// GET /users/{user_id}/calendar/sync-history?limit
async fn list_sync_history(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SyncHistoryEntry>>, ApiError> {
    let entries = ctx.sync_history.recent(&user_id, query.limit).await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSyncHistoryRequest {
    event_id: String,
    action: SyncAction,
    source: SyncSource,
    details: Option<String>,
}

/// POST /users/{user_id}/calendar/sync-history
async fn record_sync_history(
    State(ctx): State<Arc<AppContext>>,
    Path(user_id): Path<String>,
    Json(body): Json<RecordSyncHistoryRequest>,
) -> Result<(StatusCode, Json<SyncHistoryEntry>), ApiError> {
    let entry = ctx
        .sync_history
        .record(SyncHistoryParams {
            user_id,
            event_id: body.event_id,
            action: body.action,
            source: body.source,
            details: body.details,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
