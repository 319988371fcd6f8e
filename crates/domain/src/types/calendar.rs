//! Calendar domain types
//!
//! Canonical (provider-agnostic) event representation, stored account
//! tokens, and the sync-history audit types. Provider adapters convert
//! their native API responses into these shapes; everything downstream of
//! an adapter works exclusively with them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::TrellisError;

/// A supported calendar provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProviderKind {
    Google,
    Outlook,
    Apple,
}

impl CalendarProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarProviderKind::Google => "google",
            CalendarProviderKind::Outlook => "outlook",
            CalendarProviderKind::Apple => "apple",
        }
    }

    /// All supported providers, in a stable order.
    pub fn all() -> [CalendarProviderKind; 3] {
        [CalendarProviderKind::Google, CalendarProviderKind::Outlook, CalendarProviderKind::Apple]
    }
}

impl fmt::Display for CalendarProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarProviderKind {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(CalendarProviderKind::Google),
            "outlook" => Ok(CalendarProviderKind::Outlook),
            "apple" => Ok(CalendarProviderKind::Apple),
            other => Err(TrellisError::Validation(format!("unknown provider: {other}"))),
        }
    }
}

/// A stored OAuth credential set authorizing access to one calendar
/// account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarAccountToken {
    pub id: String,
    pub user_id: String,
    pub provider: CalendarProviderKind,
    /// Human-readable account label, usually the account email.
    pub account_label: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub calendar_id: String,
    pub calendar_name: String,
    pub is_primary: bool,
    pub sync_enabled: bool,
    /// Unix timestamp (seconds) at which the access token expires.
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CalendarAccountToken {
    /// Whether the access token is expired at `now` (unix seconds).
    /// Tokens without an expiry are treated as long-lived.
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Parameters for persisting a token obtained from an OAuth callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarAccountTokenParams {
    pub user_id: String,
    pub provider: CalendarProviderKind,
    pub account_label: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub calendar_id: String,
    pub calendar_name: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_sync_enabled")]
    pub sync_enabled: bool,
    pub expires_at: Option<i64>,
}

fn default_sync_enabled() -> bool {
    true
}

/// Result of refreshing an access token with a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRefresh {
    pub access_token: String,
    /// Lifetime of the new token in seconds.
    pub expires_in: i64,
}

/// A calendar event in the canonical, provider-agnostic shape.
///
/// Constructed fresh on every aggregation call and never persisted; the
/// only identity that survives across calls is the provider-native `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Provider-native event id.
    pub id: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// All-day events carry date-only granularity: midnight UTC of the
    /// start date through midnight UTC of the exclusive end date.
    pub is_all_day: bool,
    pub provider: CalendarProviderKind,
    pub calendar_id: String,
    pub calendar_name: String,
}

/// One provider/calendar that failed during an aggregation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarFetchFailure {
    pub provider: CalendarProviderKind,
    pub calendar_id: String,
    pub message: String,
}

/// The aggregator's public contract: whatever succeeded, plus which
/// calendars failed. Partial data is better than no data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedEvents {
    pub events: Vec<CalendarEvent>,
    pub errors: Vec<CalendarFetchFailure>,
}

/// A detected state transition on an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Created,
    Updated,
    Deleted,
    /// Classification tag attached externally when two providers report
    /// what a caller decides is the same logical appointment. Never
    /// computed automatically.
    Conflict,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Created => "created",
            SyncAction::Updated => "updated",
            SyncAction::Deleted => "deleted",
            SyncAction::Conflict => "conflict",
        }
    }
}

impl FromStr for SyncAction {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(SyncAction::Created),
            "updated" => Ok(SyncAction::Updated),
            "deleted" => Ok(SyncAction::Deleted),
            "conflict" => Ok(SyncAction::Conflict),
            other => Err(TrellisError::Validation(format!("unknown sync action: {other}"))),
        }
    }
}

/// Where a sync-history observation originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSource {
    Local,
    Google,
    Outlook,
    Apple,
}

impl SyncSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncSource::Local => "local",
            SyncSource::Google => "google",
            SyncSource::Outlook => "outlook",
            SyncSource::Apple => "apple",
        }
    }
}

impl From<CalendarProviderKind> for SyncSource {
    fn from(kind: CalendarProviderKind) -> Self {
        match kind {
            CalendarProviderKind::Google => SyncSource::Google,
            CalendarProviderKind::Outlook => SyncSource::Outlook,
            CalendarProviderKind::Apple => SyncSource::Apple,
        }
    }
}

impl FromStr for SyncSource {
    type Err = TrellisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(SyncSource::Local),
            "google" => Ok(SyncSource::Google),
            "outlook" => Ok(SyncSource::Outlook),
            "apple" => Ok(SyncSource::Apple),
            other => Err(TrellisError::Validation(format!("unknown sync source: {other}"))),
        }
    }
}

/// One immutable row of the sync-history audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHistoryEntry {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub action: SyncAction,
    pub source: SyncSource,
    pub details: Option<String>,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

/// Parameters for appending a sync-history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncHistoryParams {
    pub user_id: String,
    pub event_id: String,
    pub action: SyncAction,
    pub source: SyncSource,
    pub details: Option<String>,
}

/// Connection status for one connected calendar account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarConnectionStatus {
    pub token_id: String,
    pub provider: CalendarProviderKind,
    pub account_label: String,
    pub calendar_name: String,
    pub is_primary: bool,
    pub sync_enabled: bool,
    pub expires_at: Option<i64>,
}

impl CalendarConnectionStatus {
    /// Builds status entries for a user's tokens. A provider with no
    /// explicit primary presents its first enabled token as primary.
    pub fn from_tokens(tokens: &[CalendarAccountToken]) -> Vec<Self> {
        let mut statuses: Vec<Self> = tokens.iter().map(Self::from).collect();
        for kind in CalendarProviderKind::all() {
            if statuses.iter().any(|s| s.provider == kind && s.is_primary) {
                continue;
            }
            if let Some(first) =
                statuses.iter_mut().find(|s| s.provider == kind && s.sync_enabled)
            {
                first.is_primary = true;
            }
        }
        statuses
    }
}

impl From<&CalendarAccountToken> for CalendarConnectionStatus {
    fn from(token: &CalendarAccountToken) -> Self {
        CalendarConnectionStatus {
            token_id: token.id.clone(),
            provider: token.provider,
            account_label: token.account_label.clone(),
            calendar_name: token.calendar_name.clone(),
            is_primary: token.is_primary,
            sync_enabled: token.sync_enabled,
            expires_at: token.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trips_through_str() {
        for kind in CalendarProviderKind::all() {
            assert_eq!(kind.as_str().parse::<CalendarProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn provider_kind_serializes_lowercase() {
        let json = serde_json::to_string(&CalendarProviderKind::Outlook).unwrap();
        assert_eq!(json, r#""outlook""#);
    }

    #[test]
    fn unknown_provider_is_a_validation_error() {
        let err = "caldav".parse::<CalendarProviderKind>().unwrap_err();
        assert!(matches!(err, TrellisError::Validation(_)));
    }

    #[test]
    fn token_without_expiry_is_long_lived() {
        let token = CalendarAccountToken {
            id: "t1".into(),
            user_id: "u1".into(),
            provider: CalendarProviderKind::Google,
            account_label: "user@example.com".into(),
            access_token: "at".into(),
            refresh_token: None,
            calendar_id: "primary".into(),
            calendar_name: "Primary".into(),
            is_primary: true,
            sync_enabled: true,
            expires_at: None,
            created_at: 0,
            updated_at: 0,
        };
        assert!(!token.is_expired(i64::MAX));
    }

    fn token(id: &str, provider: CalendarProviderKind, sync_enabled: bool) -> CalendarAccountToken {
        CalendarAccountToken {
            id: id.into(),
            user_id: "u1".into(),
            provider,
            account_label: format!("{id}@example.com"),
            access_token: "at".into(),
            refresh_token: None,
            calendar_id: "primary".into(),
            calendar_name: "Primary".into(),
            is_primary: false,
            sync_enabled,
            expires_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn first_enabled_token_stands_in_when_no_primary_exists() {
        let disabled = token("g1", CalendarProviderKind::Google, false);
        let enabled = token("g2", CalendarProviderKind::Google, true);
        let other = token("o1", CalendarProviderKind::Outlook, true);

        let statuses = CalendarConnectionStatus::from_tokens(&[disabled, enabled, other]);
        let primaries: Vec<&str> = statuses
            .iter()
            .filter(|s| s.is_primary)
            .map(|s| s.token_id.as_str())
            .collect();
        assert_eq!(primaries, ["g2", "o1"]);
    }

    #[test]
    fn explicit_primary_is_left_alone() {
        let mut first = token("g1", CalendarProviderKind::Google, true);
        let mut second = token("g2", CalendarProviderKind::Google, true);
        second.is_primary = true;
        first.is_primary = false;

        let statuses = CalendarConnectionStatus::from_tokens(&[first, second]);
        assert!(!statuses[0].is_primary);
        assert!(statuses[1].is_primary);
    }

    #[test]
    fn sync_action_round_trips_through_str() {
        for action in
            [SyncAction::Created, SyncAction::Updated, SyncAction::Deleted, SyncAction::Conflict]
        {
            assert_eq!(action.as_str().parse::<SyncAction>().unwrap(), action);
        }
    }
}
