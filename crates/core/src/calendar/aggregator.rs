//! Unified calendar aggregation service - core business logic

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{instrument, warn};
use trellis_domain::constants::PROVIDER_FETCH_TIMEOUT_SECS;
use trellis_domain::{
    CalendarAccountToken, CalendarEvent, CalendarFetchFailure, Result, TrellisError, UnifiedEvents,
};

use super::ports::{ProviderRegistry, TokenStore};
use super::window::AggregationWindow;

/// Fans one aggregation call out to every sync-enabled account of a user
/// and merges the results into a single sorted timeline.
///
/// Failures are isolated per account: one provider being down, slow, or
/// rejecting a token never suppresses the events the other accounts
/// returned. Callers get whatever succeeded plus a failure entry for each
/// calendar that did not.
pub struct UnifiedCalendarService {
    tokens: Arc<dyn TokenStore>,
    registry: Arc<dyn ProviderRegistry>,
    fetch_timeout: Duration,
}

impl UnifiedCalendarService {
    pub fn new(tokens: Arc<dyn TokenStore>, registry: Arc<dyn ProviderRegistry>) -> Self {
        Self { tokens, registry, fetch_timeout: Duration::from_secs(PROVIDER_FETCH_TIMEOUT_SECS) }
    }

    /// Override the per-account fetch budget.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Fetch and merge events from all of the user's enabled accounts.
    ///
    /// Events from different providers are never deduplicated; two
    /// providers reporting the same meeting yield two entries. The merged
    /// list is ordered by start time, with (provider, event id) breaking
    /// ties so equal-start events come back in a stable order.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn unified_events(
        &self,
        user_id: &str,
        window: &AggregationWindow,
    ) -> Result<UnifiedEvents> {
        if user_id.trim().is_empty() {
            return Err(TrellisError::Validation("user_id must not be empty".to_string()));
        }

        let tokens = self.tokens.list_enabled_tokens(user_id).await?;
        if tokens.is_empty() {
            return Ok(UnifiedEvents::default());
        }

        let fetches = tokens.iter().map(|token| self.fetch_one(token, window));
        let outcomes = join_all(fetches).await;

        let mut unified = UnifiedEvents::default();
        for (token, outcome) in tokens.iter().zip(outcomes) {
            match outcome {
                Ok(events) => unified.events.extend(events),
                Err(err) => {
                    warn!(
                        provider = %token.provider,
                        calendar_id = %token.calendar_id,
                        error = %err,
                        "calendar fetch failed, continuing with remaining accounts"
                    );
                    unified.errors.push(CalendarFetchFailure {
                        provider: token.provider,
                        calendar_id: token.calendar_id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        unified
            .events
            .sort_by(|a, b| {
                a.start_time
                    .cmp(&b.start_time)
                    .then_with(|| a.provider.as_str().cmp(b.provider.as_str()))
                    .then_with(|| a.id.cmp(&b.id))
            });

        Ok(unified)
    }

    async fn fetch_one(
        &self,
        token: &CalendarAccountToken,
        window: &AggregationWindow,
    ) -> Result<Vec<CalendarEvent>> {
        let provider = self.registry.provider_for(token.provider).ok_or_else(|| {
            TrellisError::Internal(format!("no adapter registered for {}", token.provider))
        })?;

        match tokio::time::timeout(self.fetch_timeout, provider.fetch_events(token, window)).await {
            Ok(result) => result,
            Err(_) => Err(TrellisError::Network(format!(
                "{} fetch timed out after {}s",
                token.provider,
                self.fetch_timeout.as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use trellis_domain::{CalendarAccountTokenParams, CalendarProviderKind, TokenRefresh};

    use super::*;
    use crate::calendar::ports::CalendarProvider;

    struct FixedTokenStore {
        tokens: Vec<CalendarAccountToken>,
    }

    #[async_trait]
    impl TokenStore for FixedTokenStore {
        async fn list_tokens(&self, _user_id: &str) -> Result<Vec<CalendarAccountToken>> {
            Ok(self.tokens.clone())
        }

        async fn list_enabled_tokens(&self, _user_id: &str) -> Result<Vec<CalendarAccountToken>> {
            Ok(self.tokens.iter().filter(|t| t.sync_enabled).cloned().collect())
        }

        async fn get_token(&self, _user_id: &str, token_id: &str) -> Result<CalendarAccountToken> {
            self.tokens
                .iter()
                .find(|t| t.id == token_id)
                .cloned()
                .ok_or_else(|| TrellisError::NotFound(token_id.to_string()))
        }

        async fn upsert_token(
            &self,
            _params: CalendarAccountTokenParams,
        ) -> Result<CalendarAccountToken> {
            unimplemented!("not used by aggregation tests")
        }

        async fn delete_token(&self, _user_id: &str, _token_id: &str) -> Result<()> {
            unimplemented!("not used by aggregation tests")
        }

        async fn update_access_token(
            &self,
            _token_id: &str,
            _access_token: &str,
            _expires_at: Option<i64>,
        ) -> Result<()> {
            unimplemented!("not used by aggregation tests")
        }
    }

    struct ScriptedProvider {
        kind: CalendarProviderKind,
        outcome: Result<Vec<CalendarEvent>>,
    }

    #[async_trait]
    impl CalendarProvider for ScriptedProvider {
        fn kind(&self) -> CalendarProviderKind {
            self.kind
        }

        async fn fetch_events(
            &self,
            _token: &CalendarAccountToken,
            _window: &AggregationWindow,
        ) -> Result<Vec<CalendarEvent>> {
            self.outcome.clone()
        }

        async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenRefresh> {
            unimplemented!("not used by aggregation tests")
        }
    }

    struct MapRegistry {
        providers: HashMap<CalendarProviderKind, Arc<dyn CalendarProvider>>,
    }

    impl ProviderRegistry for MapRegistry {
        fn provider_for(&self, kind: CalendarProviderKind) -> Option<Arc<dyn CalendarProvider>> {
            self.providers.get(&kind).cloned()
        }
    }

    fn token(id: &str, provider: CalendarProviderKind) -> CalendarAccountToken {
        CalendarAccountToken {
            id: id.to_string(),
            user_id: "u1".to_string(),
            provider,
            account_label: format!("{id}@example.com"),
            access_token: "at".to_string(),
            refresh_token: None,
            calendar_id: format!("cal-{id}"),
            calendar_name: "Work".to_string(),
            is_primary: false,
            sync_enabled: true,
            expires_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn event(id: &str, provider: CalendarProviderKind, hour: u32) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            summary: format!("Event {id}"),
            description: None,
            location: None,
            start_time: Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 3, 10, hour + 1, 0, 0).unwrap(),
            is_all_day: false,
            provider,
            calendar_id: "cal".to_string(),
            calendar_name: "Work".to_string(),
        }
    }

    fn window() -> AggregationWindow {
        AggregationWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn service(
        tokens: Vec<CalendarAccountToken>,
        providers: Vec<ScriptedProvider>,
    ) -> UnifiedCalendarService {
        let registry = MapRegistry {
            providers: providers
                .into_iter()
                .map(|p| (p.kind, Arc::new(p) as Arc<dyn CalendarProvider>))
                .collect(),
        };
        UnifiedCalendarService::new(
            Arc::new(FixedTokenStore { tokens }),
            Arc::new(registry),
        )
    }

    #[tokio::test]
    async fn merges_providers_into_chronological_order() {
        let svc = service(
            vec![
                token("g", CalendarProviderKind::Google),
                token("o", CalendarProviderKind::Outlook),
            ],
            vec![
                ScriptedProvider {
                    kind: CalendarProviderKind::Google,
                    outcome: Ok(vec![
                        event("A", CalendarProviderKind::Google, 10),
                        event("B", CalendarProviderKind::Google, 14),
                    ]),
                },
                ScriptedProvider {
                    kind: CalendarProviderKind::Outlook,
                    outcome: Ok(vec![event("C", CalendarProviderKind::Outlook, 9)]),
                },
            ],
        );

        let unified = svc.unified_events("u1", &window()).await.unwrap();
        let ids: Vec<&str> = unified.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["C", "A", "B"]);
        assert!(unified.errors.is_empty());
    }

    #[tokio::test]
    async fn one_failing_provider_does_not_suppress_the_rest() {
        let svc = service(
            vec![
                token("g", CalendarProviderKind::Google),
                token("o", CalendarProviderKind::Outlook),
            ],
            vec![
                ScriptedProvider {
                    kind: CalendarProviderKind::Google,
                    outcome: Err(TrellisError::ProviderFetch {
                        provider: CalendarProviderKind::Google,
                        status: Some(500),
                        message: "internal error".to_string(),
                    }),
                },
                ScriptedProvider {
                    kind: CalendarProviderKind::Outlook,
                    outcome: Ok(vec![event("C", CalendarProviderKind::Outlook, 9)]),
                },
            ],
        );

        let unified = svc.unified_events("u1", &window()).await.unwrap();
        assert_eq!(unified.events.len(), 1);
        assert_eq!(unified.events[0].id, "C");
        assert_eq!(unified.errors.len(), 1);
        assert_eq!(unified.errors[0].provider, CalendarProviderKind::Google);
        assert_eq!(unified.errors[0].calendar_id, "cal-g");
    }

    struct StalledProvider {
        kind: CalendarProviderKind,
    }

    #[async_trait]
    impl CalendarProvider for StalledProvider {
        fn kind(&self) -> CalendarProviderKind {
            self.kind
        }

        async fn fetch_events(
            &self,
            _token: &CalendarAccountToken,
            _window: &AggregationWindow,
        ) -> Result<Vec<CalendarEvent>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![])
        }

        async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenRefresh> {
            unimplemented!("not used by aggregation tests")
        }
    }

    #[tokio::test]
    async fn stalled_provider_times_out_into_a_fetch_failure() {
        let mut providers: HashMap<CalendarProviderKind, Arc<dyn CalendarProvider>> =
            HashMap::new();
        providers.insert(
            CalendarProviderKind::Apple,
            Arc::new(StalledProvider { kind: CalendarProviderKind::Apple }),
        );
        providers.insert(
            CalendarProviderKind::Outlook,
            Arc::new(ScriptedProvider {
                kind: CalendarProviderKind::Outlook,
                outcome: Ok(vec![event("C", CalendarProviderKind::Outlook, 9)]),
            }),
        );

        let svc = UnifiedCalendarService::new(
            Arc::new(FixedTokenStore {
                tokens: vec![
                    token("a", CalendarProviderKind::Apple),
                    token("o", CalendarProviderKind::Outlook),
                ],
            }),
            Arc::new(MapRegistry { providers }),
        )
        .with_fetch_timeout(Duration::from_millis(50));

        let unified = svc.unified_events("u1", &window()).await.unwrap();
        assert_eq!(unified.events.len(), 1);
        assert_eq!(unified.events[0].id, "C");
        assert_eq!(unified.errors.len(), 1);
        assert_eq!(unified.errors[0].provider, CalendarProviderKind::Apple);
        assert_eq!(unified.errors[0].calendar_id, "cal-a");
        assert!(unified.errors[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn no_connected_accounts_yields_empty_result() {
        let svc = service(vec![], vec![]);
        let unified = svc.unified_events("u1", &window()).await.unwrap();
        assert!(unified.events.is_empty());
        assert!(unified.errors.is_empty());
    }

    #[tokio::test]
    async fn identical_event_ids_across_providers_are_kept() {
        let svc = service(
            vec![
                token("g", CalendarProviderKind::Google),
                token("o", CalendarProviderKind::Outlook),
            ],
            vec![
                ScriptedProvider {
                    kind: CalendarProviderKind::Google,
                    outcome: Ok(vec![event("shared", CalendarProviderKind::Google, 10)]),
                },
                ScriptedProvider {
                    kind: CalendarProviderKind::Outlook,
                    outcome: Ok(vec![event("shared", CalendarProviderKind::Outlook, 10)]),
                },
            ],
        );

        let unified = svc.unified_events("u1", &window()).await.unwrap();
        assert_eq!(unified.events.len(), 2);
        // Equal start times fall back to provider ordering.
        assert_eq!(unified.events[0].provider, CalendarProviderKind::Google);
        assert_eq!(unified.events[1].provider, CalendarProviderKind::Outlook);
    }

    #[tokio::test]
    async fn disabled_accounts_are_skipped() {
        let mut disabled = token("g", CalendarProviderKind::Google);
        disabled.sync_enabled = false;
        let svc = service(
            vec![disabled, token("o", CalendarProviderKind::Outlook)],
            vec![
                ScriptedProvider {
                    kind: CalendarProviderKind::Google,
                    outcome: Ok(vec![event("A", CalendarProviderKind::Google, 10)]),
                },
                ScriptedProvider {
                    kind: CalendarProviderKind::Outlook,
                    outcome: Ok(vec![event("C", CalendarProviderKind::Outlook, 9)]),
                },
            ],
        );

        let unified = svc.unified_events("u1", &window()).await.unwrap();
        let ids: Vec<&str> = unified.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["C"]);
    }

    #[tokio::test]
    async fn blank_user_id_fails_before_any_fetch() {
        let svc = service(vec![token("g", CalendarProviderKind::Google)], vec![]);
        let err = svc.unified_events("  ", &window()).await.unwrap_err();
        assert!(matches!(err, TrellisError::Validation(_)));
    }
}
