//! Google Calendar provider implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracing::warn;
use trellis_core::calendar::ports::CalendarProvider;
use trellis_core::calendar::window::AggregationWindow;
use trellis_domain::constants::{PROVIDER_MAX_PAGES, PROVIDER_PAGE_SIZE};
use trellis_domain::{
    CalendarAccountToken, CalendarEvent, CalendarProviderKind, OAuthClientConfig, Result,
    TokenRefresh, TrellisError,
};

use super::error_body;
use crate::http::HttpClient;

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Google Calendar REST adapter
pub struct GoogleCalendarProvider {
    http: HttpClient,
    base_url: String,
    token_url: String,
    oauth: Option<OAuthClientConfig>,
}

impl GoogleCalendarProvider {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            oauth: None,
        }
    }

    /// Attach the OAuth application credentials used for token refresh.
    pub fn with_oauth(mut self, oauth: OAuthClientConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    /// Point the OAuth token endpoint elsewhere (used by tests).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    async fn fetch_page(
        &self,
        token: &CalendarAccountToken,
        window: &AggregationWindow,
        page_token: Option<&str>,
    ) -> Result<GoogleEventsResponse> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&token.calendar_id)
        );

        let mut query: Vec<(&str, String)> = vec![
            ("timeMin", window.start().to_rfc3339()),
            ("timeMax", window.end().to_rfc3339()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
            ("maxResults", PROVIDER_PAGE_SIZE.to_string()),
        ];
        if let Some(page) = page_token {
            query.push(("pageToken", page.to_string()));
        }

        let request = self
            .http
            .request(Method::GET, &url)
            .bearer_auth(&token.access_token)
            .query(&query);

        let response = self.http.send(request).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            let (status, body) = error_body(response).await;
            return Err(TrellisError::Auth(format!(
                "Google rejected credentials ({status}): {body}"
            )));
        }
        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(TrellisError::ProviderFetch {
                provider: CalendarProviderKind::Google,
                status: Some(status),
                message: format!("unexpected status {status}: {body}"),
            });
        }

        response.json::<GoogleEventsResponse>().await.map_err(|e| {
            TrellisError::ProviderFetch {
                provider: CalendarProviderKind::Google,
                status: None,
                message: format!("failed to parse events response: {e}"),
            }
        })
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::Google
    }

    async fn fetch_events(
        &self,
        token: &CalendarAccountToken,
        window: &AggregationWindow,
    ) -> Result<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..PROVIDER_MAX_PAGES {
            let page = self.fetch_page(token, window, page_token.as_deref()).await?;

            for item in page.items {
                match convert_event(item, token) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        warn!(calendar_id = %token.calendar_id, error = %err, "skipping malformed Google event");
                    }
                }
            }

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => return Ok(events),
            }
        }

        warn!(calendar_id = %token.calendar_id, "Google pagination cap reached, returning partial page set");
        Ok(events)
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenRefresh> {
        let oauth = self.oauth.as_ref().ok_or_else(|| {
            TrellisError::Auth("Google OAuth client credentials are not configured".into())
        })?;

        let request = self.http.request(Method::POST, &self.token_url).form(&[
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ]);

        let response = self.http.send(request).await?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(TrellisError::Auth(format!("Google token refresh failed ({status}): {body}")));
        }

        let refreshed: GoogleTokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| TrellisError::Auth(format!("failed to parse token response: {e}")))?;

        Ok(TokenRefresh {
            access_token: refreshed.access_token,
            expires_in: refreshed.expires_in,
        })
    }
}

fn convert_event(item: GoogleCalendarEvent, token: &CalendarAccountToken) -> Result<CalendarEvent> {
    let is_all_day = item.start.date.is_some();
    let start_time = parse_event_time(&item.start, &item.id)?;
    let end_time = parse_event_time(&item.end, &item.id)?;

    Ok(CalendarEvent {
        id: item.id,
        summary: item
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "(No title)".to_string()),
        description: item.description,
        location: item.location,
        start_time,
        end_time,
        is_all_day,
        provider: CalendarProviderKind::Google,
        calendar_id: token.calendar_id.clone(),
        calendar_name: token.calendar_name.clone(),
    })
}

/// Google sends `dateTime` (RFC 3339) for timed events and `date`
/// (YYYY-MM-DD) for all-day events. All-day boundaries land on midnight UTC.
fn parse_event_time(value: &EventDateTime, event_id: &str) -> Result<DateTime<Utc>> {
    if let Some(date_time) = &value.date_time {
        return DateTime::parse_from_rfc3339(date_time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                TrellisError::ProviderFetch {
                    provider: CalendarProviderKind::Google,
                    status: None,
                    message: format!("event {event_id} has invalid dateTime {date_time}: {e}"),
                }
            });
    }
    if let Some(date) = &value.date {
        return date
            .parse::<NaiveDate>()
            .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
            .map_err(|e| {
                TrellisError::ProviderFetch {
                    provider: CalendarProviderKind::Google,
                    status: None,
                    message: format!("event {event_id} has invalid date {date}: {e}"),
                }
            });
    }
    Err(TrellisError::ProviderFetch {
        provider: CalendarProviderKind::Google,
        status: None,
        message: format!("event {event_id} has neither dateTime nor date"),
    })
}

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleCalendarEvent>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleCalendarEvent {
    id: String,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: EventDateTime,
    end: EventDateTime,
}

#[derive(Debug, Deserialize)]
struct EventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenRefreshResponse {
    access_token: String,
    expires_in: i64,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn token() -> CalendarAccountToken {
        CalendarAccountToken {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            provider: CalendarProviderKind::Google,
            account_label: "user@example.com".to_string(),
            access_token: "at-1".to_string(),
            refresh_token: Some("rt-1".to_string()),
            calendar_id: "primary".to_string(),
            calendar_name: "Primary".to_string(),
            is_primary: true,
            sync_enabled: true,
            expires_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn window() -> AggregationWindow {
        AggregationWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn provider(server: &MockServer) -> GoogleCalendarProvider {
        let http = HttpClient::builder().build().expect("http client");
        GoogleCalendarProvider::new(http, server.uri())
            .with_token_url(format!("{}/token", server.uri()))
    }

    #[tokio::test]
    async fn fetch_converts_timed_and_all_day_events() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("singleEvents", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {
                        "id": "evt-1",
                        "summary": "Site inspection",
                        "location": "Lot 14",
                        "start": { "dateTime": "2025-03-10T10:00:00Z" },
                        "end": { "dateTime": "2025-03-10T11:00:00Z" }
                    },
                    {
                        "id": "evt-2",
                        "summary": "Concrete pour",
                        "start": { "date": "2025-03-10" },
                        "end": { "date": "2025-03-11" }
                    }
                ]
            })))
            .mount(&server)
            .await;

        let events = provider(&server).fetch_events(&token(), &window()).await.unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "evt-1");
        assert!(!events[0].is_all_day);
        assert_eq!(events[0].start_time, Utc.with_ymd_and_hms(2025, 3, 10, 10, 0, 0).unwrap());
        assert_eq!(events[0].location.as_deref(), Some("Lot 14"));

        assert!(events[1].is_all_day);
        assert_eq!(events[1].start_time, Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(events[1].end_time, Utc.with_ymd_and_hms(2025, 3, 11, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn fetch_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "evt-2",
                    "summary": "Second",
                    "start": { "dateTime": "2025-03-10T14:00:00Z" },
                    "end": { "dateTime": "2025-03-10T15:00:00Z" }
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "evt-1",
                    "summary": "First",
                    "start": { "dateTime": "2025-03-10T10:00:00Z" },
                    "end": { "dateTime": "2025-03-10T11:00:00Z" }
                }],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;

        let events = provider(&server).fetch_events(&token(), &window()).await.unwrap();
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["evt-1", "evt-2"]);
    }

    #[tokio::test]
    async fn server_error_maps_to_provider_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = provider(&server).fetch_events(&token(), &window()).await.unwrap_err();
        match err {
            TrellisError::ProviderFetch { provider, status, .. } => {
                assert_eq!(provider, CalendarProviderKind::Google);
                assert_eq!(status, Some(500));
            }
            other => panic!("expected provider fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider(&server).fetch_events(&token(), &window()).await.unwrap_err();
        assert!(matches!(err, TrellisError::Auth(_)));
    }

    #[test]
    fn missing_times_are_rejected() {
        let value = EventDateTime { date_time: None, date: None };
        assert!(parse_event_time(&value, "evt").is_err());
    }

    #[tokio::test]
    async fn refresh_exchanges_the_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .and(body_string_contains("client_id=cid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "at-2",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let oauth =
            OAuthClientConfig { client_id: "cid".into(), client_secret: "shhh".into() };
        let refreshed =
            provider(&server).with_oauth(oauth).refresh_access_token("rt-1").await.unwrap();

        assert_eq!(refreshed.access_token, "at-2");
        assert_eq!(refreshed.expires_in, 3599);
    }

    #[tokio::test]
    async fn refresh_without_oauth_credentials_is_an_auth_error() {
        let server = MockServer::start().await;
        let err = provider(&server).refresh_access_token("rt-1").await.unwrap_err();
        assert!(matches!(err, TrellisError::Auth(_)));
    }

    #[tokio::test]
    async fn rejected_refresh_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let oauth =
            OAuthClientConfig { client_id: "cid".into(), client_secret: "shhh".into() };
        let err = provider(&server)
            .with_oauth(oauth)
            .refresh_access_token("revoked")
            .await
            .unwrap_err();
        assert!(matches!(err, TrellisError::Auth(_)));
    }
}
