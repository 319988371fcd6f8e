//! Microsoft Graph (Outlook) provider implementation

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
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

const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const OUTLOOK_TIMEZONE_HEADER: &str = r#"outlook.timezone="UTC""#;

/// Microsoft Graph calendarView adapter
pub struct OutlookCalendarProvider {
    http: HttpClient,
    base_url: String,
    token_url: String,
    oauth: Option<OAuthClientConfig>,
}

impl OutlookCalendarProvider {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token_url: MICROSOFT_TOKEN_URL.to_string(),
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

    fn first_page_url(&self, token: &CalendarAccountToken) -> String {
        if token.calendar_id.eq_ignore_ascii_case("primary") {
            format!("{}/me/calendarView", self.base_url)
        } else {
            format!(
                "{}/me/calendars/{}/calendarView",
                self.base_url,
                urlencoding::encode(&token.calendar_id)
            )
        }
    }

    async fn fetch_page(
        &self,
        token: &CalendarAccountToken,
        url: &str,
        window: Option<&AggregationWindow>,
    ) -> Result<MicrosoftEventsResponse> {
        let mut request = self
            .http
            .request(Method::GET, url)
            .bearer_auth(&token.access_token)
            .header("Prefer", OUTLOOK_TIMEZONE_HEADER);

        // @odata.nextLink URLs already carry the query string.
        if let Some(window) = window {
            request = request.query(&[
                ("startDateTime", window.start().to_rfc3339()),
                ("endDateTime", window.end().to_rfc3339()),
                ("$top", PROVIDER_PAGE_SIZE.to_string()),
                ("$orderby", "start/dateTime".to_string()),
            ]);
        }

        let response = self.http.send(request).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            let (status, body) = error_body(response).await;
            return Err(TrellisError::Auth(format!(
                "Microsoft rejected credentials ({status}): {body}"
            )));
        }
        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(TrellisError::ProviderFetch {
                provider: CalendarProviderKind::Outlook,
                status: Some(status),
                message: format!("unexpected status {status}: {body}"),
            });
        }

        response.json::<MicrosoftEventsResponse>().await.map_err(|e| {
            TrellisError::ProviderFetch {
                provider: CalendarProviderKind::Outlook,
                status: None,
                message: format!("failed to parse events response: {e}"),
            }
        })
    }
}

#[async_trait]
impl CalendarProvider for OutlookCalendarProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::Outlook
    }

    async fn fetch_events(
        &self,
        token: &CalendarAccountToken,
        window: &AggregationWindow,
    ) -> Result<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut next: Option<String> = None;

        for _ in 0..PROVIDER_MAX_PAGES {
            let response = match &next {
                Some(url) => self.fetch_page(token, url, None).await?,
                None => self.fetch_page(token, &self.first_page_url(token), Some(window)).await?,
            };

            for item in response.value {
                match convert_event(item, token) {
                    Ok(event) => events.push(event),
                    Err(err) => {
                        warn!(calendar_id = %token.calendar_id, error = %err, "skipping malformed Outlook event");
                    }
                }
            }

            match response.next_link {
                Some(link) => next = Some(link),
                None => return Ok(events),
            }
        }

        warn!(calendar_id = %token.calendar_id, "Outlook pagination cap reached, returning partial page set");
        Ok(events)
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenRefresh> {
        let oauth = self.oauth.as_ref().ok_or_else(|| {
            TrellisError::Auth("Microsoft OAuth client credentials are not configured".into())
        })?;

        let request = self.http.request(Method::POST, &self.token_url).form(&[
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
            ("scope", "Calendars.Read offline_access"),
        ]);

        let response = self.http.send(request).await?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(TrellisError::Auth(format!(
                "Microsoft token refresh failed ({status}): {body}"
            )));
        }

        let refreshed: MicrosoftTokenRefreshResponse = response
            .json()
            .await
            .map_err(|e| TrellisError::Auth(format!("failed to parse token response: {e}")))?;

        Ok(TokenRefresh {
            access_token: refreshed.access_token,
            expires_in: refreshed.expires_in,
        })
    }
}

fn convert_event(
    item: MicrosoftCalendarEvent,
    token: &CalendarAccountToken,
) -> Result<CalendarEvent> {
    let start_time = parse_event_time(&item.start, &item.id)?;
    let end_time = parse_event_time(&item.end, &item.id)?;

    Ok(CalendarEvent {
        id: item.id,
        summary: item
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "(No title)".to_string()),
        description: item.body_preview.filter(|s| !s.trim().is_empty()),
        location: item.location.and_then(|l| l.display_name).filter(|s| !s.trim().is_empty()),
        start_time,
        end_time,
        is_all_day: item.is_all_day,
        provider: CalendarProviderKind::Outlook,
        calendar_id: token.calendar_id.clone(),
        calendar_name: token.calendar_name.clone(),
    })
}

/// Graph returns `dateTime` without a zone designator plus a `timeZone`
/// field. The Prefer header pins responses to UTC, so anything else on the
/// wire is unexpected and rejected rather than silently misread.
fn parse_event_time(value: &EventDateTime, event_id: &str) -> Result<DateTime<Utc>> {
    let tz_is_utc =
        value.time_zone.as_deref().map(|tz| tz.eq_ignore_ascii_case("utc")).unwrap_or(true);
    if !tz_is_utc {
        return Err(TrellisError::ProviderFetch {
            provider: CalendarProviderKind::Outlook,
            status: None,
            message: format!(
                "event {event_id} returned non-UTC timezone {:?}",
                value.time_zone
            ),
        });
    }

    let raw = value.date_time.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|dt| dt.and_utc())
        .map_err(|e| TrellisError::ProviderFetch {
            provider: CalendarProviderKind::Outlook,
            status: None,
            message: format!("event {event_id} has invalid dateTime {}: {e}", value.date_time),
        })
}

#[derive(Debug, Deserialize)]
struct MicrosoftEventsResponse {
    #[serde(default)]
    value: Vec<MicrosoftCalendarEvent>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MicrosoftCalendarEvent {
    id: String,
    subject: Option<String>,
    #[serde(rename = "bodyPreview")]
    body_preview: Option<String>,
    location: Option<Location>,
    start: EventDateTime,
    end: EventDateTime,
    #[serde(rename = "isAllDay", default)]
    is_all_day: bool,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventDateTime {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MicrosoftTokenRefreshResponse {
    access_token: String,
    expires_in: i64,
}
