//! Apple iCloud CalDAV provider implementation
//!
//! Apple has no event REST API; events come back as a WebDAV multistatus
//! document wrapping ICS payloads. The adapter issues a calendar-query
//! REPORT with a server-side time-range filter and parses each returned
//! VEVENT into the canonical shape.
//!
//! Credentials are iCloud app-specific passwords sent as HTTP basic auth,
//! with the account email as the username.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use icalendar::parser::{read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};
use reqwest::Method;
use tracing::warn;
use trellis_core::calendar::ports::CalendarProvider;
use trellis_core::calendar::window::AggregationWindow;
use trellis_domain::{
    CalendarAccountToken, CalendarEvent, CalendarProviderKind, Result, TokenRefresh, TrellisError,
};

use super::error_body;
use crate::http::HttpClient;

/// Apple CalDAV adapter
pub struct AppleCalendarProvider {
    http: HttpClient,
    base_url: String,
}

impl AppleCalendarProvider {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    fn collection_url(&self, calendar_id: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let href = calendar_id.trim_start_matches('/');
        format!("{base}/{href}")
    }
}

#[async_trait]
impl CalendarProvider for AppleCalendarProvider {
    fn kind(&self) -> CalendarProviderKind {
        CalendarProviderKind::Apple
    }

    async fn fetch_events(
        &self,
        token: &CalendarAccountToken,
        window: &AggregationWindow,
    ) -> Result<Vec<CalendarEvent>> {
        let body = calendar_query_body(window);
        let report = Method::from_bytes(b"REPORT")
            .map_err(|e| TrellisError::Internal(format!("invalid HTTP method: {e}")))?;

        let request = self
            .http
            .request(report, self.collection_url(&token.calendar_id))
            .basic_auth(&token.account_label, Some(&token.access_token))
            .header("Depth", "1")
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body);

        let response = self.http.send(request).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            let (status, body) = error_body(response).await;
            return Err(TrellisError::Auth(format!(
                "CalDAV server rejected credentials ({status}): {body}"
            )));
        }
        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            return Err(TrellisError::ProviderFetch {
                provider: CalendarProviderKind::Apple,
                status: Some(status),
                message: format!("unexpected status {status}: {body}"),
            });
        }

        let text = response.text().await.map_err(|e| TrellisError::ProviderFetch {
            provider: CalendarProviderKind::Apple,
            status: None,
            message: format!("failed to read multistatus body: {e}"),
        })?;

        let mut events = Vec::new();
        for ics in parse_multistatus_calendar_data(&text)? {
            match parse_ics_event(&ics, token) {
                Some(event) => events.push(event),
                None => {
                    warn!(calendar_id = %token.calendar_id, "skipping unparseable ICS resource");
                }
            }
        }

        Ok(events)
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> Result<TokenRefresh> {
        Err(TrellisError::Auth(
            "CalDAV accounts use app-specific passwords; reconnect the account instead of refreshing"
                .into(),
        ))
    }
}

/// CalDAV timestamps are compact UTC: `YYYYMMDDTHHMMSSZ`.
fn format_caldav_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn calendar_query_body(window: &AggregationWindow) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<C:calendar-query xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <prop>
        <getetag/>
        <C:calendar-data/>
    </prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:time-range start="{}" end="{}"/>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#,
        format_caldav_datetime(window.start()),
        format_caldav_datetime(window.end())
    )
}

/// Extract every `calendar-data` payload from a multistatus response.
fn parse_multistatus_calendar_data(body: &str) -> Result<Vec<String>> {
    let doc = roxmltree::Document::parse(body).map_err(|e| TrellisError::ProviderFetch {
        provider: CalendarProviderKind::Apple,
        status: None,
        message: format!("invalid multistatus XML: {e}"),
    })?;

    let mut payloads = Vec::new();
    for response in
        doc.root_element().descendants().filter(|n| n.tag_name().name() == "response")
    {
        let data = response
            .descendants()
            .find(|n| n.tag_name().name() == "calendar-data")
            .and_then(|n| n.text())
            .map(str::to_string);

        if let Some(data) = data {
            payloads.push(data);
        }
    }

    Ok(payloads)
}

/// Parse one ICS resource into a canonical event. Returns `None` when the
/// payload has no usable VEVENT; the caller logs and moves on.
fn parse_ics_event(content: &str, token: &CalendarAccountToken) -> Option<CalendarEvent> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).ok()?;
    let vevent = calendar.components.iter().find(|c| c.name == "VEVENT")?;

    let uid = vevent.find_prop("UID")?.val.to_string();
    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "(No title)".to_string());
    let description = vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string());
    let location = vevent.find_prop("LOCATION").map(|p| p.val.to_string());

    let (start_time, start_all_day) =
        to_utc(DatePerhapsTime::try_from(vevent.find_prop("DTSTART")?).ok()?);
    let (end_time, _) = to_utc(DatePerhapsTime::try_from(vevent.find_prop("DTEND")?).ok()?);

    Some(CalendarEvent {
        id: uid,
        summary,
        description,
        location,
        start_time,
        end_time,
        is_all_day: start_all_day,
        provider: CalendarProviderKind::Apple,
        calendar_id: token.calendar_id.clone(),
        calendar_name: token.calendar_name.clone(),
    })
}

/// Collapse the ICS date forms to UTC. Date-only values become midnight
/// UTC; floating and zone-qualified times are read as UTC, which holds for
/// iCloud exports that ship Zulu times.
fn to_utc(value: DatePerhapsTime) -> (DateTime<Utc>, bool) {
    match value {
        DatePerhapsTime::Date(date) => {
            (date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(), true)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => (dt, false),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(dt)) => (dt.and_utc(), false),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, .. }) => {
            (date_time.and_utc(), false)
        }
    }
}
