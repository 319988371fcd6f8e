//! Provider adapters
//!
//! One module per provider protocol. Each adapter implements the
//! `CalendarProvider` port: fetch raw events for one account's calendar
//! within a window and convert them to the canonical shape.

pub mod apple;
pub mod google;
pub mod outlook;

pub use apple::AppleCalendarProvider;
pub use google::GoogleCalendarProvider;
pub use outlook::OutlookCalendarProvider;

use reqwest::Response;

/// Drain an error response into (status, body snippet) for error messages.
/// Bodies are truncated so provider error pages cannot flood the logs.
pub(crate) async fn error_body(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
    let snippet: String = text.chars().take(500).collect();
    (status, snippet)
}
