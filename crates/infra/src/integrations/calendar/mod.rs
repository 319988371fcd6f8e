//! Calendar provider integrations

pub mod providers;
pub mod registry;

pub use providers::{AppleCalendarProvider, GoogleCalendarProvider, OutlookCalendarProvider};
pub use registry::CalendarProviderRegistry;
