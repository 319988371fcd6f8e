//! Provider adapter registry

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use trellis_core::calendar::ports::{CalendarProvider, ProviderRegistry};
use trellis_domain::{CalendarProviderKind, ProvidersConfig, Result};

use super::providers::{AppleCalendarProvider, GoogleCalendarProvider, OutlookCalendarProvider};
use crate::http::HttpClient;

/// Registry holding one adapter per supported provider.
///
/// Adapters run single-attempt: a failed call becomes a per-calendar error
/// in the aggregation result, and the next aggregation retries naturally.
pub struct CalendarProviderRegistry {
    providers: HashMap<CalendarProviderKind, Arc<dyn CalendarProvider>>,
}

impl CalendarProviderRegistry {
    /// Build the registry from endpoint configuration.
    pub fn from_config(config: &ProvidersConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;

        let mut google = GoogleCalendarProvider::new(http.clone(), &config.google_base_url);
        if let Some(oauth) = &config.google_oauth {
            google = google.with_oauth(oauth.clone());
        }
        let mut outlook = OutlookCalendarProvider::new(http.clone(), &config.outlook_base_url);
        if let Some(oauth) = &config.outlook_oauth {
            outlook = outlook.with_oauth(oauth.clone());
        }

        let mut providers: HashMap<CalendarProviderKind, Arc<dyn CalendarProvider>> =
            HashMap::new();
        providers.insert(CalendarProviderKind::Google, Arc::new(google));
        providers.insert(CalendarProviderKind::Outlook, Arc::new(outlook));
        providers.insert(
            CalendarProviderKind::Apple,
            Arc::new(AppleCalendarProvider::new(http, &config.apple_base_url)),
        );

        Ok(Self { providers })
    }
}

impl ProviderRegistry for CalendarProviderRegistry {
    fn provider_for(&self, kind: CalendarProviderKind) -> Option<Arc<dyn CalendarProvider>> {
        self.providers.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_provider() {
        let registry =
            CalendarProviderRegistry::from_config(&ProvidersConfig::default()).unwrap();
        for kind in CalendarProviderKind::all() {
            let adapter = registry.provider_for(kind).expect("adapter registered");
            assert_eq!(adapter.kind(), kind);
        }
    }
}
