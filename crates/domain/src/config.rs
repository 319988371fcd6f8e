//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BIND_ADDR, DEFAULT_DB_POOL_SIZE, PROVIDER_FETCH_TIMEOUT_SECS};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// Provider endpoint configuration.
///
/// Base URLs are explicit configuration rather than file-scope constants so
/// tests (and self-hosted CalDAV deployments) can point adapters elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub google_base_url: String,
    pub outlook_base_url: String,
    pub apple_base_url: String,
    /// Per-token outbound call budget in seconds.
    pub fetch_timeout_secs: u64,
    /// OAuth application credentials for refreshing Google tokens.
    #[serde(default)]
    pub google_oauth: Option<OAuthClientConfig>,
    /// OAuth application credentials for refreshing Outlook tokens.
    #[serde(default)]
    pub outlook_oauth: Option<OAuthClientConfig>,
}

/// An OAuth application registration, used for refresh-token exchanges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            google_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            outlook_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            apple_base_url: "https://caldav.icloud.com".to_string(),
            fetch_timeout_secs: PROVIDER_FETCH_TIMEOUT_SECS,
            google_oauth: None,
            outlook_oauth: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "trellis.db".to_string(),
                pool_size: DEFAULT_DB_POOL_SIZE,
            },
            server: ServerConfig { bind_addr: DEFAULT_BIND_ADDR.to_string() },
            providers: ProvidersConfig::default(),
        }
    }
}
