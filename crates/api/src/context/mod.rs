//! Application context - dependency injection container

use std::sync::Arc;
use std::time::Duration;

use trellis_core::calendar::ports::{ProviderRegistry, SyncHistoryStore, TokenStore};
use trellis_core::{SyncHistoryService, TokenRefreshService, UnifiedCalendarService};
use trellis_domain::{Config, Result};
use trellis_infra::{
    CalendarProviderRegistry, DbManager, SqliteSyncHistoryStore, SqliteTokenStore,
};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub tokens: Arc<dyn TokenStore>,
    pub unified_calendar: Arc<UnifiedCalendarService>,
    pub sync_history: Arc<SyncHistoryService>,
    pub token_refresh: Arc<TokenRefreshService>,
}

impl AppContext {
    /// Build the full dependency graph from configuration.
    ///
    /// Runs migrations on the configured database before any service is
    /// handed a connection.
    pub fn new(config: Config) -> Result<Self> {
        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let tokens: Arc<dyn TokenStore> = Arc::new(SqliteTokenStore::new(db.pool().clone()));
        let history: Arc<dyn SyncHistoryStore> =
            Arc::new(SqliteSyncHistoryStore::new(db.pool().clone()));
        let registry: Arc<dyn ProviderRegistry> =
            Arc::new(CalendarProviderRegistry::from_config(&config.providers)?);

        let unified_calendar = Arc::new(
            UnifiedCalendarService::new(tokens.clone(), registry.clone())
                .with_fetch_timeout(Duration::from_secs(config.providers.fetch_timeout_secs)),
        );
        let sync_history = Arc::new(SyncHistoryService::new(history));
        let token_refresh = Arc::new(TokenRefreshService::new(tokens.clone(), registry));

        Ok(Self { config, db, tokens, unified_calendar, sync_history, token_refresh })
    }
}
