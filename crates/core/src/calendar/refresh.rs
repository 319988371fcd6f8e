//! Access token refresh

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use trellis_domain::{CalendarAccountToken, Result, TrellisError};

use super::ports::{ProviderRegistry, TokenStore};

/// Exchanges a stored refresh token for a fresh access token and writes
/// the result back to the store.
pub struct TokenRefreshService {
    tokens: Arc<dyn TokenStore>,
    registry: Arc<dyn ProviderRegistry>,
}

impl TokenRefreshService {
    pub fn new(tokens: Arc<dyn TokenStore>, registry: Arc<dyn ProviderRegistry>) -> Self {
        Self { tokens, registry }
    }

    /// Refresh one account's access token.
    ///
    /// Accounts connected without a refresh token cannot be renewed and
    /// must be reconnected through the provider's consent flow.
    #[instrument(skip(self))]
    pub async fn refresh(&self, user_id: &str, token_id: &str) -> Result<CalendarAccountToken> {
        let token = self.tokens.get_token(user_id, token_id).await?;

        let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
            TrellisError::Auth(format!(
                "account {} has no refresh token, reconnect required",
                token.account_label
            ))
        })?;

        let provider = self.registry.provider_for(token.provider).ok_or_else(|| {
            TrellisError::Internal(format!("no adapter registered for {}", token.provider))
        })?;

        let refreshed = provider.refresh_access_token(refresh_token).await?;
        let expires_at = Some(Utc::now().timestamp() + refreshed.expires_in);

        self.tokens.update_access_token(&token.id, &refreshed.access_token, expires_at).await?;
        info!(provider = %token.provider, token_id = %token.id, "access token refreshed");

        self.tokens.get_token(user_id, token_id).await
    }
}
