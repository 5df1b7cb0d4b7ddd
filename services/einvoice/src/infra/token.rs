use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::domain::einvoice::EinvoiceApiError;

/// Tokens this close to expiry are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

struct CachedToken {
    /// Credential fingerprint the token was issued for.
    key: String,
    token: AuthToken,
}

/// Process-wide cache of the e-invoice auth token.
///
/// Readers of a fresh token share the read lock. On a miss, callers queue on
/// `refresh` so only one credential exchange is in flight; the ones behind it
/// find the new token on the second check.
pub struct TokenManager {
    cached: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
    skew: Duration,
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenManager {
    pub fn new() -> Self {
        Self {
            cached: RwLock::new(None),
            refresh: Mutex::new(()),
            skew: Duration::seconds(EXPIRY_SKEW_SECS),
        }
    }

    /// Returns the cached token for `key`, or runs `fetch` to obtain one.
    pub async fn acquire<F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<AuthToken, EinvoiceApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AuthToken, EinvoiceApiError>>,
    {
        if let Some(token) = self.fresh(key).await {
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;
        if let Some(token) = self.fresh(key).await {
            return Ok(token);
        }

        let token = fetch().await?;
        tracing::info!(expires_at = %token.expires_at, "e-invoice auth token refreshed");
        *self.cached.write().await = Some(CachedToken {
            key: key.to_owned(),
            token: token.clone(),
        });
        Ok(token)
    }

    /// Forces the next `acquire` to fetch, whatever the cached token.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    /// Drops the cached token only if it is still `value`, so a late
    /// rejection of an old token does not discard a newer one.
    pub async fn invalidate_if_current(&self, value: &str) {
        let mut cached = self.cached.write().await;
        if cached.as_ref().is_some_and(|c| c.token.value == value) {
            *cached = None;
        }
    }

    async fn fresh(&self, key: &str) -> Option<AuthToken> {
        let cached = self.cached.read().await;
        cached
            .as_ref()
            .filter(|c| c.key == key && c.token.expires_at - self.skew > Utc::now())
            .map(|c| c.token.clone())
    }
}
