//! One-Time Token Service
//!
//! Short-lived tokens that unlock exactly one URL path without a bearer
//! header, e.g. a download link opened in a new tab. A token stays usable
//! until its TTL runs out; resolving it does not consume it.

use std::sync::Arc;

use platform::kv::{self, KvStore};
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::domain::session_keys::OneTimeTokenKey;
use crate::error::AuthResult;

pub struct OneTimeTokenService<S> {
    store: S,
    config: Arc<AuthConfig>,
}

impl<S> OneTimeTokenService<S>
where
    S: KvStore + Sync,
{
    pub fn new(store: S, config: Arc<AuthConfig>) -> Self {
        Self { store, config }
    }

    /// Store `bound_value` under a fresh dash-less UUID and return it.
    pub async fn create(&self, bound_value: &str) -> AuthResult<String> {
        let token = Uuid::new_v4().simple().to_string();
        kv::put(
            &self.store,
            &OneTimeTokenKey(&token),
            &bound_value.to_string(),
            self.config.one_time_token_ttl,
        )
        .await?;

        tracing::debug!(path = %bound_value, "Created one-time token");
        Ok(token)
    }

    pub async fn resolve(&self, token: &str) -> AuthResult<Option<String>> {
        Ok(kv::fetch(&self.store, &OneTimeTokenKey(token)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::kv::MemoryKvStore;
    use std::time::Duration;

    fn service() -> OneTimeTokenService<MemoryKvStore> {
        OneTimeTokenService::new(MemoryKvStore::new(), Arc::new(AuthConfig::default()))
    }

    #[tokio::test]
    async fn test_create_and_resolve() {
        let service = service();
        let token = service.create("/api/admin/backups/1").await.unwrap();

        assert_eq!(token.len(), 32);
        assert!(!token.contains('-'));
        assert_eq!(
            service.resolve(&token).await.unwrap().as_deref(),
            Some("/api/admin/backups/1")
        );
        // Reusable until expiry
        assert!(service.resolve(&token).await.unwrap().is_some());
        assert_eq!(service.resolve("unknown").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_expires_after_ttl() {
        let service = service();
        let token = service.create("/x").await.unwrap();

        tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(service.resolve(&token).await.unwrap(), None);
    }
}
