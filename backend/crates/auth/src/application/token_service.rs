//! Token Service
//!
//! Issues, validates, rotates and revokes access/refresh token pairs. A
//! token is only honoured while its forward mapping lives in the key-value
//! store; the signature alone is not enough.
//!
//! Every multi-key write goes through one atomic batch, so no reader ever
//! sees a forward entry without its reverse twin or two live sets for one
//! user. Concurrent `issue`/`refresh` calls for the same user are not
//! serialized; the last batch to run wins.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use kernel::id::UserId;
use platform::kv::{self, BatchOp, KvError, KvStore};
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::domain::session_keys::{TokenKey, UserTokenKey, forward_prefix};
use crate::domain::token::{self, TokenClaims, TokenCodecError, TokenKind};
use crate::error::{AuthError, AuthResult};

/// Identity a token pair is minted for
#[derive(Debug, Clone)]
pub struct Credential {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

pub struct TokenService<S> {
    store: S,
    config: Arc<AuthConfig>,
}

impl<S> TokenService<S>
where
    S: KvStore + Sync,
{
    pub fn new(store: S, config: Arc<AuthConfig>) -> Self {
        Self { store, config }
    }

    /// Mint a fresh pair and make it the user's only live session.
    ///
    /// Removing the previous set and writing the new one happen in the same
    /// batch.
    pub async fn issue(&self, credential: &Credential) -> AuthResult<TokenPair> {
        let now = Utc::now();
        let access = self.sign(credential, TokenKind::Access, now)?;
        let refresh = self.sign(credential, TokenKind::Refresh, now)?;

        let mut ops = vec![
            self.revoke_op(TokenKind::Access, credential.user_id),
            self.revoke_op(TokenKind::Refresh, credential.user_id),
        ];
        ops.extend(self.write_ops(TokenKind::Access, credential.user_id, &access.token));
        ops.extend(self.write_ops(TokenKind::Refresh, credential.user_id, &refresh.token));

        self.store.atomic_batch(ops).await?;

        tracing::info!(user_id = %credential.user_id, "Issued token pair");

        Ok(TokenPair { access, refresh })
    }

    /// Check signature, algorithm, issuer and expiry. Does not consult the
    /// store.
    pub fn parse(&self, token: &str, kind: TokenKind) -> AuthResult<TokenClaims> {
        let claims = token::decode(token, self.secret(kind), Utc::now()).map_err(|e| match e {
            TokenCodecError::Expired => AuthError::ExpiredToken,
            _ => AuthError::MalformedToken,
        })?;

        if claims.iss != self.config.issuer {
            return Err(AuthError::MalformedToken);
        }

        Ok(claims)
    }

    /// Trade a live refresh token for a new access token.
    ///
    /// Only the access half rotates; the refresh token and its entries stay
    /// as they are.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<IssuedToken> {
        let claims = self
            .parse(refresh_token, TokenKind::Refresh)
            .map_err(|_| AuthError::InvalidToken)?;

        let stored = kv::fetch(
            &self.store,
            &TokenKey {
                kind: TokenKind::Refresh,
                token: refresh_token,
            },
        )
        .await
        .map_err(|e| match e {
            KvError::Decode { .. } => AuthError::InvalidToken,
            other => other.into(),
        })?;

        match stored {
            Some(uid) if uid == claims.uid.get() => {}
            Some(uid) => {
                tracing::warn!(
                    claimed = %claims.uid,
                    stored = uid,
                    "Refresh token mapped to a different user"
                );
                return Err(AuthError::InvalidToken);
            }
            None => return Err(AuthError::InvalidToken),
        }

        let credential = Credential {
            user_id: claims.uid,
            username: claims.name,
        };
        let access = self.sign(&credential, TokenKind::Access, Utc::now())?;

        let mut ops = vec![self.revoke_op(TokenKind::Access, credential.user_id)];
        ops.extend(self.write_ops(TokenKind::Access, credential.user_id, &access.token));
        self.store.atomic_batch(ops).await?;

        tracing::debug!(user_id = %credential.user_id, "Rotated access token");

        Ok(access)
    }

    /// True while an access or refresh forward entry exists for `token`.
    ///
    /// Forward entries hold a user ID. A value that does not decode as one
    /// is some other entry sharing the key (`access:user:<id>` for the token
    /// `user:<id>`), so it does not count.
    pub async fn is_live(&self, token: &str) -> AuthResult<bool> {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            match kv::fetch(&self.store, &TokenKey { kind, token }).await {
                Ok(Some(_)) => return Ok(true),
                Ok(None) | Err(KvError::Decode { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(false)
    }

    /// User behind a live access token.
    ///
    /// An entry that does not hold a user ID counts as absent.
    pub async fn resolve_access(&self, token: &str) -> AuthResult<Option<UserId>> {
        let key = TokenKey {
            kind: TokenKind::Access,
            token,
        };
        match kv::fetch(&self.store, &key).await {
            Ok(uid) => Ok(uid.map(UserId::new)),
            Err(KvError::Decode { key, reason }) => {
                tracing::warn!(key = %key, reason = %reason, "Undecodable access entry");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop both of the user's token sets.
    pub async fn revoke(&self, user_id: UserId) -> AuthResult<()> {
        self.store
            .atomic_batch(vec![
                self.revoke_op(TokenKind::Access, user_id),
                self.revoke_op(TokenKind::Refresh, user_id),
            ])
            .await?;

        tracing::info!(user_id = %user_id, "Revoked sessions");
        Ok(())
    }

    fn sign(
        &self,
        credential: &Credential,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedToken> {
        let ttl = ChronoDuration::from_std(self.ttl(kind))
            .map_err(|e| AuthError::SigningError(e.to_string()))?;
        let expires_at = now + ttl;

        let claims = TokenClaims {
            uid: credential.user_id,
            name: credential.username.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.config.issuer.clone(),
        };

        let token = token::encode(&claims, self.secret(kind))
            .map_err(|e| AuthError::SigningError(e.to_string()))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Delete the reverse entry and the forward entry it points at.
    fn revoke_op(&self, kind: TokenKind, user_id: UserId) -> BatchOp {
        BatchOp::delete_with_referent(&UserTokenKey { kind, user_id }, forward_prefix(kind))
    }

    fn write_ops(&self, kind: TokenKind, user_id: UserId, token: &str) -> [BatchOp; 2] {
        let ttl = self.ttl(kind);
        [
            BatchOp::set(&TokenKey { kind, token }, &user_id.get(), ttl),
            BatchOp::set(&UserTokenKey { kind, user_id }, &token.to_string(), ttl),
        ]
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.config.access_secret,
            TokenKind::Refresh => &self.config.refresh_secret,
        }
    }

    fn ttl(&self, kind: TokenKind) -> std::time::Duration {
        match kind {
            TokenKind::Access => self.config.access_token_ttl,
            TokenKind::Refresh => self.config.refresh_token_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::kv::MemoryKvStore;

    fn service() -> (TokenService<MemoryKvStore>, MemoryKvStore) {
        let store = MemoryKvStore::new();
        let config = Arc::new(AuthConfig::default());
        (TokenService::new(store.clone(), config), store)
    }

    fn admin() -> Credential {
        Credential {
            user_id: UserId::new(1),
            username: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_parse_uses_kind_specific_secret() {
        let (service, _) = service();
        let pair = service.issue(&admin()).await.unwrap();

        let claims = service.parse(&pair.access.token, TokenKind::Access).unwrap();
        assert_eq!(claims.uid, UserId::new(1));
        assert_eq!(claims.name, "admin");
        assert_eq!(claims.iss, "Dash");

        assert!(matches!(
            service.parse(&pair.access.token, TokenKind::Refresh),
            Err(AuthError::MalformedToken)
        ));
        assert!(matches!(
            service.parse("not-a-token", TokenKind::Access),
            Err(AuthError::MalformedToken)
        ));
    }

    #[tokio::test]
    async fn test_same_second_tokens_differ() {
        let (service, _) = service();
        let first = service.issue(&admin()).await.unwrap();
        let second = service.issue(&admin()).await.unwrap();
        assert_ne!(first.access.token, second.access.token);
        assert_ne!(first.refresh.token, second.refresh.token);
    }

    #[tokio::test]
    async fn test_expiry_matches_configured_ttl() {
        let (service, _) = service();
        let before = Utc::now();
        let pair = service.issue(&admin()).await.unwrap();

        let access_ttl = pair.access.expires_at - before;
        assert!(access_ttl <= ChronoDuration::seconds(901));
        assert!(access_ttl >= ChronoDuration::seconds(899));
        let refresh_ttl = pair.refresh.expires_at - before;
        assert!(refresh_ttl >= ChronoDuration::seconds(86_399));
    }

    #[tokio::test]
    async fn test_resolve_access_ignores_undecodable_entry() {
        let (service, store) = service();
        store
            .set("access:junk", "not-a-number", std::time::Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(service.resolve_access("junk").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reverse_entry_is_not_a_live_token() {
        let (service, _) = service();
        let pair = service.issue(&admin()).await.unwrap();

        // `access:user:1` exists, but as the reverse entry
        assert!(!service.is_live("user:1").await.unwrap());
        assert_eq!(service.resolve_access("user:1").await.unwrap(), None);
        assert!(service.is_live(&pair.access.token).await.unwrap());
        assert!(service.is_live(&pair.refresh.token).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let (service, _) = service();
        let pair = service.issue(&admin()).await.unwrap();
        assert!(matches!(
            service.refresh(&pair.access.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_entry_for_other_user() {
        let (service, store) = service();
        let pair = service.issue(&admin()).await.unwrap();
        store
            .set(
                &format!("refresh:{}", pair.refresh.token),
                "2",
                std::time::Duration::from_secs(60),
            )
            .await
            .unwrap();

        assert!(matches!(
            service.refresh(&pair.refresh.token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_revoke_removes_both_sets() {
        let (service, store) = service();
        let pair = service.issue(&admin()).await.unwrap();
        assert_eq!(store.len().await, 4);

        service.revoke(UserId::new(1)).await.unwrap();
        assert!(store.is_empty().await);
        assert!(!service.is_live(&pair.access.token).await.unwrap());
        assert!(!service.is_live(&pair.refresh.token).await.unwrap());
    }
}
