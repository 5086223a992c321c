//! Auth Gate Use Case
//!
//! Decides whether a request to an admin route may proceed. Checks run in a
//! fixed order and the first one that fires decides:
//!
//! 1. blog not installed
//! 2. one-time token in the query (allows without a user)
//! 3. missing `Authorization` header
//! 4. access token without a live store entry
//! 5. user behind the token no longer exists

use std::sync::Arc;

use platform::db::DbContext;
use platform::kv::KvStore;
use sqlx::Database;

use crate::application::one_time_token::OneTimeTokenService;
use crate::application::token_service::TokenService;
use crate::domain::entity::user::User;
use crate::domain::option_key;
use crate::domain::repository::AuthRepositories;
use crate::error::{AuthError, AuthResult};

/// Length of the `Bearer ` prefix, stripped by position
const BEARER_PREFIX_LEN: usize = 7;

/// The parts of a request the gate looks at
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// Full request path, before any router nesting is stripped
    pub path: &'a str,
    /// Value of the one-time token query parameter, if present (even empty)
    pub one_time_token: Option<&'a str>,
    /// `Authorization` header value, if present
    pub authorization: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub enum GateDecision {
    /// Let through on a one-time token; no user is bound
    OneTimeToken,
    /// Let through as this user
    User(User),
}

pub struct AuthGateUseCase<S, R> {
    repo: Arc<R>,
    tokens: Arc<TokenService<S>>,
    one_time_tokens: Arc<OneTimeTokenService<S>>,
}

impl<S, R> AuthGateUseCase<S, R>
where
    S: KvStore + Sync,
{
    pub fn new(
        repo: Arc<R>,
        tokens: Arc<TokenService<S>>,
        one_time_tokens: Arc<OneTimeTokenService<S>>,
    ) -> Self {
        Self {
            repo,
            tokens,
            one_time_tokens,
        }
    }

    pub async fn execute<DB>(
        &self,
        db: &DbContext<DB>,
        request: GateRequest<'_>,
    ) -> AuthResult<GateDecision>
    where
        DB: Database,
        R: AuthRepositories<DB>,
    {
        let installed = self
            .repo
            .get_option(db, option_key::IS_INSTALLED)
            .await
            .map_err(|e| AuthError::Internal(format!("reading install status: {e}")))?;
        if installed.as_deref() != Some("true") {
            return Err(AuthError::ServiceNotReady);
        }

        if let Some(one_time_token) = request.one_time_token {
            let allowed_path = self
                .one_time_tokens
                .resolve(one_time_token)
                .await?
                .ok_or(AuthError::InvalidOneTimeToken)?;
            if allowed_path != request.path {
                return Err(AuthError::OneTimeTokenPathMismatch);
            }
            return Ok(GateDecision::OneTimeToken);
        }

        let header = request
            .authorization
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::Unauthenticated)?;
        let token = header
            .get(BEARER_PREFIX_LEN..)
            .ok_or(AuthError::MalformedToken)?;

        let user_id = self
            .tokens
            .resolve_access(token)
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let user = self
            .repo
            .find_by_id(db, user_id)
            .await
            .map_err(|e| AuthError::Internal(format!("loading user {user_id}: {e}")))?
            .ok_or(AuthError::UserNotFound)?;

        Ok(GateDecision::User(user))
    }
}
