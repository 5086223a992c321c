//! Sign In Use Case
//!
//! Authenticates the administrator and issues a token pair.

use std::sync::Arc;

use chrono::Utc;
use platform::db::DbContext;
use platform::kv::KvStore;
use platform::password::{ClearTextPassword, HashedPassword};
use sqlx::Database;

use crate::application::token_service::{Credential, TokenPair, TokenService};
use crate::domain::entity::user::User;
use crate::domain::repository::AuthRepositories;
use crate::error::{AuthError, AuthResult};

pub struct SignInInput {
    pub username: String,
    pub password: String,
}

pub struct SignInOutput {
    pub user: User,
    pub tokens: TokenPair,
}

pub struct SignInUseCase<S, R> {
    repo: Arc<R>,
    tokens: Arc<TokenService<S>>,
}

impl<S, R> SignInUseCase<S, R>
where
    S: KvStore + Sync,
{
    pub fn new(repo: Arc<R>, tokens: Arc<TokenService<S>>) -> Self {
        Self { repo, tokens }
    }

    pub async fn execute<DB>(
        &self,
        db: &DbContext<DB>,
        input: SignInInput,
    ) -> AuthResult<SignInOutput>
    where
        DB: Database,
        R: AuthRepositories<DB>,
    {
        let password = ClearTextPassword::for_verification(input.password);

        // Unknown user and wrong password look the same to the caller, in
        // the response and in the time it takes
        let Some(user) = self
            .repo
            .find_by_username(db, input.username.trim())
            .await?
        else {
            HashedPassword::verify_dummy(&password);
            return Err(AuthError::InvalidCredentials);
        };

        let hashed = HashedPassword::from_phc_string(user.password_hash.as_str())?;
        if !hashed.verify(&password) {
            return Err(AuthError::InvalidCredentials);
        }

        if user.is_expired_at(Utc::now()) {
            return Err(AuthError::AccountExpired);
        }

        let tokens = self
            .tokens
            .issue(&Credential {
                user_id: user.id,
                username: user.username.clone(),
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User signed in");

        Ok(SignInOutput { user, tokens })
    }
}
