//! Install Use Case
//!
//! First-run setup: creates the administrator and the blog's base options.
//! Everything is written in one transaction that starts by claiming the
//! `is_installed` flag, so at most one install ever commits.

use std::sync::Arc;

use chrono::Utc;
use platform::crypto;
use platform::db::DbContext;
use platform::password::ClearTextPassword;
use sqlx::Database;

use crate::domain::entity::user::{NewUser, User};
use crate::domain::option_key;
use crate::domain::repository::AuthRepositories;
use crate::error::{AuthError, AuthResult};

#[derive(Debug, Clone)]
pub struct InstallInput {
    pub username: String,
    pub password: String,
    pub nickname: String,
    pub email: String,
    pub title: String,
    pub url: String,
}

pub struct InstallUseCase<R> {
    repo: Arc<R>,
}

impl<R> InstallUseCase<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    pub async fn execute<DB>(&self, db: &DbContext<DB>, input: InstallInput) -> AuthResult<User>
    where
        DB: Database,
        R: AuthRepositories<DB>,
    {
        let username = input.username.trim();
        let email = input.email.trim();
        let title = input.title.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("username is required".into()));
        }
        if title.is_empty() {
            return Err(AuthError::Validation("blog title is required".into()));
        }
        if !email.contains('@') {
            return Err(AuthError::Validation("email is invalid".into()));
        }
        let nickname = match input.nickname.trim() {
            "" => username,
            nickname => nickname,
        };

        // Argon2 is slow; keep it out of the transaction
        let password_hash = ClearTextPassword::new(input.password)?.hash()?;

        let new_user = NewUser {
            username: username.to_string(),
            nickname: nickname.to_string(),
            email: email.to_string(),
            avatar: gravatar_url(email),
            password_hash: password_hash.as_phc_string().to_string(),
        };
        let title = title.to_string();
        let url = input.url.trim().trim_end_matches('/').to_string();
        let repo = self.repo.clone();

        let user = db
            .with_transaction(|tx| async move {
                // Claiming the flag first serializes concurrent installs on
                // its row; the loser sees "true" once the winner commits.
                if !repo.claim_option(&tx, option_key::IS_INSTALLED, "true").await? {
                    return Err(AuthError::AlreadyInstalled);
                }

                let user = repo.create(&tx, &new_user).await?;

                let birthday = Utc::now().timestamp_millis().to_string();
                repo.save_option(&tx, option_key::BLOG_TITLE, &title).await?;
                repo.save_option(&tx, option_key::BLOG_URL, &url).await?;
                repo.save_option(&tx, option_key::BIRTHDAY, &birthday).await?;

                Ok(user)
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Blog installed");

        Ok(user)
    }
}

/// Gravatar address for `email`, falling back to the mystery-person image.
fn gravatar_url(email: &str) -> String {
    let digest = crypto::sha256(email.trim().to_lowercase().as_bytes());
    format!(
        "https://gravatar.com/avatar/{}?s=256&d=mm",
        crypto::to_hex(&digest)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravatar_url_normalizes_email() {
        assert_eq!(gravatar_url("Admin@Example.com "), gravatar_url("admin@example.com"));
        assert!(gravatar_url("a@b.c").starts_with("https://gravatar.com/avatar/"));
        assert!(gravatar_url("a@b.c").ends_with("?s=256&d=mm"));
    }
}
