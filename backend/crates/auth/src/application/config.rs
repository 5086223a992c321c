//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::cookie::CookieConfig;
/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

use crate::error::{AuthError, AuthResult};

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC-SHA256 key for access tokens
    pub access_secret: [u8; 32],
    /// HMAC-SHA256 key for refresh tokens; must differ from `access_secret`
    pub refresh_secret: [u8; 32],
    /// Access token lifetime (15 minutes)
    pub access_token_ttl: Duration,
    /// Refresh token lifetime (1 day)
    pub refresh_token_ttl: Duration,
    /// `iss` claim written into and required from every token
    pub issuer: String,
    pub refresh_cookie_name: String,
    /// Scope of the refresh cookie; only the auth routes ever see it
    pub refresh_cookie_path: String,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// One-time token lifetime (5 minutes)
    pub one_time_token_ttl: Duration,
    /// Query parameter carrying a one-time token
    pub one_time_token_query: String,
}

/// Fresh random secrets, so tokens die with the process. Deployments load
/// their own.
impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: platform::crypto::random_key(),
            refresh_secret: platform::crypto::random_key(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(24 * 3600),
            issuer: "Dash".to_string(),
            refresh_cookie_name: "refresh_token".to_string(),
            refresh_cookie_path: "/api/admin/auth".to_string(),
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            one_time_token_ttl: Duration::from_secs(5 * 60),
            one_time_token_query: "ott".to_string(),
        }
    }
}

impl AuthConfig {
    /// Create config for development (insecure cookie)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            ..Self::default()
        }
    }

    /// Reject secrets that would let one token kind pass as the other, or
    /// that anyone could guess.
    pub fn check_secrets(&self) -> AuthResult<()> {
        if self.access_secret == self.refresh_secret {
            return Err(AuthError::Validation(
                "access and refresh secrets must differ".into(),
            ));
        }
        if self.access_secret == [0u8; 32] || self.refresh_secret == [0u8; 32] {
            return Err(AuthError::Validation("secrets must not be all zero".into()));
        }
        Ok(())
    }

    /// Cookie that carries the refresh token
    pub fn refresh_cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.refresh_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: self.refresh_cookie_path.clone(),
            max_age_secs: Some(self.refresh_token_ttl.as_secs()),
        }
    }
}
