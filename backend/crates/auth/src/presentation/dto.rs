//! API DTOs (Data Transfer Objects)
//!
//! Field names are snake_case to match the admin frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::token_service::IssuedToken;
use crate::domain::entity::user::User;

// ============================================================================
// Auth
// ============================================================================

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Access token response for login and refresh
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Access token expiry, epoch milliseconds
    pub expired_in: i64,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            access_token: issued.token,
            expired_in: issued.expires_at.timestamp_millis(),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub avatar: String,
    pub description: String,
    pub expire_time: Option<DateTime<Utc>>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.get(),
            username: user.username,
            nickname: user.nickname,
            email: user.email,
            avatar: user.avatar,
            description: user.description,
            expire_time: user.expire_time,
            create_time: user.create_time,
            update_time: user.update_time,
        }
    }
}

// ============================================================================
// One-Time Tokens
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct OneTimeTokenRequest {
    /// Full request path the token will unlock
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OneTimeTokenResponse {
    pub token: String,
}

// ============================================================================
// Install
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct IsInstalledResponse {
    pub installed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub nickname: String,
    pub email: String,
    pub title: String,
    /// Public blog address; derived from the `Host` header when absent
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::id::UserId;

    #[test]
    fn test_user_response_omits_password_hash() {
        let now = Utc::now();
        let user = User {
            id: UserId::new(7),
            username: "admin".to_string(),
            nickname: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            avatar: String::new(),
            description: String::new(),
            password_hash: "$argon2id$secret".to_string(),
            expire_time: None,
            create_time: now,
            update_time: now,
        };

        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["username"], "admin");
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_install_request_defaults() {
        let req: InstallRequest = serde_json::from_str(
            r#"{"username":"admin","password":"p","email":"a@b.c","title":"Blog"}"#,
        )
        .unwrap();
        assert_eq!(req.nickname, "");
        assert!(req.url.is_none());
    }
}
