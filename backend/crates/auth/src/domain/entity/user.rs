//! User Entity
//!
//! The blog administrator account.

use chrono::{DateTime, Utc};
use kernel::id::UserId;

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    /// Unique login name
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub avatar: String,
    pub description: String,
    /// Argon2 PHC string; never leaves the backend
    pub password_hash: String,
    /// Sign-in is refused after this instant; `None` never expires
    pub expire_time: Option<DateTime<Utc>>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl User {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expire_time.is_some_and(|expire| expire <= now)
    }
}

/// Data for inserting a user; IDs and timestamps come from the database.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub avatar: String,
    pub password_hash: String,
}
