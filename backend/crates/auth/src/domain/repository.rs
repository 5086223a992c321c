//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.
//!
//! Every method takes the caller's [`DbContext`]; inside a transaction the
//! context routes the query onto it, so repositories never open or commit
//! transactions themselves.

use kernel::id::UserId;
use platform::db::DbContext;
use sqlx::Database;

use crate::domain::entity::user::{NewUser, User};
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository<DB: Database> {
    async fn find_by_id(&self, db: &DbContext<DB>, id: UserId) -> AuthResult<Option<User>>;

    async fn find_by_username(
        &self,
        db: &DbContext<DB>,
        username: &str,
    ) -> AuthResult<Option<User>>;

    /// Insert and return the stored row
    async fn create(&self, db: &DbContext<DB>, user: &NewUser) -> AuthResult<User>;
}

/// Blog option (key/value setting) repository trait
#[trait_variant::make(OptionRepository: Send)]
pub trait LocalOptionRepository<DB: Database> {
    async fn get_option(&self, db: &DbContext<DB>, key: &str) -> AuthResult<Option<String>>;

    /// Insert or overwrite
    async fn save_option(&self, db: &DbContext<DB>, key: &str, value: &str) -> AuthResult<()>;

    /// Write `value` unless the key already holds it. `false` when it did.
    ///
    /// The write takes the row lock, so a concurrent claim of the same value
    /// waits for this transaction and then sees the value.
    async fn claim_option(&self, db: &DbContext<DB>, key: &str, value: &str)
    -> AuthResult<bool>;
}

/// Everything the auth handlers need from persistence, in one bound.
pub trait AuthRepositories<DB: Database>:
    UserRepository<DB> + OptionRepository<DB> + Send + Sync + 'static
{
}

impl<DB, T> AuthRepositories<DB> for T
where
    DB: Database,
    T: UserRepository<DB> + OptionRepository<DB> + Send + Sync + 'static,
{
}
