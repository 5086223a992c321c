//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::db::DbContext;
use sqlx::Postgres;

use crate::domain::entity::user::{NewUser, User};
use crate::domain::repository::{OptionRepository, UserRepository};
use crate::error::AuthResult;

const USER_COLUMNS: &str = r#"
    id,
    username,
    nickname,
    email,
    avatar,
    description,
    password_hash,
    expire_time,
    create_time,
    update_time
"#;

/// PostgreSQL-backed auth repository.
///
/// Holds no pool of its own; every query runs on the connection the caller's
/// [`DbContext`] hands out, so it joins an ambient transaction when one exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgAuthRepository;

impl PgAuthRepository {
    pub fn new() -> Self {
        Self
    }
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository<Postgres> for PgAuthRepository {
    async fn find_by_id(&self, db: &DbContext<Postgres>, id: UserId) -> AuthResult<Option<User>> {
        let mut conn = db.conn().await?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn find_by_username(
        &self,
        db: &DbContext<Postgres>,
        username: &str,
    ) -> AuthResult<Option<User>> {
        let mut conn = db.conn().await?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(UserRow::into_user))
    }

    async fn create(&self, db: &DbContext<Postgres>, user: &NewUser) -> AuthResult<User> {
        let mut conn = db.conn().await?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, nickname, email, avatar, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.nickname)
        .bind(&user.email)
        .bind(&user.avatar)
        .bind(&user.password_hash)
        .fetch_one(&mut *conn)
        .await?;

        Ok(row.into_user())
    }
}

// ============================================================================
// Option Repository Implementation
// ============================================================================

impl OptionRepository<Postgres> for PgAuthRepository {
    async fn get_option(&self, db: &DbContext<Postgres>, key: &str) -> AuthResult<Option<String>> {
        let mut conn = db.conn().await?;
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM options WHERE key = $1")
            .bind(key)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(value)
    }

    async fn save_option(&self, db: &DbContext<Postgres>, key: &str, value: &str) -> AuthResult<()> {
        let mut conn = db.conn().await?;
        sqlx::query(
            r#"
            INSERT INTO options (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                update_time = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn claim_option(
        &self,
        db: &DbContext<Postgres>,
        key: &str,
        value: &str,
    ) -> AuthResult<bool> {
        let mut conn = db.conn().await?;
        let result = sqlx::query(
            r#"
            INSERT INTO options (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                update_time = NOW()
            WHERE options.value <> EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    nickname: String,
    email: String,
    avatar: String,
    description: String,
    password_hash: String,
    expire_time: Option<DateTime<Utc>>,
    create_time: DateTime<Utc>,
    update_time: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: UserId::new(self.id),
            username: self.username,
            nickname: self.nickname,
            email: self.email,
            avatar: self.avatar,
            description: self.description,
            password_hash: self.password_hash,
            expire_time: self.expire_time,
            create_time: self.create_time,
            update_time: self.update_time,
        }
    }
}
