//! Ambient Transaction Context
//!
//! [`DbContext`] is passed down call chains in place of a raw pool. Inside
//! [`DbContext::with_transaction`] the context carries the open transaction,
//! and every [`DbContext::conn`] call made through it, however deep, runs on
//! that transaction. Outside one, `conn` hands out pooled connections.
//!
//! ```rust,ignore
//! ctx.with_transaction(|tx| async move {
//!     users.create(&tx, &new_user).await?;
//!     options.save(&tx, "is_installed", "true").await?;
//!     Ok::<_, AppError>(())
//! })
//! .await?;
//! ```

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::{Database, Pool, Transaction};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// A context derived inside `with_transaction` was used after the
    /// transaction committed or rolled back.
    #[error("Transaction already finished")]
    TransactionClosed,
}

type TxSlot<DB> = Arc<Mutex<Option<Transaction<'static, DB>>>>;

/// Pool plus an optional transaction bound to the current call scope.
pub struct DbContext<DB: Database> {
    pool: Pool<DB>,
    tx: Option<TxSlot<DB>>,
}

impl<DB: Database> Clone for DbContext<DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<DB: Database> DbContext<DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        Self { pool, tx: None }
    }

    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    /// Connection for the current scope: the bound transaction if there is
    /// one, otherwise a fresh pooled connection.
    ///
    /// The transaction connection is exclusive while the returned value is
    /// alive; drop it before starting the next query through another handle.
    pub async fn conn(&self) -> Result<DbConn<DB>, DbError> {
        let Some(slot) = &self.tx else {
            return Ok(DbConn::Pooled(self.pool.acquire().await?));
        };

        let guard = slot.clone().lock_owned().await;
        OwnedMutexGuard::try_map(guard, |tx| tx.as_mut().map(|tx| &mut **tx))
            .map(DbConn::Tx)
            .map_err(|_| DbError::TransactionClosed)
    }

    /// Run `f` inside a transaction.
    ///
    /// - Already inside one: `f` joins it; nothing is committed here.
    /// - `Ok`: commit, and a commit failure becomes the result.
    /// - `Err`: roll back and return the error unchanged. A rollback failure
    ///   is only logged.
    /// - Panic or cancellation: the transaction is dropped, which rolls back.
    pub async fn with_transaction<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(DbContext<DB>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<DbError>,
    {
        if self.tx.is_some() {
            return f(self.clone()).await;
        }

        let tx = self.pool.begin().await.map_err(DbError::from)?;
        let slot: TxSlot<DB> = Arc::new(Mutex::new(Some(tx)));
        let scoped = DbContext {
            pool: self.pool.clone(),
            tx: Some(slot.clone()),
        };

        let result = f(scoped).await;

        // Taking the transaction closes the slot for any leaked clone.
        let Some(tx) = slot.lock().await.take() else {
            return Err(DbError::TransactionClosed.into());
        };

        match result {
            Ok(value) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "Transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// A connection borrowed from the pool or from the ambient transaction.
pub enum DbConn<DB: Database> {
    Pooled(PoolConnection<DB>),
    Tx(OwnedMappedMutexGuard<Option<Transaction<'static, DB>>, DB::Connection>),
}

impl<DB: Database> Deref for DbConn<DB> {
    type Target = DB::Connection;

    fn deref(&self) -> &Self::Target {
        match self {
            DbConn::Pooled(conn) => &**conn,
            DbConn::Tx(conn) => &**conn,
        }
    }
}

impl<DB: Database> DerefMut for DbConn<DB> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            DbConn::Pooled(conn) => &mut **conn,
            DbConn::Tx(conn) => &mut **conn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Sqlite;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Db(String),
        Aborted,
    }

    impl From<DbError> for TestError {
        fn from(err: DbError) -> Self {
            TestError::Db(err.to_string())
        }
    }

    async fn setup() -> DbContext<Sqlite> {
        let path = std::env::temp_dir()
            .join(format!("platform-db-{}.sqlite", rand::random::<u64>()));
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::query("CREATE TABLE items (name TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        DbContext::new(pool)
    }

    async fn insert(ctx: &DbContext<Sqlite>, name: &str) -> Result<(), DbError> {
        let mut conn = ctx.conn().await?;
        sqlx::query("INSERT INTO items (name) VALUES (?)")
            .bind(name)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn count(ctx: &DbContext<Sqlite>) -> i64 {
        let mut conn = ctx.conn().await.unwrap();
        sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_on_ok() {
        let ctx = setup().await;
        let value = ctx
            .with_transaction(|tx| async move {
                assert!(tx.in_transaction());
                insert(&tx, "a").await?;
                insert(&tx, "b").await?;
                Ok::<_, TestError>(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(count(&ctx).await, 2);
    }

    #[tokio::test]
    async fn test_rollback_preserves_error() {
        let ctx = setup().await;
        let result: Result<(), TestError> = ctx
            .with_transaction(|tx| async move {
                insert(&tx, "a").await?;
                insert(&tx, "b").await?;
                Err(TestError::Aborted)
            })
            .await;

        assert_eq!(result, Err(TestError::Aborted));
        assert_eq!(count(&ctx).await, 0);
    }

    #[tokio::test]
    async fn test_nested_call_joins_outer_transaction() {
        let ctx = setup().await;
        let result: Result<(), TestError> = ctx
            .with_transaction(|outer| async move {
                insert(&outer, "outer").await?;
                outer
                    .with_transaction(|inner| async move {
                        insert(&inner, "inner").await?;
                        Ok::<_, TestError>(())
                    })
                    .await?;
                // Inner success commits nothing on its own.
                assert_eq!(count(&outer).await, 2);
                Err(TestError::Aborted)
            })
            .await;

        assert_eq!(result, Err(TestError::Aborted));
        assert_eq!(count(&ctx).await, 0);
    }

    #[tokio::test]
    async fn test_without_transaction_uses_pool() {
        let ctx = setup().await;
        assert!(!ctx.in_transaction());
        insert(&ctx, "a").await.unwrap();
        assert_eq!(count(&ctx).await, 1);
    }

    #[tokio::test]
    async fn test_leaked_context_is_closed() {
        let ctx = setup().await;
        let leaked = ctx
            .with_transaction(|tx| async move { Ok::<_, TestError>(tx.clone()) })
            .await
            .unwrap();

        assert!(matches!(
            leaked.conn().await,
            Err(DbError::TransactionClosed)
        ));
    }

    #[tokio::test]
    async fn test_panic_rolls_back() {
        let ctx = setup().await;
        let task_ctx = ctx.clone();
        let joined = tokio::spawn(async move {
            task_ctx
                .with_transaction(|tx| async move {
                    insert(&tx, "a").await?;
                    if count(&tx).await == 1 {
                        panic!("boom after insert");
                    }
                    Ok::<_, TestError>(())
                })
                .await
        })
        .await;

        assert!(joined.unwrap_err().is_panic());
        assert_eq!(count(&ctx).await, 0);
    }
}
