//! Admin Router
//!
//! Meant to be nested under `/api/admin`.
//!
//! The gated routes here all act as the signed-in user, so a request that
//! only carries a one-time token passes the gate and is then answered with
//! `UNAUTHENTICATED`. One-time tokens are for routes mounted elsewhere behind
//! [`require_admin`] that need no user, such as downloads.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use platform::db::DbContext;
use platform::kv::KvStore;
use sqlx::{Database, PgPool, Postgres};

use crate::application::config::AuthConfig;
use crate::domain::repository::AuthRepositories;
use crate::infra::postgres::PgAuthRepository;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::require_admin;

/// Create the admin router backed by PostgreSQL
pub fn admin_router<S>(pool: PgPool, store: S, config: AuthConfig) -> Router
where
    S: KvStore + Clone + Sync + 'static,
{
    let state = AuthAppState::new(DbContext::new(pool), PgAuthRepository::new(), store, config);
    admin_router_generic::<S, PgAuthRepository, Postgres>(state)
}

/// Create the admin router for any store, repository and database
pub fn admin_router_generic<S, R, DB>(state: AuthAppState<S, R, DB>) -> Router
where
    S: KvStore + Sync + 'static,
    R: AuthRepositories<DB>,
    DB: Database,
{
    let gated = Router::new()
        .route("/auth/logout", post(handlers::logout::<S, R, DB>))
        .route("/users/me", get(handlers::current_user))
        .route(
            "/one-time-tokens",
            post(handlers::create_one_time_token::<S, R, DB>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin::<S, R, DB>,
        ));

    Router::new()
        .route("/auth/login", post(handlers::login::<S, R, DB>))
        .route("/auth/refresh", post(handlers::refresh::<S, R, DB>))
        .route("/is_installed", get(handlers::is_installed::<S, R, DB>))
        .route("/install", post(handlers::install::<S, R, DB>))
        .merge(gated)
        .with_state(state)
}
