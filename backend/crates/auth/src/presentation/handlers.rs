//! HTTP Handlers

use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::Json;
use platform::cookie::extract_cookie;
use platform::db::DbContext;
use platform::kv::KvStore;
use sqlx::Database;
use std::sync::Arc;

use crate::application::config::AuthConfig;
use crate::application::{
    InstallInput, InstallUseCase, OneTimeTokenService, SignInInput, SignInUseCase, TokenService,
};
use crate::domain::option_key;
use crate::domain::repository::AuthRepositories;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    InstallRequest, IsInstalledResponse, LoginRequest, OneTimeTokenRequest, OneTimeTokenResponse,
    TokenResponse, UserResponse,
};
use crate::presentation::middleware::AuthorizedUser;

/// Shared state for auth handlers and the gate middleware
pub struct AuthAppState<S, R, DB: Database> {
    pub db: DbContext<DB>,
    pub repo: Arc<R>,
    pub tokens: Arc<TokenService<S>>,
    pub one_time_tokens: Arc<OneTimeTokenService<S>>,
    pub config: Arc<AuthConfig>,
}

impl<S, R, DB: Database> Clone for AuthAppState<S, R, DB> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            repo: self.repo.clone(),
            tokens: self.tokens.clone(),
            one_time_tokens: self.one_time_tokens.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, R, DB> AuthAppState<S, R, DB>
where
    S: KvStore + Clone + Sync,
    DB: Database,
{
    /// Build the token services over one shared store handle.
    pub fn new(db: DbContext<DB>, repo: R, store: S, config: AuthConfig) -> Self {
        let config = Arc::new(config);
        Self {
            db,
            repo: Arc::new(repo),
            tokens: Arc::new(TokenService::new(store.clone(), config.clone())),
            one_time_tokens: Arc::new(OneTimeTokenService::new(store, config.clone())),
            config,
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// POST /auth/login
pub async fn login<S, R, DB>(
    State(state): State<AuthAppState<S, R, DB>>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<impl IntoResponse>
where
    S: KvStore + Sync + 'static,
    R: AuthRepositories<DB>,
    DB: Database,
{
    let use_case = SignInUseCase::new(state.repo.clone(), state.tokens.clone());

    let input = SignInInput {
        username: req.username,
        password: req.password,
    };

    let output = use_case.execute(&state.db, input).await?;

    let cookie = state
        .config
        .refresh_cookie()
        .set_cookie_header(&output.tokens.refresh.token)
        .ok_or_else(|| AuthError::Internal("refresh token is not a valid cookie value".into()))?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(TokenResponse::from(output.tokens.access)),
    ))
}

/// POST /auth/refresh
pub async fn refresh<S, R, DB>(
    State(state): State<AuthAppState<S, R, DB>>,
    headers: HeaderMap,
) -> AuthResult<Json<TokenResponse>>
where
    S: KvStore + Sync + 'static,
    R: AuthRepositories<DB>,
    DB: Database,
{
    let token = extract_cookie(&headers, &state.config.refresh_cookie_name)
        .ok_or(AuthError::InvalidToken)?;

    let access = state.tokens.refresh(&token).await?;

    Ok(Json(TokenResponse::from(access)))
}

/// POST /auth/logout
pub async fn logout<S, R, DB>(
    State(state): State<AuthAppState<S, R, DB>>,
    user: Option<Extension<AuthorizedUser>>,
) -> AuthResult<impl IntoResponse>
where
    S: KvStore + Sync + 'static,
    R: AuthRepositories<DB>,
    DB: Database,
{
    let Extension(AuthorizedUser(user)) = user.ok_or(AuthError::Unauthenticated)?;

    state.tokens.revoke(user.id).await?;

    let cookie = state
        .config
        .refresh_cookie()
        .delete_cookie_header()
        .ok_or_else(|| AuthError::Internal("refresh cookie attributes are invalid".into()))?;

    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

// ============================================================================
// Users
// ============================================================================

/// GET /users/me
pub async fn current_user(
    user: Option<Extension<AuthorizedUser>>,
) -> AuthResult<Json<UserResponse>> {
    let Extension(AuthorizedUser(user)) = user.ok_or(AuthError::Unauthenticated)?;
    Ok(Json(UserResponse::from(user)))
}

// ============================================================================
// One-Time Tokens
// ============================================================================

/// POST /one-time-tokens
///
/// Only a signed-in user may mint; a one-time token cannot buy another one.
pub async fn create_one_time_token<S, R, DB>(
    State(state): State<AuthAppState<S, R, DB>>,
    user: Option<Extension<AuthorizedUser>>,
    Json(req): Json<OneTimeTokenRequest>,
) -> AuthResult<Json<OneTimeTokenResponse>>
where
    S: KvStore + Sync + 'static,
    R: AuthRepositories<DB>,
    DB: Database,
{
    let Extension(AuthorizedUser(user)) = user.ok_or(AuthError::Unauthenticated)?;

    if !req.path.starts_with('/') {
        return Err(AuthError::Validation(
            "path must be an absolute request path".into(),
        ));
    }

    let token = state.one_time_tokens.create(&req.path).await?;
    tracing::debug!(user_id = %user.id, path = %req.path, "Created one-time token");

    Ok(Json(OneTimeTokenResponse { token }))
}

// ============================================================================
// Install
// ============================================================================

/// GET /is_installed
pub async fn is_installed<S, R, DB>(
    State(state): State<AuthAppState<S, R, DB>>,
) -> AuthResult<Json<IsInstalledResponse>>
where
    S: KvStore + Sync + 'static,
    R: AuthRepositories<DB>,
    DB: Database,
{
    let installed = state
        .repo
        .get_option(&state.db, option_key::IS_INSTALLED)
        .await?;

    Ok(Json(IsInstalledResponse {
        installed: installed.as_deref() == Some("true"),
    }))
}

/// POST /install
pub async fn install<S, R, DB>(
    State(state): State<AuthAppState<S, R, DB>>,
    headers: HeaderMap,
    Json(req): Json<InstallRequest>,
) -> AuthResult<impl IntoResponse>
where
    S: KvStore + Sync + 'static,
    R: AuthRepositories<DB>,
    DB: Database,
{
    let url = req.url.unwrap_or_else(|| base_url_from_host(&headers));

    let use_case = InstallUseCase::new(state.repo.clone());
    let input = InstallInput {
        username: req.username,
        password: req.password,
        nickname: req.nickname,
        email: req.email,
        title: req.title,
        url,
    };

    let user = use_case.execute(&state.db, input).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

fn base_url_from_host(headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(|host| format!("http://{}", host))
        .unwrap_or_default()
}
