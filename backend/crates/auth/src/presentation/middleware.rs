//! Auth Middleware
//!
//! Gate for the protected admin routes. Runs the gate use case and, when a
//! bearer token let the request through, binds the user into the request
//! extensions for the handlers.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{OriginalUri, Query, State};
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use platform::kv::KvStore;
use sqlx::Database;

use crate::application::{AuthGateUseCase, GateDecision, GateRequest};
use crate::domain::entity::user::User;
use crate::domain::repository::AuthRepositories;
use crate::error::{AuthError, AuthResult};
use crate::presentation::handlers::AuthAppState;

/// The signed-in administrator, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthorizedUser(pub User);

/// Middleware that requires a one-time token or a live access token
pub async fn require_admin<S, R, DB>(
    State(state): State<AuthAppState<S, R, DB>>,
    mut req: Request<Body>,
    next: Next,
) -> AuthResult<Response>
where
    S: KvStore + Sync + 'static,
    R: AuthRepositories<DB>,
    DB: Database,
{
    // Nesting strips the prefix from `req.uri()`; one-time tokens are bound
    // to the full path.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let one_time_token = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove(&state.config.one_time_token_query));

    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| {
            value
                .to_str()
                .map(str::to_owned)
                .map_err(|_| AuthError::MalformedToken)
        })
        .transpose()?;

    let use_case = AuthGateUseCase::new(
        state.repo.clone(),
        state.tokens.clone(),
        state.one_time_tokens.clone(),
    );

    let decision = use_case
        .execute(
            &state.db,
            GateRequest {
                path: &path,
                one_time_token: one_time_token.as_deref(),
                authorization: authorization.as_deref(),
            },
        )
        .await?;

    if let GateDecision::User(user) = decision {
        tracing::debug!(user_id = %user.id, path = %path, "Admin request authorized");
        req.extensions_mut().insert(AuthorizedUser(user));
    }

    Ok(next.run(req).await)
}
