//! Auth (Admin Session) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, token codec, session key schema, repository traits
//! - `application/` - Use cases and application services
//! - `infra/` - Database implementations
//! - `presentation/` - HTTP handlers, DTOs, router, gate middleware
//!
//! ## Features
//! - Administrator sign-in with username + password
//! - Access/refresh token pairs (HS256) that are only honoured while their
//!   mapping lives in the key-value store; one live pair per user
//! - Refresh token in an `HttpOnly` cookie scoped to the auth routes
//! - One-time tokens bound to a single request path
//! - First-run installation inside one database transaction
//!
//! ## Security Model
//! - Passwords hashed with Argon2id
//! - Signing out or signing in again revokes the previous tokens at once
//! - Unknown user and wrong password produce the same error

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;


// Re-exports for convenience
pub use application::config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use infra::postgres::PgAuthRepository;
pub use presentation::router::{admin_router, admin_router_generic};
