//! Domain Layer
//!
//! Entities, token claims, key-value layout and repository traits.

pub mod entity;
pub mod option_key;
pub mod repository;
pub mod session_keys;
pub mod token;

// Re-exports
pub use entity::user::{NewUser, User};
pub use repository::{AuthRepositories, OptionRepository, UserRepository};
pub use token::{TokenClaims, TokenKind};
