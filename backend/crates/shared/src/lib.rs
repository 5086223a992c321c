//! Shared Kernel - Domain-crossing minimal core
//!
//! Vocabulary every Dash crate agrees on:
//! - Error classification and the unified [`error::app_error::AppError`]
//! - Typed integer identifiers for persisted entities
//!
//! Only things whose meaning is stable across the whole backend live here.

pub mod error {
    pub mod app_error;
    pub mod kind;
    #[cfg(feature = "axum")]
    pub mod response;
}
pub mod id;
