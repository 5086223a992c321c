//! Application Layer
//!
//! Use cases and application services.

pub mod config;
pub mod gate;
pub mod install;
pub mod one_time_token;
pub mod sign_in;
pub mod token_service;

// Re-exports
pub use config::AuthConfig;
pub use gate::{AuthGateUseCase, GateDecision, GateRequest};
pub use install::{InstallInput, InstallUseCase};
pub use one_time_token::OneTimeTokenService;
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use token_service::{Credential, IssuedToken, TokenPair, TokenService};
