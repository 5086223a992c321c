//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations used by the feature crates:
//! - Cryptographic helpers (HMAC-SHA256, URL-safe Base64, OS randomness)
//! - Password hashing (Argon2id)
//! - Cookie management
//! - Key-value store abstraction with Redis and in-memory backends
//! - Ambient transaction context over an `sqlx` pool

pub mod cookie;
pub mod crypto;
pub mod db;
pub mod kv;
pub mod password;
