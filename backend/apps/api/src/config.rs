//! Server configuration loaded from the environment

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, bail};
use auth::AuthConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_FRONTEND_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

pub struct AppConfig {
    pub database_url: String,
    /// `None` only in debug builds; the in-memory store is used instead
    pub redis_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub frontend_origins: Vec<String>,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;

        let redis_url = match env::var("REDIS_URL").ok() {
            Some(url) => Some(url),
            None if cfg!(debug_assertions) => None,
            None => bail!("REDIS_URL must be set in production"),
        };

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR is not a socket address")?;

        let frontend_origins = env::var("FRONTEND_ORIGINS")
            .unwrap_or_else(|_| DEFAULT_FRONTEND_ORIGINS.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        Ok(Self {
            database_url,
            redis_url,
            bind_addr,
            frontend_origins,
            auth: auth_config()?,
        })
    }
}

fn auth_config() -> anyhow::Result<AuthConfig> {
    let access = env::var("JWT_ACCESS_SECRET").ok();
    let refresh = env::var("JWT_REFRESH_SECRET").ok();

    let config = match (access, refresh) {
        (Some(access), Some(refresh)) => {
            let base = if cfg!(debug_assertions) {
                AuthConfig::development()
            } else {
                AuthConfig::default()
            };
            AuthConfig {
                access_secret: decode_secret("JWT_ACCESS_SECRET", &access)?,
                refresh_secret: decode_secret("JWT_REFRESH_SECRET", &refresh)?,
                ..base
            }
        }
        _ if cfg!(debug_assertions) => {
            tracing::warn!("JWT secrets not set, using random ones; tokens will not survive a restart");
            AuthConfig::development()
        }
        _ => bail!("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must be set in production"),
    };

    config
        .check_secrets()
        .context("JWT_ACCESS_SECRET and JWT_REFRESH_SECRET are unusable")?;

    Ok(config)
}

/// Decode a base64 secret that must be exactly 32 bytes
fn decode_secret(name: &str, value: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = platform::crypto::from_base64(value.trim())
        .with_context(|| format!("{name} is not valid base64"))?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| anyhow::anyhow!("{name} must be 32 bytes, got {}", bytes.len()))
}

fn required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{name} must be set in environment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_secret() {
        let encoded = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";
        let secret = decode_secret("TEST", encoded).unwrap();
        assert_eq!(secret[0], 0);
        assert_eq!(secret[31], 31);

        assert!(decode_secret("TEST", "AAEC").is_err());
        assert!(decode_secret("TEST", "not base64!").is_err());
    }
}
