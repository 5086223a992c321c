//! Signed Session Tokens
//!
//! Compact JWS (`header.claims.signature`, each part unpadded base64url)
//! signed with HMAC-SHA256. Only `HS256` is accepted on decode.

use chrono::{DateTime, TimeZone, Utc};
use derive_more::Display;
use kernel::id::UserId;
use platform::crypto::{from_base64url, hmac_sha256, to_base64url, verify_hmac_sha256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ALGORITHM: &str = "HS256";

/// Which half of a session pair a token belongs to.
///
/// The display form doubles as the key-value store namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TokenKind {
    #[display("access")]
    Access,
    #[display("refresh")]
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User ID
    pub uid: UserId,
    /// Username
    pub name: String,
    /// Random per-token ID; keeps tokens minted in the same second distinct
    pub jti: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expires at (seconds since epoch)
    pub exp: i64,
    pub iss: String,
}

impl TokenClaims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenCodecError {
    #[error("token is not a compact JWS")]
    Malformed,

    #[error("unsupported algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("signature mismatch")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("failed to serialize claims: {0}")]
    Serialize(String),
}

/// Sign `claims` with `secret`.
pub fn encode(claims: &TokenClaims, secret: &[u8]) -> Result<String, TokenCodecError> {
    let header = Header {
        alg: ALGORITHM.to_string(),
        typ: "JWT".to_string(),
    };
    let header = serde_json::to_vec(&header).map_err(|e| TokenCodecError::Serialize(e.to_string()))?;
    let payload =
        serde_json::to_vec(claims).map_err(|e| TokenCodecError::Serialize(e.to_string()))?;

    let signing_input = format!("{}.{}", to_base64url(&header), to_base64url(&payload));
    let signature = hmac_sha256(secret, signing_input.as_bytes());

    Ok(format!("{}.{}", signing_input, to_base64url(&signature)))
}

/// Verify signature and expiry, then return the claims.
pub fn decode(
    token: &str,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<TokenClaims, TokenCodecError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenCodecError::Malformed);
    };

    let header: Header = from_base64url(header_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(TokenCodecError::Malformed)?;
    if header.alg != ALGORITHM {
        return Err(TokenCodecError::UnsupportedAlgorithm(header.alg));
    }

    let signature = from_base64url(signature_b64).map_err(|_| TokenCodecError::Malformed)?;
    let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
    if !verify_hmac_sha256(secret, signing_input.as_bytes(), &signature) {
        return Err(TokenCodecError::BadSignature);
    }

    let claims: TokenClaims = from_base64url(payload_b64)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(TokenCodecError::Malformed)?;

    if claims.is_expired_at(now) {
        return Err(TokenCodecError::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(now: DateTime<Utc>, ttl_secs: i64) -> TokenClaims {
        TokenClaims {
            uid: UserId::new(1),
            name: "admin".to_string(),
            jti: "b0c1".to_string(),
            iat: now.timestamp(),
            exp: now.timestamp() + ttl_secs,
            iss: "Dash".to_string(),
        }
    }

    #[test]
    fn test_encode_then_decode() {
        let now = Utc::now();
        let token = encode(&claims(now, 900), b"secret").unwrap();
        assert_eq!(token.split('.').count(), 3);

        let decoded = decode(&token, b"secret", now).unwrap();
        assert_eq!(decoded, claims(now, 900));
    }

    #[test]
    fn test_header_is_hs256_jwt() {
        let token = encode(&claims(Utc::now(), 900), b"secret").unwrap();
        let header_b64 = token.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&from_base64url(header_b64).unwrap()).unwrap();
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = encode(&claims(now, 900), b"access").unwrap();
        assert_eq!(
            decode(&token, b"refresh", now),
            Err(TokenCodecError::BadSignature)
        );
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let now = Utc::now();
        let token = encode(&claims(now, 900), b"secret").unwrap();
        assert_eq!(
            decode(&token, b"secret", now + Duration::seconds(900)),
            Err(TokenCodecError::Expired)
        );
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let now = Utc::now();
        let token = encode(&claims(now, 900), b"secret").unwrap();
        let mut forged = claims(now, 900);
        forged.uid = UserId::new(2);
        let forged_payload = to_base64url(&serde_json::to_vec(&forged).unwrap());

        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(
            decode(&tampered, b"secret", now),
            Err(TokenCodecError::BadSignature)
        );
    }

    #[test]
    fn test_other_algorithms_are_rejected() {
        let now = Utc::now();
        let header = to_base64url(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = to_base64url(&serde_json::to_vec(&claims(now, 900)).unwrap());
        let token = format!("{header}.{payload}.");
        assert_eq!(
            decode(&token, b"secret", now),
            Err(TokenCodecError::UnsupportedAlgorithm("none".to_string()))
        );
    }

    #[test]
    fn test_garbage_is_malformed() {
        let now = Utc::now();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert_eq!(
                decode(token, b"secret", now),
                Err(TokenCodecError::Malformed),
                "{token:?}"
            );
        }
    }

    #[test]
    fn test_kind_display_is_store_namespace() {
        assert_eq!(TokenKind::Access.to_string(), "access");
        assert_eq!(TokenKind::Refresh.to_string(), "refresh");
    }
}
