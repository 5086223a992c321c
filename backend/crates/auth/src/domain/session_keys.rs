//! Key-value store layout for sessions
//!
//! | key                    | value     | lifetime          |
//! |------------------------|-----------|-------------------|
//! | `access:<token>`       | user ID   | access token TTL  |
//! | `access:user:<id>`     | token     | access token TTL  |
//! | `refresh:<token>`      | user ID   | refresh token TTL |
//! | `refresh:user:<id>`    | token     | refresh token TTL |
//! | `ott:<token>`          | URL path  | one-time TTL      |
//!
//! Forward (token to user) and reverse (user to token) entries of one kind
//! are always written and removed together.

use kernel::id::UserId;
use platform::kv::CacheKey;

use super::token::TokenKind;

/// Namespace prefix for forward entries of `kind`; the reverse entry's
/// value appended to it gives the forward key.
pub fn forward_prefix(kind: TokenKind) -> String {
    format!("{kind}:")
}

/// `<kind>:<token>` to user ID
pub struct TokenKey<'a> {
    pub kind: TokenKind,
    pub token: &'a str,
}

impl CacheKey for TokenKey<'_> {
    type Value = i32;

    fn key(&self) -> String {
        format!("{}{}", forward_prefix(self.kind), self.token)
    }
}

/// `<kind>:user:<id>` to token
pub struct UserTokenKey {
    pub kind: TokenKind,
    pub user_id: UserId,
}

impl CacheKey for UserTokenKey {
    type Value = String;

    fn key(&self) -> String {
        format!("{}:user:{}", self.kind, self.user_id)
    }
}

/// `ott:<token>` to the URL path the token unlocks
pub struct OneTimeTokenKey<'a>(pub &'a str);

impl CacheKey for OneTimeTokenKey<'_> {
    type Value = String;

    fn key(&self) -> String {
        format!("ott:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let forward = TokenKey {
            kind: TokenKind::Access,
            token: "abc",
        };
        assert_eq!(forward.key(), "access:abc");

        let reverse = UserTokenKey {
            kind: TokenKind::Refresh,
            user_id: UserId::new(9),
        };
        assert_eq!(reverse.key(), "refresh:user:9");

        assert_eq!(OneTimeTokenKey("f00").key(), "ott:f00");
    }

    #[test]
    fn test_prefix_plus_reverse_value_is_forward_key() {
        let token = "h.p.s";
        let forward = TokenKey {
            kind: TokenKind::Refresh,
            token,
        };
        assert_eq!(
            format!("{}{}", forward_prefix(TokenKind::Refresh), token),
            forward.key()
        );
    }
}
