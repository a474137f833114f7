//! JWT token generation and validation.
//!
//! Verification is three-way: a token is either valid, expired (signature
//! intact, lifetime elapsed) or invalid. Only the expired case is allowed to
//! fall through to the refresh path.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::User;

/// Access token duration: 15 minutes
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 15 * 60;

/// Refresh token duration: 7 days
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Identity claim carried by both token kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived access token - stateless, no JTI
    Access,
    /// Long-lived refresh token - anchored in the token store, carries a JTI
    Refresh,
}

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,
    /// Username
    pub username: String,
    /// Admin flag
    pub admin: bool,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// JWT ID, only present on refresh tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl TokenClaims {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            username: self.username.clone(),
            is_admin: self.admin,
        }
    }
}

/// Outcome of verifying a token.
#[derive(Debug, Clone)]
pub enum TokenStatus {
    Valid(TokenClaims),
    /// Signature is intact but the lifetime has elapsed.
    Expired,
    /// Bad signature, malformed, or wrong token type.
    Invalid,
}

impl TokenStatus {
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenStatus::Expired)
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Configuration for JWT operations.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue_access(&self, identity: &Identity) -> Result<IssuedToken, JwtError> {
        self.issue_access_at(identity, now_secs()?)
    }

    pub fn issue_refresh(&self, identity: &Identity) -> Result<IssuedToken, JwtError> {
        self.issue_refresh_at(identity, now_secs()?)
    }

    pub fn issue_access_at(&self, identity: &Identity, now: u64) -> Result<IssuedToken, JwtError> {
        self.issue(identity, TokenType::Access, None, now, ACCESS_TOKEN_DURATION_SECS)
    }

    /// Refresh tokens get a random JTI so that two tokens issued to the same
    /// user in the same second still hash differently.
    pub fn issue_refresh_at(&self, identity: &Identity, now: u64) -> Result<IssuedToken, JwtError> {
        let jti = uuid::Uuid::new_v4().to_string();
        self.issue(
            identity,
            TokenType::Refresh,
            Some(jti),
            now,
            REFRESH_TOKEN_DURATION_SECS,
        )
    }

    fn issue(
        &self,
        identity: &Identity,
        token_type: TokenType,
        jti: Option<String>,
        now: u64,
        duration: u64,
    ) -> Result<IssuedToken, JwtError> {
        let exp = now + duration;

        let claims = TokenClaims {
            sub: identity.id.clone(),
            username: identity.username.clone(),
            admin: identity.is_admin,
            token_type,
            jti,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at: exp,
            duration,
        })
    }

    pub fn verify_access(&self, token: &str) -> TokenStatus {
        match now_secs() {
            Ok(now) => self.verify_access_at(token, now),
            Err(_) => TokenStatus::Invalid,
        }
    }

    pub fn verify_refresh(&self, token: &str) -> TokenStatus {
        match now_secs() {
            Ok(now) => self.verify_refresh_at(token, now),
            Err(_) => TokenStatus::Invalid,
        }
    }

    pub fn verify_access_at(&self, token: &str, now: u64) -> TokenStatus {
        self.verify(token, TokenType::Access, now)
    }

    pub fn verify_refresh_at(&self, token: &str, now: u64) -> TokenStatus {
        self.verify(token, TokenType::Refresh, now)
    }

    fn verify(&self, token: &str, expected: TokenType, now: u64) -> TokenStatus {
        // Expiry is checked against the caller's clock below, after the
        // signature has been verified.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = match jsonwebtoken::decode::<TokenClaims>(
            token,
            &self.decoding_key,
            &validation,
        ) {
            Ok(data) => data.claims,
            Err(_) => return TokenStatus::Invalid,
        };

        if claims.token_type != expected {
            return TokenStatus::Invalid;
        }

        if claims.exp <= now {
            return TokenStatus::Expired;
        }

        TokenStatus::Valid(claims)
    }
}

/// One-way hash of a raw token, used as the token store key.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Current Unix time in seconds.
pub fn now_secs() -> Result<u64, JwtError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| JwtError::TimeError)
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("System time error")]
    TimeError,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Identity {
        Identity {
            id: "user-1".to_string(),
            username: "10001".to_string(),
            is_admin: false,
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let issued = config.issue_access_at(&alice(), 1_000).unwrap();
        assert_eq!(issued.duration, ACCESS_TOKEN_DURATION_SECS);
        assert_eq!(issued.expires_at, 1_000 + ACCESS_TOKEN_DURATION_SECS);

        match config.verify_access_at(&issued.token, 1_000 + 60) {
            TokenStatus::Valid(claims) => {
                assert_eq!(claims.identity(), alice());
                assert_eq!(claims.token_type, TokenType::Access);
                assert!(claims.jti.is_none());
            }
            other => panic!("expected valid token, got {:?}", other),
        }
    }

    #[test]
    fn test_access_token_expires_after_fifteen_minutes() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");
        let issued = config.issue_access_at(&alice(), 1_000).unwrap();

        let just_before = 1_000 + ACCESS_TOKEN_DURATION_SECS - 1;
        assert!(matches!(
            config.verify_access_at(&issued.token, just_before),
            TokenStatus::Valid(_)
        ));

        let after = 1_000 + ACCESS_TOKEN_DURATION_SECS + 1;
        assert!(config.verify_access_at(&issued.token, after).is_expired());
    }

    #[test]
    fn test_refresh_token_lives_seven_days() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");
        let issued = config.issue_refresh_at(&alice(), 1_000).unwrap();

        assert_eq!(issued.duration, REFRESH_TOKEN_DURATION_SECS);

        let six_days = 1_000 + 6 * 24 * 60 * 60;
        match config.verify_refresh_at(&issued.token, six_days) {
            TokenStatus::Valid(claims) => {
                assert_eq!(claims.token_type, TokenType::Refresh);
                assert!(claims.jti.is_some());
            }
            other => panic!("expected valid token, got {:?}", other),
        }

        let eight_days = 1_000 + 8 * 24 * 60 * 60;
        assert!(config.verify_refresh_at(&issued.token, eight_days).is_expired());
    }

    #[test]
    fn test_wrong_token_type_is_invalid() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let access = config.issue_access_at(&alice(), 1_000).unwrap();
        let refresh = config.issue_refresh_at(&alice(), 1_000).unwrap();

        assert!(matches!(
            config.verify_refresh_at(&access.token, 1_001),
            TokenStatus::Invalid
        ));
        assert!(matches!(
            config.verify_access_at(&refresh.token, 1_001),
            TokenStatus::Invalid
        ));
    }

    #[test]
    fn test_tampered_token_is_invalid_not_expired() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");
        let issued = config.issue_access_at(&alice(), 1_000).unwrap();
        let admin = Identity {
            is_admin: true,
            ..alice()
        };
        let escalated = config.issue_access_at(&admin, 1_000).unwrap();

        // Splice the admin payload onto the original signature.
        let (escalated_body, _) = escalated.token.rsplit_once('.').unwrap();
        let (_, signature) = issued.token.rsplit_once('.').unwrap();
        let tampered = format!("{}.{}", escalated_body, signature);

        // Even long after expiry, tampering wins over expiry.
        let later = 1_000 + ACCESS_TOKEN_DURATION_SECS * 10;
        assert!(matches!(
            config.verify_access_at(&tampered, later),
            TokenStatus::Invalid
        ));
        assert!(matches!(
            config.verify_access_at("invalid-token", 1_001),
            TokenStatus::Invalid
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(b"secret-1");
        let config2 = JwtConfig::new(b"secret-2");

        let issued = config1.issue_access_at(&alice(), 1_000).unwrap();
        assert!(matches!(
            config2.verify_access_at(&issued.token, 1_001),
            TokenStatus::Invalid
        ));
    }

    #[test]
    fn test_admin_flag_in_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");
        let admin = Identity {
            is_admin: true,
            ..alice()
        };

        let issued = config.issue_access(&admin).unwrap();
        match config.verify_access(&issued.token) {
            TokenStatus::Valid(claims) => assert!(claims.admin),
            other => panic!("expected valid token, got {:?}", other),
        }
    }

    #[test]
    fn test_unique_hash_per_refresh_token() {
        let config = JwtConfig::new(b"test-secret-key-for-testing");

        let first = config.issue_refresh_at(&alice(), 1_000).unwrap();
        let second = config.issue_refresh_at(&alice(), 1_000).unwrap();

        assert_ne!(first.token, second.token);
        assert_ne!(hash_token(&first.token), hash_token(&second.token));
    }

    #[test]
    fn test_token_hash_is_deterministic_hex() {
        let h1 = hash_token("same-token");
        let h2 = hash_token("same-token");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
        assert!(h1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(h1, hash_token("different-token"));
    }
}
