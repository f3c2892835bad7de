use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AuthError;
use crate::config::SecurityConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a string, per JWT convention
    pub sub: String,
    pub user_id: i64,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Identity encoded into a fresh token
#[derive(Debug, Clone, Copy)]
pub struct TokenSubject<'a> {
    pub user_id: i64,
    pub username: &'a str,
    pub email: &'a str,
    pub full_name: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until expiry
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
}

/// HS256 signing and verification keys plus the token lifetime.
#[derive(Clone)]
pub struct JwtKeys {
    inner: Arc<KeysInner>,
}

struct KeysInner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiry: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, expiry_minutes: i64) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            inner: Arc::new(KeysInner {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
                validation,
                expiry: Duration::minutes(expiry_minutes),
            }),
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, AuthError> {
        Self::new(&security.jwt_secret, security.jwt_expiry_minutes)
    }

    pub fn issue(&self, subject: TokenSubject<'_>) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let expires_at = now + self.inner.expiry;
        let claims = Claims {
            sub: subject.user_id.to_string(),
            user_id: subject.user_id,
            username: subject.username.to_string(),
            email: subject.email.to_string(),
            full_name: subject.full_name.map(str::to_string),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.inner.encoding)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: "bearer",
            expires_in: self.inner.expiry.num_seconds(),
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.inner.decoding, &self.inner.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = data.claims;
        if claims.sub != claims.user_id.to_string() {
            return Err(AuthError::InvalidToken("subject does not match user id".to_string()));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> TokenSubject<'static> {
        TokenSubject {
            user_id: 42,
            username: "alice",
            email: "alice@example.com",
            full_name: Some("Alice Liddell"),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let keys = JwtKeys::new("secret", 30).unwrap();
        let issued = keys.issue(subject()).unwrap();
        assert_eq!(issued.token_type, "bearer");
        assert_eq!(issued.expires_in, 30 * 60);

        let claims = keys.verify(&issued.access_token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.full_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(JwtKeys::new("", 30), Err(AuthError::InvalidSecret)));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let issued = JwtKeys::new("one", 30).unwrap().issue(subject()).unwrap();
        let other = JwtKeys::new("two", 30).unwrap();
        assert!(matches!(other.verify(&issued.access_token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        // Well past the default 60s leeway
        let keys = JwtKeys::new("secret", -10).unwrap();
        let issued = keys.issue(subject()).unwrap();
        assert!(matches!(keys.verify(&issued.access_token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let keys = JwtKeys::new("secret", 30).unwrap();
        assert!(matches!(keys.verify("not.a.token"), Err(AuthError::InvalidToken(_))));
    }
}
