//! HS256 access tokens.

use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    pub iat: u64,
}

/// The caller resolved from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

/// Validates bearer tokens: signature, algorithm, and expiry.
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map_err(AuthError::InvalidToken)?;
        Ok(Identity {
            subject: data.claims.sub,
        })
    }
}

/// Exchanges the configured login for signed access tokens.
pub struct TokenIssuer {
    key: EncodingKey,
    lifetime: Duration,
    username: String,
    password: String,
}

impl TokenIssuer {
    pub fn new(
        secret: &str,
        lifetime: Duration,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            lifetime,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Checks a username/password pair and returns a token for it.
    pub fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user_ok = constant_time_eq(username.as_bytes(), self.username.as_bytes());
        let pass_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        if !(user_ok && pass_ok) {
            return Err(AuthError::BadLogin);
        }
        self.issue(username)
    }

    /// Signs a token for `subject` expiring after the configured lifetime.
    pub fn issue(&self, subject: &str) -> Result<String, AuthError> {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            sub: subject.to_owned(),
            iat: now,
            exp: now + self.lifetime.as_secs(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(AuthError::Signing)
    }
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "secret";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Duration::from_secs(30 * 60), "admin", "admin")
    }

    #[test]
    fn issued_token_validates_to_subject() {
        let token = issuer().login("admin", "admin").unwrap();
        let identity = TokenValidator::new(SECRET).validate(&token).unwrap();
        assert_eq!(identity.subject, "admin");
    }

    #[test]
    fn wrong_password_is_rejected() {
        assert!(matches!(
            issuer().login("admin", "hunter2"),
            Err(AuthError::BadLogin)
        ));
        assert!(matches!(
            issuer().login("root", "admin"),
            Err(AuthError::BadLogin)
        ));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = TokenIssuer::new("other", Duration::from_secs(60), "admin", "admin")
            .issue("admin")
            .unwrap();
        assert!(matches!(
            TokenValidator::new(SECRET).validate(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = jsonwebtoken::get_current_timestamp();
        let claims = Claims {
            sub: "admin".into(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            TokenValidator::new(SECRET).validate(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(TokenValidator::new(SECRET).validate("not.a.jwt").is_err());
    }

    #[test]
    fn constant_time_eq_compares_bytes() {
        assert!(constant_time_eq(b"demo-key", b"demo-key"));
        assert!(!constant_time_eq(b"demo-key", b"demo-kez"));
        assert!(!constant_time_eq(b"demo", b"demo-key"));
    }
}
