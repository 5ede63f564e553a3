//! Auth gate requiring both credentials on every request.

use std::pin::Pin;

use tracing::warn;

use super::AuthError;
use super::token::{Identity, TokenValidator, constant_time_eq};
use crate::{
    Response, StatusCode,
    context::Context,
    http::Headers,
    middleware::{Middleware, Next},
};

/// Headers searched for the bearer token, in order. `token` is the legacy
/// bare-token header used by older clients.
pub const TOKEN_HEADERS: &[&str] = &["authorization", "token"];

/// Headers searched for the API key, in order.
pub const API_KEY_HEADERS: &[&str] = &["x-api-key", "api_key"];

/// Checks the static API key.
pub struct ApiKeyValidator {
    expected: String,
}

impl ApiKeyValidator {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    pub fn validate(&self, key: &str) -> Result<(), AuthError> {
        if constant_time_eq(key.as_bytes(), self.expected.as_bytes()) {
            Ok(())
        } else {
            Err(AuthError::InvalidApiKey)
        }
    }
}

/// Middleware requiring a valid bearer token *and* a valid API key.
///
/// Both checks run on every request regardless of the other's outcome. On
/// success the caller's [`Identity`] is stored in the context extensions;
/// on failure the chain stops with `401 Unauthorized`.
pub struct AuthGate {
    tokens: TokenValidator,
    api_keys: ApiKeyValidator,
}

impl AuthGate {
    pub fn new(tokens: TokenValidator, api_keys: ApiKeyValidator) -> Self {
        Self { tokens, api_keys }
    }

    /// Validates the credentials carried in `headers`.
    pub fn authorize(&self, headers: &Headers) -> Result<Identity, AuthError> {
        let identity = match headers.first_of(TOKEN_HEADERS).map(bearer_token) {
            Some(token) if !token.is_empty() => self.tokens.validate(token),
            _ => Err(AuthError::MissingToken),
        };
        let api_key = match headers.first_of(API_KEY_HEADERS).map(str::trim) {
            Some(key) if !key.is_empty() => self.api_keys.validate(key),
            _ => Err(AuthError::MissingApiKey),
        };

        api_key?;
        identity
    }
}

// Accepts `Bearer <token>` (any case) or a bare token.
fn bearer_token(value: &str) -> &str {
    let value = value.trim();
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        None if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    }
}

impl Middleware for AuthGate {
    fn handle(
        &self,
        mut ctx: Context,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let outcome = self.authorize(ctx.request().headers());

        Box::pin(async move {
            match outcome {
                Ok(identity) => {
                    ctx.extensions_mut().insert(identity);
                    next.run(ctx).await
                }
                Err(e) => {
                    warn!(path = %ctx.request().path(), reason = %e, "request rejected");
                    Response::detail(StatusCode::Unauthorized, e.to_string())
                        .header("WWW-Authenticate", "Bearer")
                }
            }
        })
    }
}
