//! Caller authentication with bearer tokens and a static API key.
//!
//! - [`TokenIssuer`] signs HS256 access tokens for `POST /login`.
//! - [`TokenValidator`] and [`ApiKeyValidator`] each check one credential.
//! - [`AuthGate`] runs both on every guarded request and rejects with `401`
//!   unless both pass. It is a [`Middleware`](crate::middleware::Middleware),
//!   so a rejected request never reaches the route handler.

mod gate;
mod token;

pub use gate::{API_KEY_HEADERS, ApiKeyValidator, AuthGate, TOKEN_HEADERS};
pub use token::{Claims, Identity, TokenIssuer, TokenValidator};

use thiserror::Error;

/// Authorization failures. Every variant maps to `401 Unauthorized`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid bearer token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("missing API key")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("incorrect username or password")]
    BadLogin,

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}
