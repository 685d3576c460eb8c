//! Token authentication: `Authorization: Token <t>` or `Authorization: Bearer <t>`.

use crate::error::AppError;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;

/// Accepted `Authorization` schemes, compared case-insensitively.
pub const TOKEN_SCHEMES: [&str; 2] = ["Token", "Bearer"];

/// Tokens allowed to call the API. An empty set rejects every call.
#[derive(Clone, Debug, Default)]
pub struct TokenSet(HashSet<String>);

impl TokenSet {
    /// Parse a comma-separated list; blank entries are dropped.
    pub fn from_csv(s: &str) -> Self {
        TokenSet(
            s.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TokenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        TokenSet(iter.into_iter().map(Into::into).collect())
    }
}

/// Extract the credential from an `Authorization` header value.
pub fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() || token.contains(' ') {
        return None;
    }
    TOKEN_SCHEMES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme))
        .then_some(token)
}

/// Extractor for the optional credential carried by the request.
#[derive(Clone, Debug)]
pub struct AuthToken(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for AuthToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(token_from_header)
            .map(String::from);
        Ok(AuthToken(value))
    }
}

/// Middleware: reject requests whose token is missing or unknown before any handler runs.
pub async fn require_token(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match token {
        Some(t) if state.tokens.contains(&t) => Ok(next.run(request).await),
        Some(_) => {
            tracing::debug!(path = %request.uri().path(), "rejected unknown token");
            Err(AppError::Unauthorized("invalid token".into()))
        }
        None => Err(AppError::Unauthorized(
            "authentication credentials were not provided".into(),
        )),
    }
}
