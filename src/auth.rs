//! Session gate: turns an inbound request into an optional authenticated user.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::routes::AppState;

pub const SESSION_COOKIE: &str = "session_token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: SessionUser,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// Resolves the session attached to a request, if any.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<Session>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    exp: i64,
}

/// HS256 session tokens, read from a bearer header or the session cookie.
pub struct JwtSessionVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtSessionVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Signs a session token for `user_id` valid for `ttl`.
    pub fn issue(
        &self,
        user_id: &str,
        email: Option<&str>,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            exp: (Utc::now() + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    fn verify_token(&self, token: &str) -> Option<Session> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) if !data.claims.sub.is_empty() => Some(Session {
                user: SessionUser { id: data.claims.sub, email: data.claims.email },
            }),
            Ok(_) => None,
            Err(e) => {
                debug!("Rejected session token: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl SessionVerifier for JwtSessionVerifier {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<Session> {
        let token = bearer_token(headers).or_else(|| cookie_value(headers, SESSION_COOKIE))?;
        self.verify_token(&token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

fn cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name.trim() == cookie_name).then(|| value.trim().to_string())
        })
}

impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state.sessions.authenticate(&parts.headers).await.ok_or(AppError::Unauthorized)
    }
}
