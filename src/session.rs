use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use thiserror::Error;
use uuid::Uuid;

use crate::{config::AppConfig, error::AppError};

/// Name of the cookie carrying the signed session.
pub const SESSION_COOKIE: &str = "resto_session";

/// Sessions live for a week after their last write.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("failed to sign session: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),

    #[error("session cookie is not a valid header value")]
    Header(#[from] axum::http::header::InvalidHeaderValue),
}

/// Flash
///
/// One-shot messages shown on the next rendered page, split by channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Flash {
    #[serde(default)]
    pub success: Vec<String>,
    #[serde(default)]
    pub error: Vec<String>,
}

impl Flash {
    pub fn is_empty(&self) -> bool {
        self.success.is_empty() && self.error.is_empty()
    }
}

/// SessionClaims
///
/// The signed payload stored in the session cookie.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The logged-in user, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    /// Path to return to after a successful login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_to: Option<String>,
    #[serde(default, skip_serializing_if = "Flash::is_empty")]
    pub flash: Flash,
    pub exp: usize,
    pub iat: usize,
}

/// Session
///
/// The per-request session context. Handlers receive it as an extractor,
/// mutate it (log in, queue a flash message, record `return_to`) and hand it
/// back as part of their response, which re-signs it into the cookie.
///
/// A missing, tampered or expired cookie yields an empty session; it is never
/// an error.
#[derive(Clone)]
pub struct Session {
    claims: SessionClaims,
    secret: String,
}

impl Session {
    pub fn new(secret: &str) -> Self {
        Self {
            claims: SessionClaims::default(),
            secret: secret.to_string(),
        }
    }

    /// Restores a session from a cookie token, falling back to an empty one.
    pub fn from_token(token: &str, secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        match decode::<SessionClaims>(token, &decoding_key, &validation) {
            Ok(data) => Self {
                claims: data.claims,
                secret: secret.to_string(),
            },
            Err(e) => {
                tracing::debug!("discarding session cookie: {}", e);
                Self::new(secret)
            }
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.claims.uid
    }

    pub fn log_in(&mut self, user_id: Uuid) {
        self.claims.uid = Some(user_id);
    }

    pub fn log_out(&mut self) {
        self.claims.uid = None;
        self.claims.return_to = None;
    }

    pub fn set_return_to(&mut self, path: impl Into<String>) {
        self.claims.return_to = Some(path.into());
    }

    pub fn take_return_to(&mut self) -> Option<String> {
        self.claims.return_to.take()
    }

    pub fn flash_success(&mut self, message: impl Into<String>) {
        self.claims.flash.success.push(message.into());
    }

    pub fn flash_error(&mut self, message: impl Into<String>) {
        self.claims.flash.error.push(message.into());
    }

    /// Drains both flash queues; a message is shown exactly once.
    pub fn take_flash(&mut self) -> Flash {
        std::mem::take(&mut self.claims.flash)
    }

    /// Signs the session into a cookie token, refreshing its expiry.
    pub fn to_token(&self) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = SessionClaims {
            iat: now.timestamp() as usize,
            exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
            ..self.claims.clone()
        };
        let encoding_key = EncodingKey::from_secret(self.secret.as_bytes());
        Ok(encode(&Header::default(), &claims, &encoding_key)?)
    }

    fn to_cookie(&self) -> Result<HeaderValue, SessionError> {
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            self.to_token()?,
            Duration::days(SESSION_TTL_DAYS).num_seconds()
        );
        Ok(HeaderValue::from_str(&cookie)?)
    }
}

/// Finds the session token among the request's `Cookie` headers.
fn session_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(match session_token(parts) {
            Some(token) => Session::from_token(token, &config.session_secret),
            None => Session::new(&config.session_secret),
        })
    }
}

impl IntoResponseParts for Session {
    type Error = AppError;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let cookie = self.to_cookie()?;
        res.headers_mut().append(header::SET_COOKIE, cookie);
        Ok(res)
    }
}
