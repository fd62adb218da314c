use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::BusinessId;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Expired token")]
    Expired,
    #[error("Invalid credentials")]
    Invalid,
    #[error("Could not issue token: {0}")]
    Issue(String),
}

/// Signs and verifies business session tokens (HS256).
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, business_id: BusinessId) -> Result<String, SessionError> {
        let now = Utc::now();
        let claims = Claims {
            sub: business_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| SessionError::Issue(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<BusinessId, SessionError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default()).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Invalid,
            },
        )?;
        data.claims.sub.parse().map_err(|_| SessionError::Invalid)
    }
}

fn bearer_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The business a request was authenticated as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedBusiness(pub BusinessId);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedBusiness {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing credentials".to_string()))?;
        let token = header
            .to_str()
            .ok()
            .and_then(bearer_token)
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        state
            .sessions
            .verify(token)
            .map(AuthenticatedBusiness)
            .map_err(|e| AppError::Unauthorized(e.to_string()))
    }
}

/// Guards admin routes with the configured API key. Without a configured
/// key every admin request is refused.
pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next<Body>,
) -> Result<Response, StatusCode> {
    let expected = match state.admin_api_key.as_deref() {
        Some(key) => key,
        None => {
            tracing::warn!("Admin request refused: ADMIN_API_KEY is not configured");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match auth_header {
        Some(auth) if bearer_token(auth) == Some(expected) || auth == expected => {
            Ok(next.run(req).await)
        }
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
