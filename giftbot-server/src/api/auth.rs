// Single admin account: bcrypt password check, HS256 bearer tokens.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use giftbot_core::Error;
use crate::config::AdminConfig;
use super::response::ApiError;
use super::ApiState;

pub const TOKEN_ISSUER: &str = "giftbot-admin";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct AdminAuth {
    username: String,
    password_hash: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_duration: Duration,
}

impl AdminAuth {
    pub fn new(config: &AdminConfig) -> Self {
        Self {
            username: config.username.clone(),
            password_hash: config.password_hash.clone(),
            encoding_key: EncodingKey::from_secret(config.token_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.token_secret.as_bytes()),
            token_duration: Duration::seconds(config.token_duration_secs),
        }
    }

    /// Check credentials and issue a token with its expiry.
    pub fn login(&self, username: &str, password: &str) -> Result<(String, DateTime<Utc>), Error> {
        if username != self.username {
            return Err(Error::Auth("invalid username or password".into()));
        }
        let matches = bcrypt::verify(password, &self.password_hash)
            .map_err(|e| Error::Internal(format!("bcrypt verify failed: {}", e)))?;
        if !matches {
            return Err(Error::Auth("invalid username or password".into()));
        }

        let now = Utc::now();
        let expires_at = now + self.token_duration;
        let claims = Claims {
            sub: self.username.clone(),
            iss: TOKEN_ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("token signing failed: {}", e)))?;
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[TOKEN_ISSUER]);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| Error::Auth(format!("invalid or expired token: {}", e)))
    }
}

/// Rejects requests without a valid `Authorization: Bearer <token>`.
pub async fn require_admin(
    State(state): State<ApiState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth) = state.auth.as_ref() else {
        return Err(ApiError::unauthorized("admin API is disabled"));
    };

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Some(token) = header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty()) else {
        warn!("Missing or malformed authorization header on {}", req.uri().path());
        return Err(ApiError::unauthorized("missing bearer token"));
    };

    match auth.verify(token) {
        Ok(claims) => {
            debug!("Admin '{}' authorized for {}", claims.sub, req.uri().path());
            Ok(next.run(req).await)
        }
        Err(e) => {
            warn!("Token rejected on {}: {}", req.uri().path(), e);
            Err(ApiError::unauthorized("invalid or expired token"))
        }
    }
}
