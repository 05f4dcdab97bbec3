//! Admin session extraction from `Authorization: Bearer <jwt>`.

use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Key material and the role that grants access to invoice management.
#[derive(Clone)]
pub struct AuthConfig {
    decoding_key: DecodingKey,
    role: String,
}

impl AuthConfig {
    pub fn new(secret: &str, role: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            role: role.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    fn grants(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role) || self.roles.iter().any(|r| r == role)
    }
}

/// An authenticated administrator. Carries the raw token so it can be
/// forwarded to backend functions on the caller's behalf.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub subject: String,
    pub token: String,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn authenticate(req: &HttpRequest) -> Result<AdminSession, AppError> {
    let config = req
        .app_data::<web::Data<AuthConfig>>()
        .ok_or_else(|| AppError::Internal("AuthConfig is not registered".to_string()))?;

    let token = bearer_token(req)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<Claims>(token, &config.decoding_key, &validation).map_err(|e| {
        log::debug!("Rejected admin token: {}", e);
        AppError::Unauthorized("invalid or expired token".to_string())
    })?;

    if !data.claims.grants(&config.role) {
        log::warn!(
            "Subject {} attempted an admin action without the '{}' role",
            data.claims.sub,
            config.role
        );
        return Err(AppError::Forbidden);
    }

    Ok(AdminSession {
        subject: data.claims.sub,
        token: token.to_string(),
    })
}

impl FromRequest for AdminSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}
