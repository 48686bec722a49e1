// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{FromRef, FromRequestParts, State},
    http::{Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, PRIVILEGED_ROLE},
    error::AppError,
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// User's role (e.g., 'student', 'admin').
    pub role: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// The caller as seen by the exam services: who they are and their role.
/// Authentication itself happens upstream; this only trusts a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub role: String,
}

impl Identity {
    pub fn new(user_id: i64, role: &str) -> Self {
        Self {
            user_id,
            role: role.to_string(),
        }
    }

    pub fn is_privileged(&self) -> bool {
        self.role == PRIVILEGED_ROLE
    }
}

impl TryFrom<Claims> for Identity {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))?;
        Ok(Self {
            user_id,
            role: claims.role,
        })
    }
}

/// Signs a new JWT for the user.
pub fn sign_jwt(
    id: i64,
    role: &str,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(),
        role: role.to_owned(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid, otherwise returns an `AppError`.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

fn identity_from_headers(parts: &Parts, secret: &str) -> Result<Identity, AppError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => return Err(AppError::AuthError("Missing bearer token".to_string())),
    };

    Identity::try_from(verify_jwt(token, secret)?)
}

/// Extractor: reuses the identity injected by `auth_middleware`, or
/// validates the 'Authorization: Bearer <token>' header itself.
impl<S> FromRequestParts<S> for Identity
where
    Config: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        let config = Config::from_ref(state);
        identity_from_headers(parts, &config.jwt_secret)
    }
}

/// Axum Middleware: Authentication.
///
/// Intercepts requests, validates the bearer token and injects the `Identity`
/// into the request extensions. Invalid tokens get 401 Unauthorized.
pub async fn auth_middleware(
    State(config): State<Config>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let (mut parts, body) = req.into_parts();

    match identity_from_headers(&parts, &config.jwt_secret) {
        Ok(identity) => {
            parts.extensions.insert(identity);
            Ok(next.run(Request::from_parts(parts, body)).await)
        }
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. Checks that the injected `Identity`
/// holds the privileged role. If not, returns 403 Forbidden.
pub async fn admin_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if !identity.is_privileged() {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(req).await)
}
