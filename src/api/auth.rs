//! Dashboard login and bearer-token check.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::routes::AppState;
use super::types::{LoginRequest, LoginResponse};

const SUBJECT: &str = "dashboard";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// Issue a signed token valid for `ttl_days`.
fn issue_token(secret: &str, ttl_days: i64) -> Result<(String, i64), jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let exp = (now + chrono::Duration::days(ttl_days)).timestamp();
    let claims = Claims {
        sub: SUBJECT.to_string(),
        iat: now.timestamp(),
        exp,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok((token, exp))
}

fn verify_token(secret: &str, token: &str) -> bool {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims.sub == SUBJECT)
        .unwrap_or(false)
}

/// Constant-time string comparison.
fn secure_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let auth = &state.config.auth;
    let (Some(password), Some(secret)) = (&auth.dashboard_password, &auth.jwt_secret) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "Dashboard login is not configured".to_string(),
        ));
    };

    if !secure_eq(req.password.trim(), password) {
        tracing::warn!("Rejected dashboard login");
        return Err((StatusCode::UNAUTHORIZED, "Invalid password".to_string()));
    }

    let (token, exp) = issue_token(secret, auth.jwt_ttl_days)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(LoginResponse { token, exp }))
}

/// Reject requests without a valid bearer token, unless auth is off.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let auth = &state.config.auth;
    if !auth.auth_required(state.config.dev_mode) {
        return next.run(req).await;
    }

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match (token, auth.jwt_secret.as_deref()) {
        (Some(token), Some(secret)) if verify_token(secret, token) => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            "Invalid or missing authorization".to_string(),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_tokens_verify_with_the_same_secret_only() {
        let (token, exp) = issue_token("s3cret", 7).unwrap();
        assert!(exp > chrono::Utc::now().timestamp());
        assert!(verify_token("s3cret", &token));
        assert!(!verify_token("other", &token));
        assert!(!verify_token("s3cret", "not-a-jwt"));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let (token, _) = issue_token("s3cret", -2).unwrap();
        assert!(!verify_token("s3cret", &token));
    }

    #[test]
    fn secure_eq_compares_whole_strings() {
        assert!(secure_eq("hunter2", "hunter2"));
        assert!(!secure_eq("hunter2", "hunter3"));
        assert!(!secure_eq("hunter", "hunter2"));
    }
}
