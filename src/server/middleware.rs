use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;

use super::AppState;

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// JWT authentication middleware for trigger and recipient routes.
pub async fn jwt_auth(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = extract_bearer_token(&req) else {
        return Err(AppError::Auth("Missing bearer token".to_string()));
    };

    state.jwt_validator.validate(token)?;

    Ok(next.run(req).await)
}
