//! Authentication middleware for the admin surface

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::state::AppState;

/// Guards /admin routes. Requests must carry `Authorization: Bearer <token>`
/// matching ADMIN_AUTH_TOKEN; with no token configured the surface is closed.
pub async fn admin_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.admin_token.as_deref() else {
        warn!("Admin request rejected: no ADMIN_AUTH_TOKEN configured");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let token = extract_bearer_token(&headers)?;
    if token != expected {
        warn!("Admin request rejected: invalid token");
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

/// Extract Bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let auth_header = headers
        .get("authorization")
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)
}
