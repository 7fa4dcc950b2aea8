// Authentication middleware for protected routes.
// Validates bearer tokens and injects AuthenticatedUser into extensions.

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::{app::AppState, middleware::auth::AuthenticatedUser};

pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "success": false,
                    "message": "Missing or invalid authorization header"
                })),
            )
                .into_response();
        },
    };

    match app_state.jwt_service.validate_access_token(token) {
        Ok(claims) => {
            let auth_user = AuthenticatedUser {
                username: claims.sub,
                token_id: claims.jti,
                email: claims.email,
                plan: claims.plan,
                exp: claims.exp,
            };
            request.extensions_mut().insert(auth_user);
            next.run(request).await
        },
        Err(e) => {
            tracing::warn!("Token validation failed: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "success": false,
                    "message": "Invalid or expired token"
                })),
            )
                .into_response()
        },
    }
}

/// Extractor so handlers can take AuthenticatedUser directly
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthenticatedUser>().cloned().ok_or((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "message": "Authentication required"
            })),
        ))
    }
}
