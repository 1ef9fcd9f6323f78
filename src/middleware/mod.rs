// Authentication and CORS middleware

use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tower_http::cors::{Any, CorsLayer};

use crate::error::ApiError;
use crate::routes::AppState;

/// Pull the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Authentication middleware
///
/// Verifies the bearer token in the Authorization header and stores the
/// decoded `Claims` in the request extensions for handlers to read.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned);

    let Some(token) = token else {
        tracing::warn!(
            "Request without bearer token: {} {}",
            request.method(),
            request.uri().path()
        );
        return Err(ApiError::AuthError("Missing bearer token".to_string()));
    };

    let claims = state.tokens.verify(&token)?;
    tracing::debug!(
        "Authenticated {} for {} {}",
        claims.user.user_name,
        request.method(),
        request.uri().path()
    );
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Create CORS middleware layer
///
/// Configures CORS to allow all origins, methods, and headers.
/// Handles OPTIONS preflight requests automatically.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
