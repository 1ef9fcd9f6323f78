use axum::{
    extract::{FromRequest, Request, State},
    http::header,
    Extension, Form, Json,
};

use super::{blocking, AppState};
use crate::auth::{AuthToken, Claims, LoginRequest};
use crate::error::{ApiError, Result};

/// Read credentials from a JSON or form-encoded body
async fn read_credentials(request: Request) -> Option<LoginRequest> {
    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let parsed = if is_form {
        Form::<LoginRequest>::from_request(request, &())
            .await
            .map(|Form(credentials)| credentials)
            .map_err(|e| e.to_string())
    } else {
        Json::<LoginRequest>::from_request(request, &())
            .await
            .map(|Json(credentials)| credentials)
            .map_err(|e| e.to_string())
    };

    parsed
        .map_err(|e| tracing::debug!("Unreadable login body: {}", e))
        .ok()
}

/// POST /auth/login - Exchange credentials for a token
///
/// 400 when either field is missing or empty, 401 when the user is
/// unknown or the password does not match.
pub(super) async fn login_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<AuthToken>> {
    let request = read_credentials(request)
        .await
        .ok_or_else(|| ApiError::BadRequest("Missing credentials".to_string()))?;

    let (user_name, password) = match (request.user_name, request.password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => return Err(ApiError::BadRequest("Missing credentials".to_string())),
    };

    let record = state.store.find_user(&user_name)?;

    let passwords = state.passwords.clone();
    let stored_hash = record.as_ref().map(|r| r.password_hash.clone());
    let verified =
        blocking(move || passwords.verify(&password, stored_hash.as_deref())).await?;

    let record = match record {
        Some(record) if verified => record,
        _ => {
            tracing::warn!("Failed login attempt for {}", user_name);
            return Err(ApiError::AuthError(
                "Incorrect username or password".to_string(),
            ));
        }
    };

    let auth_token = state.tokens.issue(&record.user)?;
    tracing::info!("User {} logged in", record.user.user_name);

    Ok(Json(AuthToken { auth_token }))
}

/// POST /auth/refresh - Reissue the caller's token with a new expiry
pub(super) async fn refresh_handler(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<AuthToken>> {
    let auth_token = state.tokens.issue(&claims.user)?;
    tracing::debug!("Token refreshed for {}", claims.user.user_name);
    Ok(Json(AuthToken { auth_token }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use axum::body::Body;

    fn json_login(credentials: &LoginRequest) -> Request {
        Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(credentials).unwrap()))
            .unwrap()
    }

    fn form_login(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header(
                header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=UTF-8",
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn state_with_user() -> AppState {
        let state = AppState::in_memory("test-secret").unwrap();
        let hash = state.passwords.hash("examplePassword").unwrap();
        let user = User {
            user_name: "exampleUser".to_string(),
            first_name: "Babe".to_string(),
            last_name: "Ruth".to_string(),
        };
        state.store.create_user(&user, &hash).unwrap();
        state
    }

    #[tokio::test]
    async fn test_login_returns_verifiable_token() {
        let state = state_with_user();
        let request = LoginRequest::new("exampleUser", "examplePassword");

        let response = login_handler(State(state.clone()), json_login(&request))
            .await
            .unwrap();

        let claims = state.tokens.verify(&response.0.auth_token).unwrap();
        assert_eq!(claims.user.user_name, "exampleUser");
        assert_eq!(claims.user.last_name, "Ruth");
    }

    #[tokio::test]
    async fn test_login_rejects_missing_fields() {
        let state = state_with_user();

        let result =
            login_handler(State(state.clone()), json_login(&LoginRequest::default())).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        let request = LoginRequest::new("exampleUser", "");
        let result = login_handler(State(state.clone()), json_login(&request)).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        let result = login_handler(State(state), form_login("userName=exampleUser")).await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let state = state_with_user();

        let request = LoginRequest::new("wrongUsername", "examplePassword");
        let result = login_handler(State(state.clone()), json_login(&request)).await;
        assert!(matches!(result, Err(ApiError::AuthError(_))));

        let request = LoginRequest::new("exampleUser", "wrongPassword");
        let result = login_handler(State(state), json_login(&request)).await;
        assert!(matches!(result, Err(ApiError::AuthError(_))));
    }

    #[tokio::test]
    async fn test_login_accepts_form_body() {
        let state = state_with_user();
        let request = form_login("userName=exampleUser&password=examplePassword");

        let response = login_handler(State(state.clone()), request).await.unwrap();
        let claims = state.tokens.verify(&response.0.auth_token).unwrap();
        assert_eq!(claims.user.user_name, "exampleUser");
    }

    #[tokio::test]
    async fn test_refresh_reissues_for_same_user() {
        let state = state_with_user();
        let user = state.store.find_user("exampleUser").unwrap().unwrap().user;
        let token = state.tokens.issue(&user).unwrap();
        let claims = state.tokens.verify(&token).unwrap();

        let response = refresh_handler(State(state.clone()), Extension(claims.clone()))
            .await
            .unwrap();
        let refreshed = state.tokens.verify(&response.0.auth_token).unwrap();

        assert_eq!(refreshed.user, claims.user);
        assert!(refreshed.exp >= claims.exp);
    }
}
