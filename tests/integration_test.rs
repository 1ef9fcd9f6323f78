// Integration tests for the Medicine Cabinet API
//
// These tests drive the full router (routing, auth middleware, request
// parsing, error bodies) in-process with `oneshot`.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use medicine_cabinet::{
    auth::Claims,
    models::User,
    routes::{self, AppState},
};

const SECRET: &str = "integration-secret";
const PASSWORD: &str = "examplePassword";

// ==================================================================================================
// Test Helpers
// ==================================================================================================

struct TestApp {
    state: AppState,
    app: Router,
}

impl TestApp {
    fn new() -> Self {
        let state = AppState::in_memory(SECRET).expect("Failed to create test state");
        let app = routes::build_app(state.clone());
        Self { state, app }
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(&self, user_name: &str) {
        let (status, body) = self
            .call(
                Method::POST,
                "/users",
                None,
                Some(json!({
                    "userName": user_name,
                    "password": PASSWORD,
                    "firstName": "Babe",
                    "lastName": "Ruth"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
    }

    async fn login(&self, user_name: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({"userName": user_name, "password": PASSWORD})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["authToken"].as_str().unwrap().to_string()
    }

    async fn create_strain(&self, token: &str, name: &str, kind: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/strains",
                Some(token),
                Some(json!({
                    "name": name,
                    "type": kind,
                    "description": "Balanced and calm",
                    "flavor": "Berry"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create strain failed: {}", body);
        body
    }
}

fn sign(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn example_user() -> User {
    User {
        user_name: "exampleUser".to_string(),
        first_name: "Babe".to_string(),
        last_name: "Ruth".to_string(),
    }
}

// ==================================================================================================
// Health Check Tests
// ==================================================================================================

#[tokio::test]
async fn test_root_endpoint() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

// ==================================================================================================
// Auth Tests
// ==================================================================================================

#[tokio::test]
async fn test_login_returns_token_with_user_claim() {
    let app = TestApp::new();
    app.register("exampleUser").await;

    let token = app.login("exampleUser").await;
    let claims = app.state.tokens.verify(&token).unwrap();
    assert_eq!(claims.user, example_user());
    assert_eq!(claims.sub, "exampleUser");
}

#[tokio::test]
async fn test_login_with_form_encoded_body() {
    let app = TestApp::new();
    app.register("exampleUser").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=UTF-8",
        )
        .body(Body::from(format!("userName=exampleUser&password={}", PASSWORD)))
        .unwrap();

    let response = app.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let claims = app
        .state
        .tokens
        .verify(body["authToken"].as_str().unwrap())
        .unwrap();
    assert_eq!(claims.user.user_name, "exampleUser");
}

#[tokio::test]
async fn test_login_without_credentials() {
    let app = TestApp::new();
    let (status, body) = app
        .call(Method::POST, "/auth/login", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "BadRequest");
}

#[tokio::test]
async fn test_login_with_wrong_password_or_user() {
    let app = TestApp::new();
    app.register("exampleUser").await;

    for body in [
        json!({"userName": "exampleUser", "password": "wrongPassword"}),
        json!({"userName": "wrongUsername", "password": PASSWORD}),
    ] {
        let (status, body) = app.call(Method::POST, "/auth/login", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Incorrect username or password");
    }
}

#[tokio::test]
async fn test_refresh_issues_later_or_equal_expiry() {
    let app = TestApp::new();
    let token = app.state.tokens.issue(&example_user()).unwrap();
    let before = app.state.tokens.verify(&token).unwrap();

    let (status, body) = app
        .call(Method::POST, "/auth/refresh", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let after = app
        .state
        .tokens
        .verify(body["authToken"].as_str().unwrap())
        .unwrap();
    assert_eq!(after.user, before.user);
    assert!(after.exp >= before.exp);
}

#[tokio::test]
async fn test_refresh_rejects_missing_token() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::POST, "/auth/refresh", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["reason"], "AuthError");
}

#[tokio::test]
async fn test_refresh_rejects_wrong_key() {
    let app = TestApp::new();
    let claims = Claims {
        user: example_user(),
        sub: "exampleUser".to_string(),
        iat: Utc::now().timestamp(),
        exp: Utc::now().timestamp() + 3600,
    };
    let token = sign(&claims, "wrongSecret");

    let (status, _) = app
        .call(Method::POST, "/auth/refresh", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rejects_expired_token() {
    let app = TestApp::new();
    let claims = Claims {
        user: example_user(),
        sub: "exampleUser".to_string(),
        iat: Utc::now().timestamp() - 20,
        exp: Utc::now().timestamp() - 10,
    };
    let token = sign(&claims, SECRET);

    let (status, body) = app
        .call(Method::POST, "/auth/refresh", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token has expired");
}

// ==================================================================================================
// User Tests
// ==================================================================================================

#[tokio::test]
async fn test_register_returns_public_user() {
    let app = TestApp::new();
    let (status, body) = app
        .call(
            Method::POST,
            "/users",
            None,
            Some(json!({
                "userName": "exampleUser",
                "password": PASSWORD,
                "firstName": "Babe",
                "lastName": "Ruth"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({"userName": "exampleUser", "firstName": "Babe", "lastName": "Ruth"})
    );
}

#[tokio::test]
async fn test_register_validation_errors() {
    let app = TestApp::new();
    app.register("taken").await;

    let cases = [
        (json!({"password": PASSWORD}), "Missing field", "userName"),
        (
            json!({"userName": 5, "password": PASSWORD}),
            "Incorrect field type: expected string",
            "userName",
        ),
        (
            json!({"userName": "u", "password": " examplePassword"}),
            "Cannot start or end with whitespace",
            "password",
        ),
        (
            json!({"userName": "u", "password": "123456789"}),
            "Must be at least 10 characters long",
            "password",
        ),
        (
            json!({"userName": "taken", "password": PASSWORD}),
            "Username already taken",
            "userName",
        ),
    ];

    for (request, message, location) in cases {
        let (status, body) = app.call(Method::POST, "/users", None, Some(request)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], 422);
        assert_eq!(body["reason"], "ValidationError");
        assert_eq!(body["message"], message);
        assert_eq!(body["location"], location);
    }
}

// ==================================================================================================
// Strain Tests
// ==================================================================================================

#[tokio::test]
async fn test_list_strains_is_public_and_complete() {
    let app = TestApp::new();
    app.register("exampleUser").await;
    let token = app.login("exampleUser").await;
    app.create_strain(&token, "Blue Dream", "hybrid").await;
    app.create_strain(&token, "Northern Lights", "Indica").await;

    let (status, body) = app.call(Method::GET, "/strains", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let strains = body["strains"].as_array().unwrap();
    assert_eq!(strains.len(), 2);
    for strain in strains {
        for key in ["_id", "name", "type", "description", "flavor"] {
            assert!(strain.get(key).is_some(), "missing {} in {}", key, strain);
        }
    }
    assert_eq!(strains[1]["type"], "Indica");
}

#[tokio::test]
async fn test_create_strain_requires_token() {
    let app = TestApp::new();
    let (status, _) = app
        .call(
            Method::POST,
            "/strains",
            None,
            Some(json!({"name": "X", "type": "hybrid", "description": "d", "flavor": "f"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_strain_rejects_bad_type() {
    let app = TestApp::new();
    app.register("exampleUser").await;
    let token = app.login("exampleUser").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/strains",
            Some(&token),
            Some(json!({"name": "X", "type": "ruderalis", "description": "d", "flavor": "f"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["location"], "type");
}

#[tokio::test]
async fn test_comment_lifecycle_and_ownership() {
    let app = TestApp::new();
    app.register("alice").await;
    app.register("bob").await;
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;

    let strain = app.create_strain(&alice, "Blue Dream", "hybrid").await;
    let id = strain["_id"].as_str().unwrap();

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/strains/{}", id),
            Some(&bob),
            Some(json!({"comment": {"content": "Great for evenings", "author": "alice"}})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let comment = &body["comments"][0];
    assert_eq!(comment["author"], "bob");
    let comment_id = comment["_id"].as_str().unwrap();

    let path = format!("/strains/{}/{}", id, comment_id);
    let (status, _) = app.call(Method::DELETE, &path, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::DELETE, &path, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::DELETE, &path, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_comment_on_unknown_strain() {
    let app = TestApp::new();
    app.register("alice").await;
    let token = app.login("alice").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/strains/does-not-exist",
            Some(&token),
            Some(json!({"comment": {"content": "Hello"}})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ==================================================================================================
// Cabinet Tests
// ==================================================================================================

#[tokio::test]
async fn test_cabinet_add_and_remove() {
    let app = TestApp::new();
    app.register("alice").await;
    let token = app.login("alice").await;
    let strain = app.create_strain(&token, "Blue Dream", "hybrid").await;
    let path = format!("/users/strains/{}", strain["_id"].as_str().unwrap());

    let (status, body) = app.call(Method::GET, "/users/strains", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["strains"], json!([]));

    // Adding twice is harmless
    for _ in 0..2 {
        let (status, _) = app.call(Method::PUT, &path, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (_, body) = app.call(Method::GET, "/users/strains", Some(&token), None).await;
    let strains = body["strains"].as_array().unwrap();
    assert_eq!(strains.len(), 1);
    assert_eq!(strains[0]["name"], "Blue Dream");

    for _ in 0..2 {
        let (status, _) = app.call(Method::DELETE, &path, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (_, body) = app.call(Method::GET, "/users/strains", Some(&token), None).await;
    assert_eq!(body["strains"], json!([]));
}

#[tokio::test]
async fn test_cabinet_is_per_user_and_authenticated() {
    let app = TestApp::new();
    app.register("alice").await;
    app.register("bob").await;
    let alice = app.login("alice").await;
    let bob = app.login("bob").await;
    let strain = app.create_strain(&alice, "Blue Dream", "hybrid").await;
    let path = format!("/users/strains/{}", strain["_id"].as_str().unwrap());

    app.call(Method::PUT, &path, Some(&alice), None).await;

    let (_, body) = app.call(Method::GET, "/users/strains", Some(&bob), None).await;
    assert_eq!(body["strains"], json!([]));

    let (status, _) = app.call(Method::GET, "/users/strains", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cabinet_add_unknown_strain() {
    let app = TestApp::new();
    app.register("alice").await;
    let token = app.login("alice").await;

    let (status, body) = app
        .call(Method::PUT, "/users/strains/missing", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["reason"], "NotFound");
}
