use axum::{
    middleware::{self as axum_middleware},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{Passwords, TokenIssuer};
use crate::config::Config;
use crate::middleware;
use crate::store::Store;

mod auth;
mod strains;
mod users;

/// Application version from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: Arc<TokenIssuer>,
    pub passwords: Arc<Passwords>,
}

impl AppState {
    /// Build state from configuration and an opened store
    pub fn new(config: &Config, store: Store) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            tokens: Arc::new(TokenIssuer::new(&config.jwt_secret, config.jwt_expiry)?),
            passwords: Arc::new(Passwords::new(
                config.hash_memory_kib,
                config.hash_iterations,
            )?),
        })
    }

    /// Throwaway state: in-memory store, 7 day tokens, cheap password hashing
    pub fn in_memory(jwt_secret: &str) -> anyhow::Result<Self> {
        Ok(Self {
            store: Store::open_in_memory()?,
            tokens: Arc::new(TokenIssuer::new(
                jwt_secret,
                std::time::Duration::from_secs(7 * 86_400),
            )?),
            passwords: Arc::new(Passwords::new(1024, 1)?),
        })
    }
}

/// Health check routes (no authentication required)
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// `/auth/login` is open; `/auth/refresh` needs a valid bearer token
pub fn auth_routes(state: AppState) -> Router {
    let refresh = Router::new()
        .route("/auth/refresh", post(auth::refresh_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/auth/login", post(auth::login_handler))
        .merge(refresh)
        .with_state(state)
}

/// Registration (open) and the caller's cabinet (authenticated)
pub fn user_routes(state: AppState) -> Router {
    let cabinet = Router::new()
        .route("/users/strains", get(users::cabinet_handler))
        .route(
            "/users/strains/:id",
            put(users::add_to_cabinet_handler).delete(users::remove_from_cabinet_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/users", post(users::register_handler))
        .merge(cabinet)
        .with_state(state)
}

/// Catalog listing (open) plus strain creation and comments (authenticated)
pub fn strain_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/strains", post(strains::create_strain_handler))
        .route("/strains/:id", post(strains::add_comment_handler))
        .route(
            "/strains/:id/:comment_id",
            delete(strains::remove_comment_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/strains", get(strains::list_strains_handler))
        .merge(protected)
        .with_state(state)
}

/// Full application: every route group plus CORS and request tracing
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(auth_routes(state.clone()))
        .merge(user_routes(state.clone()))
        .merge(strain_routes(state))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// GET / - Simple health check
async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Medicine Cabinet is running",
        "version": VERSION
    }))
}

/// GET /health - Detailed health check
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "version": VERSION
    }))
}

/// Run CPU-heavy password work off the async workers
async fn blocking<T, F>(f: F) -> crate::error::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| crate::error::ApiError::Internal(anyhow::anyhow!("Blocking task failed: {}", e)))
}
