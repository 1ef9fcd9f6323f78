// Authentication types

use serde::{Deserialize, Serialize};

use crate::models::User;

/// Signed token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user: User,
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub iat: i64,
    pub exp: i64,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn new(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user_name: Some(user_name.into()),
            password: Some(password.into()),
        }
    }
}

/// Response of `/auth/login` and `/auth/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub auth_token: String,
}
