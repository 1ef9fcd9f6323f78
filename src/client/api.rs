// Typed HTTP client for the cabinet API

use anyhow::Context;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::auth::{AuthToken, LoginRequest};
use crate::config::SessionConfig;
use crate::models::{NewComment, NewStrain, NewUser, Strain, StrainList, User};

/// Failures seen by API callers
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error status; `message` is its text verbatim
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Not logged in")]
    NotLoggedIn,

    /// Refused locally, before any request was sent
    #[error("{0}")]
    Rejected(String),
}

impl ClientError {
    /// HTTP status when the server rejected the request
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// HTTP client for the cabinet API
///
/// One request per call, no retries. Authenticated calls take the bearer
/// token explicitly so the caller decides which session it belongs to.
#[derive(Clone)]
pub struct ApiClient {
    /// Shared HTTP client with connection pooling
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &SessionConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // === Auth ===

    /// POST /auth/login
    pub async fn login(&self, user_name: &str, password: &str) -> Result<String> {
        let request = self
            .client
            .post(self.url("/auth/login"))
            .json(&LoginRequest::new(user_name, password));
        let token: AuthToken = self.send_json(request).await?;
        Ok(token.auth_token)
    }

    /// POST /auth/refresh
    pub async fn refresh(&self, token: &str) -> Result<String> {
        let request = self
            .client
            .post(self.url("/auth/refresh"))
            .bearer_auth(token);
        let token: AuthToken = self.send_json(request).await?;
        Ok(token.auth_token)
    }

    // === Users ===

    /// POST /users
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let request = self.client.post(self.url("/users")).json(new_user);
        self.send_json(request).await
    }

    /// GET /users/strains
    pub async fn user_strains(&self, token: &str) -> Result<Vec<Strain>> {
        let request = self
            .client
            .get(self.url("/users/strains"))
            .bearer_auth(token);
        let list: StrainList = self.send_json(request).await?;
        Ok(list.strains)
    }

    /// PUT /users/strains/{id}
    pub async fn add_to_cabinet(&self, token: &str, strain_id: &str) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!("/users/strains/{}", strain_id)))
            .bearer_auth(token);
        self.send(request).await.map(|_| ())
    }

    /// DELETE /users/strains/{id}
    pub async fn remove_from_cabinet(&self, token: &str, strain_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/users/strains/{}", strain_id)))
            .bearer_auth(token);
        self.send(request).await.map(|_| ())
    }

    // === Strains ===

    /// GET /strains
    pub async fn list_strains(&self) -> Result<Vec<Strain>> {
        let list: StrainList = self.send_json(self.client.get(self.url("/strains"))).await?;
        Ok(list.strains)
    }

    /// POST /strains
    pub async fn create_strain(&self, token: &str, new: &NewStrain) -> Result<Strain> {
        let request = self
            .client
            .post(self.url("/strains"))
            .bearer_auth(token)
            .json(new);
        self.send_json(request).await
    }

    /// POST /strains/{id}
    pub async fn add_comment(&self, token: &str, strain_id: &str, content: &str) -> Result<Strain> {
        let request = self
            .client
            .post(self.url(&format!("/strains/{}", strain_id)))
            .bearer_auth(token)
            .json(&NewComment::new(content, None));
        self.send_json(request).await
    }

    /// DELETE /strains/{id}/{comment_id}
    pub async fn remove_comment(&self, token: &str, strain_id: &str, comment_id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/strains/{}/{}", strain_id, comment_id)))
            .bearer_auth(token);
        self.send(request).await.map(|_| ())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Execute a request, turning error statuses into `ClientError::Api`
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();

        tracing::debug!(
            status = %status,
            url = %response.url(),
            "Received HTTP response"
        );

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        tracing::warn!(status = %status, message = %message, "Request rejected");

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// The server's `message` field when the body is a JSON error, otherwise the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.to_string())
}
