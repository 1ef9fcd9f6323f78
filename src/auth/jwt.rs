// HS256 token issuing and verification

use anyhow::Context;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::types::Claims;
use crate::config::MAX_JWT_EXPIRY;
use crate::error::ApiError;
use crate::models::User;

/// Signs and checks auth tokens with a shared secret
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expiry: Duration,
}

impl TokenIssuer {
    /// Create an issuer whose tokens live for `expiry`
    pub fn new(secret: &str, expiry: std::time::Duration) -> anyhow::Result<Self> {
        if expiry > MAX_JWT_EXPIRY {
            anyhow::bail!(
                "Token expiry must be at most {} days",
                MAX_JWT_EXPIRY.as_secs() / 86_400
            );
        }
        let expiry = Duration::from_std(expiry).context("Token expiry is out of range")?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expired means expired: no grace period
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expiry,
        })
    }

    /// Issue a fresh token for `user`
    pub fn issue(&self, user: &User) -> Result<String, ApiError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.expiry)
            .context("Token expiry overflows the clock")?;
        let claims = Claims {
            user: user.clone(),
            sub: user.user_name.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to sign token")
            .map_err(ApiError::Internal)
    }

    /// Verify signature and expiry, returning the payload
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::ExpiredSignature => "Token has expired",
                    ErrorKind::InvalidSignature => "Invalid token signature",
                    _ => "Invalid token",
                };
                tracing::debug!("Token rejected: {}", e);
                ApiError::AuthError(reason.to_string())
            })
    }
}
