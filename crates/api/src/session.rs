//! Session management: stored access token and auth endpoints.

use autodpia_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

use crate::client::ApiClient;
use crate::types::{Credentials, RefreshRequest, TokenResponse};

/// Access token persisted between CLI invocations.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored token, if any.
    pub fn load(&self) -> AppResult<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let token = std::fs::read_to_string(&self.path)?;
        let token = token.trim();
        Ok((!token.is_empty()).then(|| token.to_string()))
    }

    pub fn save(&self, token: &str) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        tracing::debug!("Stored access token at {:?}", self.path);
        Ok(())
    }

    /// Remove the stored token. Missing tokens are not an error.
    pub fn clear(&self) -> AppResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Token to use for a request: an explicit override wins over the stored one.
pub fn resolve_token(override_token: Option<&str>, store: &TokenStore) -> AppResult<Option<String>> {
    match override_token.filter(|t| !t.trim().is_empty()) {
        Some(token) => Ok(Some(token.to_string())),
        None => store.load(),
    }
}

impl ApiClient {
    /// Log in and return the issued access token.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<String> {
        tracing::info!("Logging in as {}", email);
        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: TokenResponse = self
            .post_json("/login", &body)
            .await
            .map_err(|e| match e {
                AppError::Auth(_) => AppError::Auth("Invalid email or password".to_string()),
                other => other,
            })?;
        Ok(response.access_token)
    }

    pub async fn register(&self, email: &str, password: &str) -> AppResult<()> {
        tracing::info!("Registering {}", email);
        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post_unit("/register", &body)
            .await
            .map_err(|e| match e {
                AppError::Http(message) if message.contains("(409)") => {
                    AppError::Auth(format!("User {} already exists", email))
                }
                other => other,
            })
    }

    pub async fn logout(&self) -> AppResult<()> {
        self.post_unit("/logout", &serde_json::json!({})).await
    }

    /// Exchange the current session for a fresh access token.
    pub async fn refresh_token(&self, email: &str) -> AppResult<String> {
        let body = RefreshRequest {
            email: email.to_string(),
        };
        let response: TokenResponse = self.post_json("/refresh_token", &body).await?;
        Ok(response.access_token)
    }
}
