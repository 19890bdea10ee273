//! HTTP client for the AutoDPIA backend.
//!
//! Wraps `reqwest` with the base URL, bearer token and request timeout taken
//! from configuration, and maps HTTP failures onto `AppError`.

use autodpia_core::{AppConfig, AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Bearer-authenticated client for the backend API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// Base URL without trailing slash
    base_url: String,

    /// Access token sent as `Authorization: Bearer`
    token: Option<String>,

    /// HTTP client
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            http,
        })
    }

    /// Create a client from application configuration.
    pub fn from_config(config: &AppConfig, token: Option<String>) -> AppResult<Self> {
        let client = Self::new(
            config.server_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(client.with_token(token))
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(self.url(path)))
    }

    pub(crate) fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.post(self.url(path)))
    }

    /// Send a request and fail on any non-success status.
    pub(crate) async fn send(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> AppResult<reqwest::Response> {
        tracing::debug!("Sending request to {}", path);

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Http(format!("Failed to reach {}: {}", path, e)))?;
        check(path, response).await
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.send(path, self.get(path)).await?;
        decode(path, response).await
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(path, self.post(path).json(body)).await?;
        decode(path, response).await
    }

    /// POST a JSON body, ignoring the reply body.
    pub(crate) async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<()> {
        self.send(path, self.post(path).json(body)).await?;
        Ok(())
    }
}

/// Fail on any non-success status, keeping the server's error message.
pub(crate) async fn check(path: &str, response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(status_error(path, status.as_u16(), &error_text))
}

pub(crate) async fn decode<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> AppResult<T> {
    response
        .json()
        .await
        .map_err(|e| AppError::Http(format!("Failed to parse response from {}: {}", path, e)))
}

/// Map a failed HTTP status onto an error.
///
/// The server reports most failures as `{"error": "..."}`; that message is
/// used when present.
pub(crate) fn status_error(path: &str, status: u16, body: &str) -> AppError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["error", "message", "msg"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => AppError::Auth(format!("{} ({}): {}", path, status, message)),
        404 => AppError::NotFound(format!("{}: {}", path, message)),
        _ => AppError::Http(format!("API error on {} ({}): {}", path, status, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:8080/", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client();
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert!(!client.has_token());
        assert_eq!(client.url("/get_templates"), "http://localhost:8080/get_templates");
        assert_eq!(client.url("login"), "http://localhost:8080/login");
    }

    #[test]
    fn test_blank_token_is_ignored() {
        assert!(!client().with_token(Some("  ".to_string())).has_token());
        assert!(client().with_token(Some("abc".to_string())).has_token());
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig {
            server_url: "https://dpia.example.com".to_string(),
            ..AppConfig::default()
        };
        let client = ApiClient::from_config(&config, Some("abc".to_string())).unwrap();
        assert_eq!(client.base_url(), "https://dpia.example.com");
        assert!(client.has_token());
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error("/login", 401, r#"{"error": "Invalid credentials"}"#),
            AppError::Auth(ref m) if m.contains("Invalid credentials")
        ));
        assert!(matches!(
            status_error("/delete_template", 404, "Template not found"),
            AppError::NotFound(ref m) if m.contains("Template not found")
        ));
        assert!(matches!(
            status_error("/save_template", 400, r#"{"message": "Template already exists"}"#),
            AppError::Http(ref m) if m.contains("already exists") && m.contains("400")
        ));
    }
}
