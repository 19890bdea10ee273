//! Storage backend factory.
//!
//! Resolves the configured backend name to a `TemplateStorage`
//! implementation. Only the remote backend can run extraction tasks.

use autodpia_core::{AppConfig, AppError, AppResult};
use autodpia_template::{LocalStorage, TemplateExtractor, TemplateStorage};
use std::sync::Arc;

use crate::client::ApiClient;
use crate::storage::RemoteStorage;

/// Storage plus, when the backend supports it, the extraction protocol.
pub struct Backend {
    pub storage: Arc<dyn TemplateStorage>,
    pub extractor: Option<Arc<dyn TemplateExtractor>>,
}

/// Create the storage backend named by `config.backend`.
///
/// # Arguments
/// * `config` - Application configuration (backend, server URL, timeouts)
/// * `token` - Access token for the remote backend
///
/// # Errors
/// Returns a config error for an unknown backend name.
pub fn create_backend(config: &AppConfig, token: Option<String>) -> AppResult<Backend> {
    match config.backend.to_lowercase().as_str() {
        "remote" => {
            let client = ApiClient::from_config(config, token)?;
            if !client.has_token() {
                tracing::warn!("No access token found; run `autodpia auth login` first");
            }
            let remote = Arc::new(RemoteStorage::new(client));
            Ok(Backend {
                storage: remote.clone(),
                extractor: Some(remote),
            })
        }
        "local" => Ok(Backend {
            storage: Arc::new(LocalStorage::new(config.templates_dir())),
            extractor: None,
        }),
        other => Err(AppError::Config(format!("Unknown backend: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_remote_backend() {
        let backend = create_backend(&AppConfig::default(), Some("abc".to_string())).unwrap();
        assert_eq!(backend.storage.backend_name(), "remote");
        assert!(backend.extractor.is_some());
    }

    #[test]
    fn test_create_local_backend() {
        let config = AppConfig {
            backend: "Local".to_string(),
            ..AppConfig::default()
        };
        let backend = create_backend(&config, None).unwrap();
        assert_eq!(backend.storage.backend_name(), "local");
        assert!(backend.extractor.is_none());
    }

    #[test]
    fn test_unknown_backend() {
        let config = AppConfig {
            backend: "ftp".to_string(),
            ..AppConfig::default()
        };
        match create_backend(&config, None) {
            Err(AppError::Config(message)) => assert!(message.contains("Unknown backend")),
            _ => panic!("Expected config error for unknown backend"),
        }
    }
}
