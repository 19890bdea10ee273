//! Command handlers for the AutoDPIA CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod auth;
pub mod template;

// Re-export command types for convenience
pub use auth::AuthCommand;
pub use template::TemplateCommand;

use autodpia_api::{create_backend, resolve_token, Backend, TokenStore};
use autodpia_core::{config::AppConfig, AppResult};

/// Token store under the workspace's `.autodpia` directory.
pub fn token_store(config: &AppConfig) -> TokenStore {
    TokenStore::new(config.token_path())
}

/// Storage backend for the configured workspace and session.
pub fn open_backend(config: &AppConfig) -> AppResult<Backend> {
    let token = resolve_token(config.token.as_deref(), &token_store(config))?;
    create_backend(config, token)
}
