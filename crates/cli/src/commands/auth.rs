//! Auth command handler.
//!
//! Manages the backend session. The access token is kept in
//! `.autodpia/token` so later commands can reuse it.

use autodpia_api::{resolve_token, ApiClient};
use autodpia_core::{config::AppConfig, AppError, AppResult};
use clap::{Args, Subcommand};

use super::token_store;

/// Log in, register and manage the stored session
#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub action: AuthAction,
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Log in and store the access token
    Login(CredentialsArgs),
    /// Create a new account
    Register(CredentialsArgs),
    /// End the session and forget the stored token
    Logout,
    /// Exchange the stored token for a fresh one
    Refresh {
        /// Account email
        email: String,
    },
    /// Show server, backend and session state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct CredentialsArgs {
    /// Account email
    pub email: String,

    /// Account password
    #[arg(long, env = "AUTODPIA_PASSWORD", hide_env_values = true)]
    pub password: String,
}

impl AuthCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = token_store(config);

        match &self.action {
            AuthAction::Login(args) => {
                tracing::info!("Executing auth login");
                let client = ApiClient::from_config(config, None)?;
                let token = client.login(&args.email, &args.password).await?;
                store.save(&token)?;
                println!("Logged in as {}", args.email);
            }
            AuthAction::Register(args) => {
                tracing::info!("Executing auth register");
                let client = ApiClient::from_config(config, None)?;
                client.register(&args.email, &args.password).await?;
                println!("Registered {}. You can now log in.", args.email);
            }
            AuthAction::Logout => {
                tracing::info!("Executing auth logout");
                if let Some(token) = resolve_token(config.token.as_deref(), &store)? {
                    let client = ApiClient::from_config(config, Some(token))?;
                    if let Err(e) = client.logout().await {
                        tracing::warn!("Server logout failed: {}", e);
                    }
                }
                store.clear()?;
                println!("Logged out");
            }
            AuthAction::Refresh { email } => {
                tracing::info!("Executing auth refresh");
                let token = resolve_token(config.token.as_deref(), &store)?.ok_or_else(|| {
                    AppError::Auth("Not logged in; run `autodpia auth login` first".to_string())
                })?;
                let client = ApiClient::from_config(config, Some(token))?;
                let fresh = client.refresh_token(email).await?;
                store.save(&fresh)?;
                println!("Session refreshed");
            }
            AuthAction::Status { json } => {
                let source = if config.token.is_some() {
                    "environment"
                } else if store.load()?.is_some() {
                    "file"
                } else {
                    "none"
                };

                if *json {
                    let output = serde_json::json!({
                        "server": config.server_url,
                        "backend": config.backend,
                        "loggedIn": source != "none",
                        "tokenSource": source,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                } else {
                    println!("Server:    {}", config.server_url);
                    println!("Backend:   {}", config.backend);
                    match source {
                        "none" => println!("Session:   not logged in"),
                        _ => println!("Session:   logged in (token from {})", source),
                    }
                }
            }
        }

        Ok(())
    }
}
