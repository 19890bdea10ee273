//! Backend integration crate for AutoDPIA.
//!
//! This crate talks to the AutoDPIA HTTP API: session management, remote
//! template storage and the upload/start/poll/cancel task protocol.
//!
//! # Example
//! ```no_run
//! use autodpia_api::{ApiClient, RemoteStorage};
//! use autodpia_template::TemplateStorage;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new("http://localhost:8080", Duration::from_secs(30))?
//!     .with_token(Some("token".to_string()));
//! let storage = RemoteStorage::new(client);
//! for record in storage.list_templates().await? {
//!     println!("{}", record.name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod session;
pub mod storage;
pub mod types;

// Re-export main types
pub use client::ApiClient;
pub use factory::{create_backend, Backend};
pub use session::{resolve_token, TokenStore};
pub use storage::RemoteStorage;
pub use types::EXTRACT_TEMPLATE_TASK;
