//! Storage and extraction abstractions.
//!
//! The editor never talks to a backend directly. It goes through
//! `TemplateStorage` for the catalogue and bodies, and `TemplateExtractor`
//! for the start/poll/cancel extraction protocol.

use autodpia_core::AppResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{StepMap, TemplateRecord};

/// Trait for template storage backends (remote API, local files).
#[async_trait::async_trait]
pub trait TemplateStorage: Send + Sync {
    /// Backend name (e.g., "remote", "local").
    fn backend_name(&self) -> &str;

    /// All templates visible to the current user, built-ins included.
    async fn list_templates(&self) -> AppResult<Vec<TemplateRecord>>;

    /// JSON-encoded body of one template; empty when it has none yet.
    async fn load_template(&self, name: &str) -> AppResult<String>;

    /// Overwrite the working copy with `structure`.
    async fn save_structure(&self, name: &str, structure: &StepMap) -> AppResult<()>;

    /// Register the working copy under a new template name.
    ///
    /// Fails with `NameConflict` when the name is taken.
    async fn save_template_name(&self, name: &str) -> AppResult<()>;

    async fn delete_template(&self, name: &str) -> AppResult<()>;
}

/// Identifier of a server-side background task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Observed state of a background task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    Pending,
    Done(serde_json::Value),
    Error(String),
    Cancelled,
}

/// Trait for the long-running template extraction protocol.
#[async_trait::async_trait]
pub trait TemplateExtractor: Send + Sync {
    /// Hand a document to the backend and start extraction.
    async fn extract_template(&self, file: &Path) -> AppResult<TaskId>;

    async fn poll_task(&self, task_id: &TaskId) -> AppResult<TaskStatus>;

    async fn cancel_task(&self, task_id: &TaskId) -> AppResult<()>;
}
