//! Wire types for the AutoDPIA backend API.

use autodpia_template::{StepMap, TaskStatus};
use serde::{Deserialize, Serialize};

/// Credentials for `/login` and `/register`.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Body of `/refresh_token`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub email: String,
}

/// Token issued by `/login` and `/refresh_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Body of `/select_template`: the working copy.
#[derive(Debug, Serialize)]
pub struct SelectTemplateRequest<'a> {
    #[serde(rename = "tempName")]
    pub name: &'a str,
    #[serde(rename = "tempData")]
    pub data: &'a StepMap,
}

/// Body of `/save_template`.
#[derive(Debug, Serialize)]
pub struct SaveTemplateRequest<'a> {
    #[serde(rename = "tempName")]
    pub name: &'a str,
}

/// Reply of `/upload_doc`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
}

/// Task name the server runs template extraction under.
pub const EXTRACT_TEMPLATE_TASK: &str = "extract_template";

/// Body of `/start_task`.
#[derive(Debug, Serialize)]
pub struct StartTaskRequest<'a> {
    #[serde(rename = "taskName")]
    pub task_name: &'a str,
    #[serde(rename = "fileName")]
    pub file_name: &'a str,
}

/// Reply of `/start_task`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartTaskResponse {
    pub task_id: String,
}

/// Body of `/cancel_task`.
#[derive(Debug, Serialize)]
pub struct CancelTaskRequest<'a> {
    #[serde(rename = "taskID")]
    pub task_id: &'a str,
}

/// Reply of `/get_task_result`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskResult {
    pub state: String,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

impl TaskResult {
    /// Map the server's task state onto the editor's task status.
    ///
    /// States other than SUCCESS, FAILURE and REVOKED (PENDING, STARTED,
    /// RETRY, ...) are still running.
    pub fn into_status(self) -> TaskStatus {
        match self.state.as_str() {
            "SUCCESS" => TaskStatus::Done(self.result.unwrap_or(serde_json::Value::Null)),
            "FAILURE" => {
                let message = self
                    .result
                    .or(self.status)
                    .map(|value| match value {
                        serde_json::Value::String(text) => text,
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "Task failed".to_string());
                TaskStatus::Error(message)
            }
            "REVOKED" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }
}
