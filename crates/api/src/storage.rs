//! Remote template storage and extraction over the backend API.

use autodpia_core::{AppError, AppResult};
use autodpia_template::{
    StepMap, TaskId, TaskStatus, TemplateExtractor, TemplateRecord, TemplateStorage,
};
use std::path::Path;
use std::time::Duration;

use crate::client::{check, decode, ApiClient};
use crate::types::{
    CancelTaskRequest, SaveTemplateRequest, SelectTemplateRequest, StartTaskRequest,
    StartTaskResponse, TaskResult, UploadResponse, EXTRACT_TEMPLATE_TASK,
};

/// How long a single `/get_task_result` request may wait for a reply.
///
/// The server can hold the poll open while the task runs, so this is longer
/// than the client's request timeout.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Template storage backed by the AutoDPIA server.
pub struct RemoteStorage {
    client: ApiClient,
    poll_timeout: Duration,
}

impl RemoteStorage {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Upload a document for template extraction, returning the server-side
    /// file name.
    pub async fn upload_document(&self, file: &Path) -> AppResult<String> {
        let bytes = tokio::fs::read(file).await.map_err(|e| {
            AppError::Task(format!("Failed to read document {:?}: {}", file, e))
        })?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        tracing::info!("Uploading {} ({} bytes)", file_name, bytes.len());

        let form = reqwest::multipart::Form::new()
            .part(
                "File",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("Mode", "template");

        let path = "/upload_doc";
        let response = self
            .client
            .send(path, self.client.post(path).multipart(form))
            .await?;
        let upload: UploadResponse = decode(path, response).await?;
        Ok(upload.filename)
    }

    /// Start a background task on an uploaded file.
    pub async fn start_task(&self, task_name: &str, file_name: &str) -> AppResult<TaskId> {
        let body = StartTaskRequest {
            task_name,
            file_name,
        };
        let response: StartTaskResponse = self
            .client
            .post_json("/start_task", &body)
            .await
            .map_err(|e| AppError::Task(format!("Failed to start task: {}", e)))?;
        Ok(TaskId(response.task_id))
    }

    /// Ask for a task's state. A poll that outlives `poll_timeout` reports
    /// the task as still pending.
    async fn task_result(&self, task_name: &str, task_id: &TaskId) -> AppResult<TaskStatus> {
        let path = "/get_task_result";
        let request = self
            .client
            .get(path)
            .query(&[("taskID", task_id.0.as_str()), ("taskName", task_name)])
            .timeout(self.poll_timeout);

        let response = match request.send().await {
            Ok(response) => check(path, response).await?,
            Err(e) if e.is_timeout() => {
                tracing::debug!("Poll of task {} timed out, still pending", task_id);
                return Ok(TaskStatus::Pending);
            }
            Err(e) => {
                return Err(AppError::Http(format!("Failed to reach {}: {}", path, e)));
            }
        };
        let result: TaskResult = decode(path, response).await?;
        tracing::debug!("Task {} is {}", task_id, result.state);
        Ok(result.into_status())
    }
}

#[async_trait::async_trait]
impl TemplateStorage for RemoteStorage {
    fn backend_name(&self) -> &str {
        "remote"
    }

    async fn list_templates(&self) -> AppResult<Vec<TemplateRecord>> {
        self.client
            .get_json("/get_templates")
            .await
            .map_err(|e| AppError::Load(format!("Failed to list templates: {}", e)))
    }

    async fn load_template(&self, name: &str) -> AppResult<String> {
        self.list_templates()
            .await?
            .into_iter()
            .find(|record| record.name == name)
            .map(|record| record.data)
            .ok_or_else(|| AppError::NotFound(format!("Template '{}'", name)))
    }

    async fn save_structure(&self, name: &str, structure: &StepMap) -> AppResult<()> {
        let body = SelectTemplateRequest {
            name,
            data: structure,
        };
        self.client
            .post_unit("/select_template", &body)
            .await
            .map_err(|e| AppError::Save(format!("Failed to save '{}': {}", name, e)))
    }

    async fn save_template_name(&self, name: &str) -> AppResult<()> {
        self.client
            .post_unit("/save_template", &SaveTemplateRequest { name })
            .await
            .map_err(|e| save_name_error(name, e))
    }

    async fn delete_template(&self, name: &str) -> AppResult<()> {
        self.client.post_unit("/delete_template", name).await
    }
}

#[async_trait::async_trait]
impl TemplateExtractor for RemoteStorage {
    async fn extract_template(&self, file: &Path) -> AppResult<TaskId> {
        let file_name = self.upload_document(file).await?;
        self.start_task(EXTRACT_TEMPLATE_TASK, &file_name).await
    }

    async fn poll_task(&self, task_id: &TaskId) -> AppResult<TaskStatus> {
        self.task_result(EXTRACT_TEMPLATE_TASK, task_id).await
    }

    async fn cancel_task(&self, task_id: &TaskId) -> AppResult<()> {
        self.client
            .post_unit("/cancel_task", &CancelTaskRequest { task_id: &task_id.0 })
            .await
    }
}

/// The server answers a duplicate name with 400 "... already exists".
fn save_name_error(name: &str, error: AppError) -> AppError {
    match error {
        AppError::Http(message) if message.contains("already exists") => {
            AppError::NameConflict(format!("Template '{}' already exists", name))
        }
        AppError::Auth(message) => AppError::Auth(message),
        other => AppError::Save(format!("Failed to save template '{}': {}", name, other)),
    }
}
