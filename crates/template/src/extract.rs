//! Template extraction runner.
//!
//! Extraction turns an uploaded document into a template structure on the
//! server. It is long-running, so it follows a start/poll/cancel protocol:
//! start returns a task id, polling reports progress until the task settles,
//! and a cancel request may be sent while it is in flight.

use autodpia_core::{AppError, AppResult};
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::storage::{TaskId, TaskStatus, TemplateExtractor};
use crate::types::{parse_structure, StepMap};

/// Result of a finished extraction task.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub task_id: TaskId,
    pub result: serde_json::Value,
}

impl ExtractionOutcome {
    /// The extracted structure, if the task returned one.
    pub fn structure(&self) -> Option<StepMap> {
        match &self.result {
            serde_json::Value::Object(_) => serde_json::from_value(self.result.clone()).ok(),
            serde_json::Value::String(data) => parse_structure(data)
                .ok()
                .filter(|structure| !structure.is_empty()),
            _ => None,
        }
    }

    /// Status text returned instead of a structure.
    pub fn message(&self) -> Option<&str> {
        self.result
            .as_str()
            .filter(|_| self.structure().is_none())
    }
}

/// Drives one extraction at a time.
pub struct ExtractionRunner {
    poll_interval: Duration,
    processing: Arc<AtomicBool>,
}

/// Clears the processing flag when a run ends, however it ends.
struct ProcessingGuard {
    flag: Arc<AtomicBool>,
}

impl ProcessingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> AppResult<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::Task("An extraction is already in progress".to_string()))?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl ExtractionRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            processing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True while a run is in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Start extraction of `file` and wait for it to settle.
    ///
    /// `cancel` is watched from the upload onwards. Once a task exists,
    /// cancelling or losing contact with it while polling sends a cancel
    /// request, and the run fails with a task error.
    pub async fn run<F>(
        &self,
        extractor: &dyn TemplateExtractor,
        file: &Path,
        cancel: F,
    ) -> AppResult<ExtractionOutcome>
    where
        F: Future<Output = ()>,
    {
        let _guard = ProcessingGuard::acquire(&self.processing)?;
        tokio::pin!(cancel);

        let task_id = tokio::select! {
            started = extractor.extract_template(file) => started?,
            _ = &mut cancel => {
                tracing::warn!("Extraction of {:?} cancelled before a task started", file);
                return Err(AppError::Task("Extraction cancelled".to_string()));
            }
        };
        tracing::info!("Started extraction task {} for {:?}", task_id, file);

        let polled = tokio::select! {
            result = self.poll_until_settled(extractor, &task_id) => result,
            _ = &mut cancel => {
                tracing::warn!("Cancelling extraction task {}", task_id);
                cancel_quietly(extractor, &task_id).await;
                return Err(AppError::Task("Extraction cancelled".to_string()));
            }
        };

        match polled {
            Err(AppError::Task(message)) => Err(AppError::Task(message)),
            Err(e) => {
                tracing::warn!("Polling task {} failed: {}", task_id, e);
                cancel_quietly(extractor, &task_id).await;
                Err(AppError::Task(format!(
                    "Lost track of extraction task {}: {}",
                    task_id, e
                )))
            }
            outcome => outcome,
        }
    }

    async fn poll_until_settled(
        &self,
        extractor: &dyn TemplateExtractor,
        task_id: &TaskId,
    ) -> AppResult<ExtractionOutcome> {
        let mut polls = 0u32;
        loop {
            polls += 1;
            match extractor.poll_task(task_id).await? {
                TaskStatus::Pending => {
                    tracing::debug!("Task {} still pending after {} polls", task_id, polls);
                    tokio::time::sleep(self.poll_interval).await;
                }
                TaskStatus::Done(result) => {
                    tracing::info!("Extraction task {} finished", task_id);
                    return Ok(ExtractionOutcome {
                        task_id: task_id.clone(),
                        result,
                    });
                }
                TaskStatus::Error(message) => {
                    return Err(AppError::Task(format!("Extraction failed: {}", message)));
                }
                TaskStatus::Cancelled => {
                    return Err(AppError::Task("Extraction was cancelled".to_string()));
                }
            }
        }
    }
}

async fn cancel_quietly(extractor: &dyn TemplateExtractor, task_id: &TaskId) {
    if let Err(e) = extractor.cancel_task(task_id).await {
        tracing::warn!("Failed to cancel task {}: {}", task_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted statuses, then stays pending.
    struct ScriptedExtractor {
        statuses: Mutex<VecDeque<TaskStatus>>,
        polls: Mutex<u32>,
        cancelled: AtomicBool,
        fail_polls: AtomicBool,
        start_delay: Duration,
    }

    impl ScriptedExtractor {
        fn new(statuses: Vec<TaskStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses.into()),
                polls: Mutex::new(0),
                cancelled: AtomicBool::new(false),
                fail_polls: AtomicBool::new(false),
                start_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait::async_trait]
    impl TemplateExtractor for ScriptedExtractor {
        async fn extract_template(&self, _file: &Path) -> AppResult<TaskId> {
            tokio::time::sleep(self.start_delay).await;
            Ok(TaskId("task-1".to_string()))
        }

        async fn poll_task(&self, _task_id: &TaskId) -> AppResult<TaskStatus> {
            *self.polls.lock().unwrap() += 1;
            if self.fail_polls.load(Ordering::SeqCst) {
                return Err(AppError::Http("connection reset".to_string()));
            }
            Ok(self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(TaskStatus::Pending))
        }

        async fn cancel_task(&self, _task_id: &TaskId) -> AppResult<()> {
            self.cancelled.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn runner() -> ExtractionRunner {
        ExtractionRunner::new(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_polls_until_done() {
        let structure = serde_json::json!({"Step 1": {"Role": "Act as DPO"}});
        let extractor = ScriptedExtractor::new(vec![
            TaskStatus::Pending,
            TaskStatus::Pending,
            TaskStatus::Done(structure),
        ]);
        let runner = runner();

        let outcome = runner
            .run(&extractor, Path::new("policy.pdf"), futures::future::pending())
            .await
            .unwrap();

        assert_eq!(*extractor.polls.lock().unwrap(), 3);
        assert_eq!(outcome.task_id, TaskId("task-1".to_string()));
        let extracted = outcome.structure().unwrap();
        assert_eq!(extracted.keys().collect::<Vec<_>>(), vec!["Step 1"]);
        assert_eq!(outcome.message(), None);
        assert!(!runner.is_processing());
    }

    #[tokio::test]
    async fn test_message_result() {
        let extractor = ScriptedExtractor::new(vec![TaskStatus::Done(serde_json::json!(
            "Template extracted successfully"
        ))]);
        let outcome = runner()
            .run(&extractor, Path::new("a.pdf"), futures::future::pending())
            .await
            .unwrap();
        assert_eq!(outcome.structure(), None);
        assert_eq!(outcome.message(), Some("Template extracted successfully"));
    }

    #[tokio::test]
    async fn test_failed_task() {
        let extractor = ScriptedExtractor::new(vec![TaskStatus::Error("bad pdf".to_string())]);
        let runner = runner();
        let err = runner
            .run(&extractor, Path::new("a.pdf"), futures::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Task(ref m) if m.contains("bad pdf")));
        assert!(!runner.is_processing());
    }

    #[tokio::test]
    async fn test_revoked_task() {
        let extractor = ScriptedExtractor::new(vec![TaskStatus::Cancelled]);
        assert!(matches!(
            runner()
                .run(&extractor, Path::new("a.pdf"), futures::future::pending())
                .await,
            Err(AppError::Task(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_sends_cancel_request() {
        let extractor = ScriptedExtractor::new(Vec::new());
        let runner = runner();

        let err = runner
            .run(
                &extractor,
                Path::new("a.pdf"),
                tokio::time::sleep(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Task(_)));
        assert!(extractor.cancelled.load(Ordering::SeqCst));
        assert!(!runner.is_processing());
    }

    #[tokio::test]
    async fn test_second_run_is_refused_while_processing() {
        let extractor = ScriptedExtractor::new(Vec::new());
        let runner = runner();

        let first = runner.run(
            &extractor,
            Path::new("a.pdf"),
            tokio::time::sleep(Duration::from_millis(50)),
        );
        let second = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(runner.is_processing());
            runner
                .run(&extractor, Path::new("b.pdf"), futures::future::ready(()))
                .await
        };

        let (first, second) = tokio::join!(first, second);
        assert!(matches!(first, Err(AppError::Task(_))));
        assert!(matches!(second, Err(AppError::Task(ref m)) if m.contains("already")));
        assert!(!runner.is_processing());
    }

    #[tokio::test]
    async fn test_poll_failure_cancels_the_task() {
        let extractor = ScriptedExtractor::new(vec![TaskStatus::Pending]);
        extractor.fail_polls.store(true, Ordering::SeqCst);
        let runner = runner();

        let err = runner
            .run(&extractor, Path::new("a.pdf"), futures::future::pending())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Task(ref m) if m.contains("task-1")));
        assert!(extractor.cancelled.load(Ordering::SeqCst));
        assert!(!runner.is_processing());
    }

    #[tokio::test]
    async fn test_cancel_during_upload() {
        let mut extractor = ScriptedExtractor::new(Vec::new());
        extractor.start_delay = Duration::from_secs(5);
        let runner = runner();

        let err = runner
            .run(
                &extractor,
                Path::new("a.pdf"),
                tokio::time::sleep(Duration::from_millis(20)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Task(ref m) if m.contains("cancelled")));
        assert_eq!(*extractor.polls.lock().unwrap(), 0);
        assert!(!extractor.cancelled.load(Ordering::SeqCst));
        assert!(!runner.is_processing());
    }
}
