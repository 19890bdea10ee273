//! In-memory storage double shared by the crate's tests.

use autodpia_core::{AppError, AppResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::storage::TemplateStorage;
use crate::types::{serialize_structure, StepMap, TemplateRecord};

#[derive(Default)]
pub(crate) struct MemoryStorage {
    templates: Mutex<Vec<TemplateRecord>>,
    saves: Mutex<Vec<(String, String)>>,
    pub(crate) fail_saves: AtomicBool,
    pub(crate) fail_loads: AtomicBool,
}

impl MemoryStorage {
    pub(crate) fn with_templates(templates: Vec<TemplateRecord>) -> Self {
        Self {
            templates: Mutex::new(templates),
            ..Default::default()
        }
    }

    pub(crate) fn record(name: &str, owner_id: Option<i64>, data: &str) -> TemplateRecord {
        TemplateRecord {
            name: name.to_string(),
            owner_id,
            data: data.to_string(),
        }
    }

    /// Every successful `save_structure` call as (name, json).
    pub(crate) fn saves(&self) -> Vec<(String, String)> {
        self.saves.lock().unwrap().clone()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.templates
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl TemplateStorage for MemoryStorage {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn list_templates(&self) -> AppResult<Vec<TemplateRecord>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(AppError::Load("storage offline".to_string()));
        }
        Ok(self.templates.lock().unwrap().clone())
    }

    async fn load_template(&self, name: &str) -> AppResult<String> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(AppError::Load("storage offline".to_string()));
        }
        self.templates
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.data.clone())
            .ok_or_else(|| AppError::NotFound(format!("Template '{}'", name)))
    }

    async fn save_structure(&self, name: &str, structure: &StepMap) -> AppResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(AppError::Save("storage offline".to_string()));
        }
        let json = serialize_structure(structure)?;
        self.saves.lock().unwrap().push((name.to_string(), json));
        Ok(())
    }

    async fn save_template_name(&self, name: &str) -> AppResult<()> {
        let working_copy = self
            .saves
            .lock()
            .unwrap()
            .last()
            .map(|(_, json)| json.clone())
            .ok_or_else(|| AppError::Save("no working copy".to_string()))?;

        let mut templates = self.templates.lock().unwrap();
        if templates.iter().any(|t| t.name == name) {
            return Err(AppError::NameConflict(format!(
                "Template '{}' already exists",
                name
            )));
        }
        templates.push(Self::record(name, Some(1), &working_copy));
        Ok(())
    }

    async fn delete_template(&self, name: &str) -> AppResult<()> {
        let mut templates = self.templates.lock().unwrap();
        let before = templates.len();
        templates.retain(|t| t.name != name || t.is_builtin());
        if templates.len() == before {
            return Err(AppError::NotFound(format!("Template '{}'", name)));
        }
        Ok(())
    }
}
