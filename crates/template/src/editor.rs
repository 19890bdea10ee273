//! Template structure editor.
//!
//! The editor owns the catalogue cache and, while a template is selected,
//! the working copy of its structure. It has two states:
//!
//! - **Unselected**: no template chosen; every structural operation is refused.
//! - **Editing**: a structure is loaded; every structural operation applies a
//!   pure transform from [`crate::structure`] and, if the structure changed,
//!   persists the whole structure through [`TemplateStorage::save_structure`].
//!
//! Load and save failures are logged and absorbed: the in-memory structure
//! stays the user's working copy for the rest of the session.

use autodpia_core::{AppError, AppResult};
use std::sync::Arc;

use crate::sources::{check_sources, SourceWarning};
use crate::storage::TemplateStorage;
use crate::structure;
use crate::types::{parse_structure, PromptSource, StepMap, TemplateRecord};

/// Editor lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorState {
    Unselected,
    Editing { name: String, structure: StepMap },
}

/// Stateful editor for one user session.
pub struct TemplateEditor {
    storage: Arc<dyn TemplateStorage>,
    templates: Vec<TemplateRecord>,
    state: EditorState,
}

impl TemplateEditor {
    pub fn new(storage: Arc<dyn TemplateStorage>) -> Self {
        Self {
            storage,
            templates: Vec::new(),
            state: EditorState::Unselected,
        }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, EditorState::Editing { .. })
    }

    /// Name of the selected template.
    pub fn selected(&self) -> Option<&str> {
        match &self.state {
            EditorState::Editing { name, .. } => Some(name.as_str()),
            EditorState::Unselected => None,
        }
    }

    /// Working copy of the selected template.
    pub fn structure(&self) -> Option<&StepMap> {
        match &self.state {
            EditorState::Editing { structure, .. } => Some(structure),
            EditorState::Unselected => None,
        }
    }

    /// Last fetched catalogue.
    pub fn templates(&self) -> &[TemplateRecord] {
        &self.templates
    }

    /// Re-fetch the catalogue. On failure the previous cache is kept.
    pub async fn refresh(&mut self) -> &[TemplateRecord] {
        match self.storage.list_templates().await {
            Ok(templates) => {
                tracing::debug!(
                    "Fetched {} templates from {}",
                    templates.len(),
                    self.storage.backend_name()
                );
                self.templates = templates;
            }
            Err(e) => tracing::warn!("Failed to list templates: {}", e),
        }
        &self.templates
    }

    /// Load a template and enter Editing.
    ///
    /// A body that cannot be fetched or parsed becomes an empty structure.
    /// The loaded structure is always echoed back through storage so the
    /// backend's working copy matches the selection. Selecting `""` clears
    /// the selection.
    pub async fn select_template(&mut self, name: &str) {
        if name.is_empty() {
            self.clear_selection();
            return;
        }

        let loaded = match self.storage.load_template(name).await {
            Ok(data) => parse_structure(&data),
            Err(e) => Err(e),
        };

        let structure = loaded.unwrap_or_else(|e| {
            tracing::warn!("Failed to load template '{}': {}", name, e);
            StepMap::new()
        });
        if structure.is_empty() {
            tracing::info!("Template '{}' has no body yet", name);
        }

        tracing::info!("Selected template '{}' ({} steps)", name, structure.len());
        self.enter(name, structure).await;
    }

    /// Enter Editing on a working copy kept from an earlier session.
    ///
    /// The storage is not consulted for the body; the working copy is sent
    /// to it so later saves build on the resumed edits.
    pub async fn resume(&mut self, name: &str, structure: StepMap) {
        tracing::info!("Resumed template '{}' ({} steps)", name, structure.len());
        self.enter(name, structure).await;
    }

    async fn enter(&mut self, name: &str, structure: StepMap) {
        self.state = EditorState::Editing {
            name: name.to_string(),
            structure,
        };
        self.persist().await;
    }

    /// Drop the working copy and return to Unselected.
    pub fn clear_selection(&mut self) {
        if let Some(name) = self.selected() {
            tracing::debug!("Closing template '{}'", name);
        }
        self.state = EditorState::Unselected;
    }

    /// Register the working copy under a new name.
    pub async fn create_template(&mut self, name: &str) -> AppResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Template(
                "Template name cannot be empty".to_string(),
            ));
        }
        self.editing()?;

        self.storage.save_template_name(name).await?;
        tracing::info!("Saved working copy as template '{}'", name);
        self.refresh().await;
        Ok(())
    }

    /// Delete a user-owned template.
    ///
    /// Deleting the selected template returns the editor to Unselected.
    pub async fn delete_template(&mut self, name: &str) -> AppResult<()> {
        if !self.templates.iter().any(|t| t.name == name) {
            self.refresh().await;
        }

        let record = self
            .templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AppError::NotFound(format!("Template '{}'", name)))?;

        if record.is_builtin() {
            return Err(AppError::Template(format!(
                "Built-in template '{}' cannot be deleted",
                name
            )));
        }

        self.storage.delete_template(name).await?;
        tracing::info!("Deleted template '{}'", name);

        if self.selected() == Some(name) {
            self.clear_selection();
        }
        self.refresh().await;
        Ok(())
    }

    pub async fn add_step(&mut self, after: &str) -> AppResult<bool> {
        let changed = structure::add_step(self.editing_mut()?, after);
        self.after_edit("add step", changed).await;
        Ok(changed)
    }

    pub async fn delete_step(&mut self, key: &str) -> AppResult<bool> {
        let changed = structure::delete_step(self.editing_mut()?, key);
        self.after_edit("delete step", changed).await;
        Ok(changed)
    }

    /// Fails with `NameConflict` if `new_key` is already a step.
    pub async fn rename_step(&mut self, key: &str, new_key: &str) -> AppResult<bool> {
        let changed = structure::rename_step(self.editing_mut()?, key, new_key)?;
        self.after_edit("rename step", changed).await;
        Ok(changed)
    }

    /// Returns the generated title.
    pub async fn add_part(&mut self, step: &str, after_title: &str) -> AppResult<Option<String>> {
        let title = structure::add_part(self.editing_mut()?, step, after_title);
        self.after_edit("add part", title.is_some()).await;
        Ok(title)
    }

    pub async fn delete_part(&mut self, step: &str, title: &str) -> AppResult<bool> {
        let changed = structure::delete_part(self.editing_mut()?, step, title);
        self.after_edit("delete part", changed).await;
        Ok(changed)
    }

    /// Fails with `NameConflict` if `new_title` already exists in the step.
    pub async fn rename_part(
        &mut self,
        step: &str,
        title: &str,
        new_title: &str,
    ) -> AppResult<bool> {
        let changed = structure::rename_part(self.editing_mut()?, step, title, new_title)?;
        self.after_edit("rename part", changed).await;
        Ok(changed)
    }

    pub async fn set_prompt_content(
        &mut self,
        step: &str,
        title: &str,
        content: &str,
    ) -> AppResult<bool> {
        let changed = structure::set_prompt_content(self.editing_mut()?, step, title, content);
        self.after_edit("set prompt content", changed).await;
        Ok(changed)
    }

    pub async fn set_prompt_source(
        &mut self,
        step: &str,
        title: &str,
        from: PromptSource,
    ) -> AppResult<bool> {
        let changed = structure::set_prompt_source(self.editing_mut()?, step, title, from);
        self.after_edit("set prompt source", changed).await;
        Ok(changed)
    }

    /// Dependency warnings for the working copy.
    pub fn check_sources(&self) -> AppResult<Vec<SourceWarning>> {
        Ok(check_sources(self.editing()?))
    }

    /// Send the whole working copy to storage.
    ///
    /// Returns whether the save succeeded; failures are only logged.
    pub async fn persist(&self) -> bool {
        let EditorState::Editing { name, structure } = &self.state else {
            return false;
        };

        match self.storage.save_structure(name, structure).await {
            Ok(()) => {
                tracing::debug!("Persisted template '{}' ({} steps)", name, structure.len());
                true
            }
            Err(e) => {
                tracing::warn!("Failed to save template '{}': {}", name, e);
                false
            }
        }
    }

    async fn after_edit(&self, operation: &str, changed: bool) {
        if changed {
            self.persist().await;
        } else {
            tracing::debug!("{} left the structure unchanged", operation);
        }
    }

    fn editing(&self) -> AppResult<&StepMap> {
        self.structure()
            .ok_or_else(|| AppError::Template("No template selected".to_string()))
    }

    fn editing_mut(&mut self) -> AppResult<&mut StepMap> {
        match &mut self.state {
            EditorState::Editing { structure, .. } => Ok(structure),
            EditorState::Unselected => {
                Err(AppError::Template("No template selected".to_string()))
            }
        }
    }
}
