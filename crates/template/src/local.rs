//! Local file storage for templates.
//!
//! Each template lives in `<dir>/<name>.yml`; the working copy most recently
//! sent through `save_structure` lives in `<dir>/.selected.yml`. Saving a
//! structure also updates the named template when it is user-owned, so local
//! edits are never lost. Built-in templates (owner 0) are read-only.

use autodpia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::storage::TemplateStorage;
use crate::types::{serialize_structure, StepMap, TemplateRecord};

/// Owner id recorded for templates created locally.
pub const LOCAL_OWNER_ID: i64 = 1;

const WORKING_COPY_FILE: &str = ".selected.yml";

/// On-disk template document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TemplateFile {
    name: String,
    #[serde(rename = "ownerID", default)]
    owner_id: Option<i64>,
    #[serde(default)]
    structure: StepMap,
}

/// Template storage backed by YAML files in a directory.
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Add a template file directly, e.g. to seed built-ins.
    pub fn import(&self, name: &str, owner_id: Option<i64>, structure: StepMap) -> AppResult<()> {
        if name.trim().is_empty() {
            return Err(AppError::Template(
                "Template name cannot be empty".to_string(),
            ));
        }
        // Distinct names can share a file stem once sanitized
        let path = self.template_path(name);
        if path.exists() || self.find(name)?.is_some() {
            return Err(AppError::NameConflict(format!(
                "Template '{}' already exists",
                name
            )));
        }
        let file = TemplateFile {
            name: name.to_string(),
            owner_id,
            structure,
        };
        self.write(&path, &file)
    }

    fn template_path(&self, name: &str) -> PathBuf {
        let stem: String = name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.yml", stem))
    }

    fn read(&self, path: &Path) -> AppResult<TemplateFile> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Load(format!("Failed to read template file {:?}: {}", path, e))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Load(format!("Failed to parse template file {:?}: {}", path, e))
        })
    }

    fn write(&self, path: &Path, file: &TemplateFile) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::Save(format!("Failed to create template directory: {}", e))
        })?;
        let yaml = serde_yaml::to_string(file)?;
        std::fs::write(path, yaml)
            .map_err(|e| AppError::Save(format!("Failed to write {:?}: {}", path, e)))
    }

    /// All template files, skipping unreadable ones.
    fn scan(&self) -> AppResult<Vec<(PathBuf, TemplateFile)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !path.is_file() || hidden || path.extension().and_then(|s| s.to_str()) != Some("yml")
            {
                continue;
            }
            match self.read(path) {
                Ok(file) => files.push((path.to_path_buf(), file)),
                Err(e) => tracing::warn!("Skipping template file: {}", e),
            }
        }
        Ok(files)
    }

    fn find(&self, name: &str) -> AppResult<Option<(PathBuf, TemplateFile)>> {
        Ok(self.scan()?.into_iter().find(|(_, file)| file.name == name))
    }
}

fn encode(structure: &StepMap) -> AppResult<String> {
    if structure.is_empty() {
        return Ok(String::new());
    }
    serialize_structure(structure)
}

#[async_trait::async_trait]
impl TemplateStorage for LocalStorage {
    fn backend_name(&self) -> &str {
        "local"
    }

    async fn list_templates(&self) -> AppResult<Vec<TemplateRecord>> {
        self.scan()?
            .into_iter()
            .map(|(_, file)| {
                Ok(TemplateRecord {
                    data: encode(&file.structure)?,
                    name: file.name,
                    owner_id: file.owner_id,
                })
            })
            .collect()
    }

    async fn load_template(&self, name: &str) -> AppResult<String> {
        tracing::debug!("Loading local template '{}' from {:?}", name, self.dir);
        let (_, file) = self
            .find(name)?
            .ok_or_else(|| AppError::NotFound(format!("Template '{}'", name)))?;
        encode(&file.structure)
    }

    async fn save_structure(&self, name: &str, structure: &StepMap) -> AppResult<()> {
        let existing = self.find(name)?;
        let owner_id = existing.as_ref().and_then(|(_, file)| file.owner_id);

        let working_copy = TemplateFile {
            name: name.to_string(),
            owner_id,
            structure: structure.clone(),
        };
        self.write(&self.dir.join(WORKING_COPY_FILE), &working_copy)?;

        if let Some((path, file)) = existing {
            if !matches!(file.owner_id, None | Some(0)) {
                self.write(&path, &working_copy)?;
            }
        }
        Ok(())
    }

    async fn save_template_name(&self, name: &str) -> AppResult<()> {
        let working_path = self.dir.join(WORKING_COPY_FILE);
        if !working_path.exists() {
            return Err(AppError::Save("No working copy to save".to_string()));
        }
        let working_copy = self.read(&working_path)?;
        if working_copy.structure.is_empty() {
            return Err(AppError::Save("Working copy has no structure".to_string()));
        }
        self.import(name, Some(LOCAL_OWNER_ID), working_copy.structure)
    }

    async fn delete_template(&self, name: &str) -> AppResult<()> {
        let (path, file) = self
            .find(name)?
            .ok_or_else(|| AppError::NotFound(format!("Template '{}'", name)))?;
        if matches!(file.owner_id, None | Some(0)) {
            return Err(AppError::Template(format!(
                "Built-in template '{}' cannot be deleted",
                name
            )));
        }
        std::fs::remove_file(&path)?;
        Ok(())
    }
}
