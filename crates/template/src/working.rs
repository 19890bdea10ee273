//! Working copy kept between editor sessions.
//!
//! The remote backend only stores a template's body when it is registered
//! under a name, so a CLI session that exits would otherwise lose its edits.
//! The store holds one working copy, keyed by template name, as JSON.

use autodpia_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::StepMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct WorkingCopy {
    name: String,
    #[serde(default)]
    structure: StepMap,
}

/// File-backed store for the current working copy.
#[derive(Debug, Clone)]
pub struct WorkingCopyStore {
    path: PathBuf,
}

impl WorkingCopyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The kept structure for `name`, if the working copy belongs to it.
    ///
    /// An unreadable file is treated as no working copy.
    pub fn load(&self, name: &str) -> Option<StepMap> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<WorkingCopy>(&contents) {
            Ok(copy) if copy.name == name => Some(copy.structure),
            Ok(copy) => {
                tracing::debug!("Working copy belongs to '{}', not '{}'", copy.name, name);
                None
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable working copy {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Name of the template the working copy belongs to.
    pub fn current(&self) -> Option<String> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str::<WorkingCopy>(&contents)
            .ok()
            .map(|copy| copy.name)
    }

    /// Replace the working copy.
    pub fn save(&self, name: &str, structure: &StepMap) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let copy = WorkingCopy {
            name: name.to_string(),
            structure: structure.clone(),
        };
        let json = serde_json::to_string_pretty(&copy)?;
        std::fs::write(&self.path, json).map_err(|e| {
            AppError::Save(format!("Failed to write working copy {:?}: {}", self.path, e))
        })
    }

    /// Forget the working copy. A missing file is not an error.
    pub fn clear(&self) -> AppResult<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
