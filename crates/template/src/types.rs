//! Template types for the AutoDPIA tooling.
//!
//! This module defines the domain entities of a prompt template: steps,
//! parts, prompts and the catalogue records they are stored in.

use autodpia_core::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ordered::OrderedMap;

/// Part title -> prompt, in display order.
pub type PartMap = OrderedMap<Prompt>;

/// Step key -> parts, in display order.
pub type StepMap = OrderedMap<PartMap>;

/// Title given to the single part of a freshly added step.
pub const DEFAULT_PART_TITLE: &str = "Role";

/// Upstream dependency of a prompt.
///
/// Both fields empty means the prompt has no dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSource {
    /// Step key whose output feeds this prompt
    #[serde(rename = "Step", alias = "step", default)]
    pub step: String,

    /// Part title within that step
    #[serde(rename = "Section", alias = "section", default)]
    pub section: String,
}

impl PromptSource {
    pub fn new(step: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            section: section.into(),
        }
    }

    /// True when no dependency is set.
    pub fn is_empty(&self) -> bool {
        self.step.is_empty() && self.section.is_empty()
    }
}

/// Editable prompt text of one part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PromptRepr")]
pub struct Prompt {
    /// Prompt text sent to the report generator
    pub content: String,

    /// Optional upstream dependency
    pub from: PromptSource,
}

impl Prompt {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            from: PromptSource::default(),
        }
    }

    pub fn with_source(mut self, from: PromptSource) -> Self {
        self.from = from;
        self
    }
}

/// Accepted input shapes for a prompt.
///
/// Older template bodies map titles straight to prompt text.
#[derive(Deserialize)]
#[serde(untagged)]
enum PromptRepr {
    Text(String),
    Full {
        #[serde(default)]
        content: String,
        #[serde(default)]
        from: PromptSource,
    },
}

impl From<PromptRepr> for Prompt {
    fn from(repr: PromptRepr) -> Self {
        match repr {
            PromptRepr::Text(content) => Prompt::new(content),
            PromptRepr::Full { content, from } => Prompt { content, from },
        }
    }
}

/// Catalogue entry as served by template storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRecord {
    #[serde(rename = "tempName")]
    pub name: String,

    #[serde(rename = "userID", default)]
    pub owner_id: Option<i64>,

    /// JSON-encoded `StepMap`, empty when the template has no body yet
    #[serde(rename = "tempData", default, deserialize_with = "null_as_empty")]
    pub data: String,
}

impl TemplateRecord {
    pub fn is_builtin(&self) -> bool {
        is_builtin_owner(self.owner_id)
    }
}

fn is_builtin_owner(owner_id: Option<i64>) -> bool {
    matches!(owner_id, None | Some(0))
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a JSON-encoded structure. Blank input is an empty structure.
pub fn parse_structure(data: &str) -> AppResult<StepMap> {
    if data.trim().is_empty() {
        return Ok(StepMap::new());
    }
    serde_json::from_str(data)
        .map_err(|e| AppError::Load(format!("Invalid template structure: {}", e)))
}

/// Serialize a structure to its JSON wire form.
pub fn serialize_structure(structure: &StepMap) -> AppResult<String> {
    Ok(serde_json::to_string(structure)?)
}
