//! Template structure editing for AutoDPIA.
//!
//! This crate provides:
//! - The ordered step/part/prompt model and its JSON wire format
//! - Pure structure transforms (add, delete, rename, renumber)
//! - The editor session that persists every change through a storage backend
//! - Local file storage, the kept working copy and the extraction task runner
//! - Source dependency checks and a plain-text outline renderer

pub mod editor;
pub mod extract;
pub mod local;
pub mod ordered;
pub mod outline;
pub mod sources;
pub mod step_key;
pub mod storage;
pub mod structure;
pub mod types;
pub mod working;

#[cfg(test)]
mod testing;

// Re-export main types
pub use editor::{EditorState, TemplateEditor};
pub use extract::{ExtractionOutcome, ExtractionRunner};
pub use local::LocalStorage;
pub use ordered::OrderedMap;
pub use outline::render_outline;
pub use sources::{check_sources, SourceIssue, SourceWarning};
pub use step_key::StepKey;
pub use storage::{TaskId, TaskStatus, TemplateExtractor, TemplateStorage};
pub use types::{
    parse_structure, serialize_structure, PartMap, Prompt, PromptSource, StepMap, TemplateRecord,
    DEFAULT_PART_TITLE,
};
pub use working::WorkingCopyStore;
