//! Dependency checks for prompt sources.
//!
//! A prompt's `from` names the step and part whose generated text feeds it.
//! Nothing stops an edit from pointing at a part that does not exist, and the
//! report generator only resolves parts it has already produced, so this
//! check surfaces every reference that will not resolve. It never blocks an
//! edit.

use serde::Serialize;
use std::fmt;

use crate::structure::entry_point;
use crate::types::{PromptSource, StepMap};

/// Why a source reference will not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceIssue {
    /// Only one of step/section is set
    Incomplete,
    MissingStep,
    MissingSection,
    /// The source is the part itself or comes after it
    NotEarlier,
}

impl fmt::Display for SourceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SourceIssue::Incomplete => "source needs both a step and a section",
            SourceIssue::MissingStep => "source step does not exist",
            SourceIssue::MissingSection => "source section does not exist in that step",
            SourceIssue::NotEarlier => "source is not generated before this part",
        };
        f.write_str(text)
    }
}

/// One unresolvable reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceWarning {
    pub step: String,
    pub title: String,
    pub from: PromptSource,
    pub issue: SourceIssue,
}

impl fmt::Display for SourceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {} -> {} / {}: {}",
            self.step, self.title, self.from.step, self.from.section, self.issue
        )
    }
}

/// Report every source reference that will not resolve, in display order.
pub fn check_sources(structure: &StepMap) -> Vec<SourceWarning> {
    let order: Vec<(&str, &str)> = structure
        .iter()
        .flat_map(|(step, parts)| parts.keys().map(move |title| (step, title)))
        .collect();
    let entry = entry_point(structure);

    let mut warnings = Vec::new();
    for (index, &(step, title)) in order.iter().enumerate() {
        if Some((step, title)) == entry {
            continue;
        }
        let Some(prompt) = structure.get(step).and_then(|parts| parts.get(title)) else {
            continue;
        };
        let from = &prompt.from;
        if from.is_empty() {
            continue;
        }

        let issue = if from.step.is_empty() || from.section.is_empty() {
            Some(SourceIssue::Incomplete)
        } else if !structure.contains_key(&from.step) {
            Some(SourceIssue::MissingStep)
        } else {
            match order
                .iter()
                .position(|&(s, t)| s == from.step && t == from.section)
            {
                None => Some(SourceIssue::MissingSection),
                Some(source_index) if source_index >= index => Some(SourceIssue::NotEarlier),
                Some(_) => None,
            }
        };

        if let Some(issue) = issue {
            warnings.push(SourceWarning {
                step: step.to_string(),
                title: title.to_string(),
                from: from.clone(),
                issue,
            });
        }
    }

    if !warnings.is_empty() {
        tracing::debug!("Found {} unresolved prompt sources", warnings.len());
    }
    warnings
}
