//! Structural transforms over a template body.
//!
//! Every function here is a pure in-memory edit of a `StepMap`. They return
//! whether anything changed so the caller can skip redundant saves. Unknown
//! steps or titles are no-ops, and deletions stop at one step / one part.

use autodpia_core::{AppError, AppResult};
use std::collections::HashMap;

use crate::step_key::StepKey;
use crate::types::{PartMap, Prompt, PromptSource, StepMap, DEFAULT_PART_TITLE};

/// Prefix of generated part titles.
const NEW_TITLE_PREFIX: &str = "New Title";

/// First part of the first step. It never takes an upstream dependency.
pub fn entry_point(structure: &StepMap) -> Option<(&str, &str)> {
    let (step, parts) = structure.first()?;
    let (title, _) = parts.first()?;
    Some((step, title))
}

/// Insert a new step after `after`, shifting later standard steps up by one.
pub fn add_step(structure: &mut StepMap, after: &str) -> bool {
    let Some(after_index) = structure.position(after) else {
        return false;
    };

    let parsed_after = StepKey::parse(after);
    let base = match &parsed_after {
        Some(key) => key.number,
        None => structure
            .keys()
            .take(after_index)
            .filter_map(StepKey::parse)
            .map(|key| key.number)
            .last()
            .unwrap_or(0),
    };

    let Some(new_number) = base.checked_add(1) else {
        return false;
    };
    let shifted_overflows = structure
        .keys()
        .filter_map(StepKey::parse)
        .any(|key| key.number > base && key.number == u32::MAX);
    if shifted_overflows {
        return false;
    }

    // Sub-steps that follow their parent stay attached to it
    let mut insert_at = after_index + 1;
    if parsed_after.is_some() {
        while let Some((key, _)) = structure.get_index(insert_at) {
            match StepKey::parse(key) {
                Some(next) if next.number == base && next.is_sub_step() => insert_at += 1,
                _ => break,
            }
        }
    }

    let shifted = std::mem::take(structure).map_keys(|key| match StepKey::parse(key) {
        Some(step) if step.number > base => step.renumbered(step.number + 1).to_string(),
        _ => key.to_string(),
    });
    *structure = shifted;

    let mut parts = PartMap::new();
    parts.insert(DEFAULT_PART_TITLE, Prompt::default());
    structure.insert_at(insert_at, StepKey::plain(new_number).to_string(), parts)
}

/// Remove a step and renumber the remaining standard steps from 1.
pub fn delete_step(structure: &mut StepMap, key: &str) -> bool {
    if structure.len() <= 1 || structure.remove(key).is_none() {
        return false;
    }
    *structure = renumber_steps(std::mem::take(structure));
    true
}

/// Renumber standard step keys contiguously from 1.
///
/// Numbers are assigned in order of first appearance, so sub-steps follow
/// their parent's new number and non-standard keys keep their place.
pub fn renumber_steps(structure: StepMap) -> StepMap {
    let mut assigned: HashMap<u32, u32> = HashMap::new();
    let mut next = 1;
    for key in structure.keys().filter_map(StepKey::parse) {
        assigned.entry(key.number).or_insert_with(|| {
            let number = next;
            next += 1;
            number
        });
    }

    structure.map_keys(|key| match StepKey::parse(key) {
        Some(step) => {
            let number = assigned.get(&step.number).copied().unwrap_or(step.number);
            step.renumbered(number).to_string()
        }
        None => key.to_string(),
    })
}

/// Replace a step key in place.
///
/// Empty or unchanged keys are no-ops; an existing key is a conflict.
pub fn rename_step(structure: &mut StepMap, key: &str, new_key: &str) -> AppResult<bool> {
    if new_key.is_empty() || new_key == key || !structure.contains_key(key) {
        return Ok(false);
    }
    if structure.contains_key(new_key) {
        return Err(AppError::NameConflict(format!(
            "Step '{}' already exists",
            new_key
        )));
    }
    Ok(structure.rename_key(key, new_key))
}

/// Lowest unused `New Title <k>` in a step.
pub fn next_part_title(parts: &PartMap) -> String {
    (1..)
        .map(|k: u32| format!("{} {}", NEW_TITLE_PREFIX, k))
        .find(|title| !parts.contains_key(title))
        .unwrap_or_else(|| NEW_TITLE_PREFIX.to_string())
}

/// Insert a fresh part right after `after_title`. Returns the new title.
pub fn add_part(structure: &mut StepMap, step: &str, after_title: &str) -> Option<String> {
    let parts = structure.get_mut(step)?;
    let index = parts.position(after_title)?;
    let title = next_part_title(parts);
    parts
        .insert_at(index + 1, title.clone(), Prompt::default())
        .then_some(title)
}

/// Remove a part unless it is the last one in its step.
pub fn delete_part(structure: &mut StepMap, step: &str, title: &str) -> bool {
    match structure.get_mut(step) {
        Some(parts) if parts.len() > 1 => parts.remove(title).is_some(),
        _ => false,
    }
}

/// Replace a part title in place.
///
/// An empty title keeps the original; an existing title is a conflict.
pub fn rename_part(
    structure: &mut StepMap,
    step: &str,
    title: &str,
    new_title: &str,
) -> AppResult<bool> {
    let Some(parts) = structure.get_mut(step) else {
        return Ok(false);
    };
    if new_title.is_empty() || new_title == title || !parts.contains_key(title) {
        return Ok(false);
    }
    if parts.contains_key(new_title) {
        return Err(AppError::NameConflict(format!(
            "Part '{}' already exists in '{}'",
            new_title, step
        )));
    }
    Ok(parts.rename_key(title, new_title))
}

pub fn set_prompt_content(structure: &mut StepMap, step: &str, title: &str, content: &str) -> bool {
    match prompt_mut(structure, step, title) {
        Some(prompt) if prompt.content != content => {
            prompt.content = content.to_string();
            true
        }
        _ => false,
    }
}

pub fn set_prompt_source(
    structure: &mut StepMap,
    step: &str,
    title: &str,
    from: PromptSource,
) -> bool {
    match prompt_mut(structure, step, title) {
        Some(prompt) if prompt.from != from => {
            prompt.from = from;
            true
        }
        _ => false,
    }
}

fn prompt_mut<'a>(structure: &'a mut StepMap, step: &str, title: &str) -> Option<&'a mut Prompt> {
    structure.get_mut(step)?.get_mut(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_structure;
    use proptest::prelude::*;

    /// Steps whose single "Role" part records the original key as content.
    fn steps(keys: &[&str]) -> StepMap {
        keys.iter()
            .map(|key| {
                let mut parts = PartMap::new();
                parts.insert("Role", Prompt::new(*key));
                (key.to_string(), parts)
            })
            .collect()
    }

    fn keys(structure: &StepMap) -> Vec<&str> {
        structure.keys().collect()
    }

    fn origins(structure: &StepMap) -> Vec<String> {
        structure
            .values()
            .map(|parts| parts.get("Role").map(|p| p.content.clone()).unwrap_or_default())
            .collect()
    }

    fn part_titles<'a>(structure: &'a StepMap, step: &str) -> Vec<&'a str> {
        structure.get(step).map(|p| p.keys().collect()).unwrap_or_default()
    }

    #[test]
    fn test_add_step_shifts_later_steps() {
        let mut structure = steps(&["Step 1", "Step 2", "Step 3"]);
        assert!(add_step(&mut structure, "Step 2"));

        assert_eq!(keys(&structure), vec!["Step 1", "Step 2", "Step 3", "Step 4"]);
        assert_eq!(origins(&structure)[3], "Step 3");
        let new_step = structure.get("Step 3").unwrap();
        assert_eq!(new_step.keys().collect::<Vec<_>>(), vec!["Role"]);
        assert_eq!(new_step.get("Role"), Some(&Prompt::default()));
    }

    #[test]
    fn test_add_step_after_last() {
        let mut structure = steps(&["Step 1"]);
        assert!(add_step(&mut structure, "Step 1"));
        assert_eq!(keys(&structure), vec!["Step 1", "Step 2"]);
    }

    #[test]
    fn test_add_step_keeps_suffixes_and_sub_steps() {
        let mut structure = steps(&["Step 1 - Intro", "Step 1.1", "Step 2 - Scope", "Step 2.1"]);
        assert!(add_step(&mut structure, "Step 1 - Intro"));
        assert_eq!(
            keys(&structure),
            vec!["Step 1 - Intro", "Step 1.1", "Step 2", "Step 3 - Scope", "Step 3.1"]
        );
    }

    #[test]
    fn test_add_step_after_non_standard_key() {
        let mut structure = steps(&["Step 1", "Appendix", "Step 2"]);
        assert!(add_step(&mut structure, "Appendix"));
        assert_eq!(keys(&structure), vec!["Step 1", "Appendix", "Step 2", "Step 3"]);
        assert_eq!(origins(&structure)[3], "Step 2");

        let mut leading = steps(&["Preface", "Step 1"]);
        assert!(add_step(&mut leading, "Preface"));
        assert_eq!(keys(&leading), vec!["Preface", "Step 1", "Step 2"]);
        assert_eq!(origins(&leading)[2], "Step 1");
    }

    #[test]
    fn test_add_step_unknown_key_is_noop() {
        let mut structure = steps(&["Step 1"]);
        let before = structure.clone();
        assert!(!add_step(&mut structure, "Step 9"));
        assert_eq!(structure, before);
    }

    #[test]
    fn test_delete_step_renumbers() {
        let mut structure = steps(&["Step 1", "Step 2", "Step 3", "Step 4"]);
        assert!(delete_step(&mut structure, "Step 2"));
        assert_eq!(keys(&structure), vec!["Step 1", "Step 2", "Step 3"]);
        assert_eq!(origins(&structure), vec!["Step 1", "Step 3", "Step 4"]);
    }

    #[test]
    fn test_delete_step_keeps_sub_steps_attached() {
        let mut structure = steps(&["Step 1", "Step 2", "Step 3", "Step 3.1", "Notes", "Step 4"]);
        assert!(delete_step(&mut structure, "Step 2"));
        assert_eq!(
            keys(&structure),
            vec!["Step 1", "Step 2", "Step 2.1", "Notes", "Step 3"]
        );
        assert_eq!(origins(&structure)[2], "Step 3.1");
    }

    #[test]
    fn test_delete_sole_step_is_identical() {
        let mut structure = parse_structure(
            r#"{"Step 1":{"Role":{"content":"","from":{"Step":"","Section":""}}}}"#,
        )
        .unwrap();
        let before = serde_json::to_string(&structure).unwrap();

        assert!(!delete_step(&mut structure, "Step 1"));
        assert_eq!(serde_json::to_string(&structure).unwrap(), before);
    }

    #[test]
    fn test_rename_step() {
        let mut structure = steps(&["Step 1", "Step 2"]);
        assert!(rename_step(&mut structure, "Step 1", "Step 1 - Context").unwrap());
        assert_eq!(keys(&structure), vec!["Step 1 - Context", "Step 2"]);
        assert_eq!(origins(&structure)[0], "Step 1");

        assert!(!rename_step(&mut structure, "Step 2", "").unwrap());
        assert!(!rename_step(&mut structure, "Missing", "Other").unwrap());
    }

    #[test]
    fn test_rename_step_conflict_leaves_structure() {
        let mut structure = steps(&["Step 1", "Step 2"]);
        let before = structure.clone();
        let err = rename_step(&mut structure, "Step 1", "Step 2").unwrap_err();
        assert!(err.is_name_conflict());
        assert_eq!(structure, before);
    }

    #[test]
    fn test_add_part_after_role() {
        let mut structure = parse_structure(
            r#"{"Step 1":{"Role":{"content":"","from":{"Step":"","Section":""}}}}"#,
        )
        .unwrap();
        assert_eq!(
            add_part(&mut structure, "Step 1", "Role"),
            Some("New Title 1".to_string())
        );
        assert_eq!(part_titles(&structure, "Step 1"), vec!["Role", "New Title 1"]);
        assert_eq!(
            structure.get("Step 1").unwrap().get("New Title 1"),
            Some(&Prompt::default())
        );
    }

    #[test]
    fn test_add_part_skips_taken_titles() {
        let mut structure = StepMap::new();
        let mut parts = PartMap::new();
        parts.insert("Role", Prompt::new("r"));
        parts.insert("X", Prompt::new("x"));
        parts.insert("New Title 1", Prompt::new("n"));
        structure.insert("Step 1", parts);

        assert_eq!(
            add_part(&mut structure, "Step 1", "Role"),
            Some("New Title 2".to_string())
        );
        assert_eq!(
            part_titles(&structure, "Step 1"),
            vec!["Role", "New Title 2", "X", "New Title 1"]
        );
        assert_eq!(
            structure.get("Step 1").unwrap().get("X"),
            Some(&Prompt::new("x"))
        );
    }

    #[test]
    fn test_add_part_unknown_target() {
        let mut structure = steps(&["Step 1"]);
        assert_eq!(add_part(&mut structure, "Step 2", "Role"), None);
        assert_eq!(add_part(&mut structure, "Step 1", "Nope"), None);
        assert_eq!(structure, steps(&["Step 1"]));
    }

    #[test]
    fn test_delete_part_floor() {
        let mut structure = steps(&["Step 1"]);
        assert!(!delete_part(&mut structure, "Step 1", "Role"));
        assert_eq!(part_titles(&structure, "Step 1"), vec!["Role"]);

        add_part(&mut structure, "Step 1", "Role");
        assert!(delete_part(&mut structure, "Step 1", "Role"));
        assert_eq!(part_titles(&structure, "Step 1"), vec!["New Title 1"]);
    }

    #[test]
    fn test_rename_part() {
        let mut structure = steps(&["Step 1"]);
        add_part(&mut structure, "Step 1", "Role");

        assert!(rename_part(&mut structure, "Step 1", "Role", "Persona").unwrap());
        assert_eq!(part_titles(&structure, "Step 1"), vec!["Persona", "New Title 1"]);
        assert_eq!(
            structure.get("Step 1").unwrap().get("Persona"),
            Some(&Prompt::new("Step 1"))
        );
    }

    #[test]
    fn test_rename_part_empty_is_noop() {
        let mut structure = steps(&["Step 1"]);
        let before = structure.clone();
        assert!(!rename_part(&mut structure, "Step 1", "Role", "").unwrap());
        assert_eq!(structure, before);
    }

    #[test]
    fn test_rename_part_conflict() {
        let mut structure = steps(&["Step 1"]);
        add_part(&mut structure, "Step 1", "Role");
        let err = rename_part(&mut structure, "Step 1", "New Title 1", "Role").unwrap_err();
        assert!(err.is_name_conflict());
        assert_eq!(part_titles(&structure, "Step 1"), vec!["Role", "New Title 1"]);
    }

    #[test]
    fn test_set_prompt_fields() {
        let mut structure = steps(&["Step 1", "Step 2"]);
        assert!(set_prompt_content(&mut structure, "Step 2", "Role", "Summarise risks"));
        assert!(!set_prompt_content(&mut structure, "Step 2", "Role", "Summarise risks"));
        assert!(!set_prompt_content(&mut structure, "Step 3", "Role", "x"));

        // Dangling sources are accepted at edit time
        let source = PromptSource::new("Step 7", "Ghost");
        assert!(set_prompt_source(&mut structure, "Step 2", "Role", source.clone()));

        let prompt = structure.get("Step 2").unwrap().get("Role").unwrap();
        assert_eq!(prompt.content, "Summarise risks");
        assert_eq!(prompt.from, source);
    }

    #[test]
    fn test_entry_point() {
        let structure = steps(&["Intro", "Step 1"]);
        assert_eq!(entry_point(&structure), Some(("Intro", "Role")));
        assert_eq!(entry_point(&StepMap::new()), None);
    }

    fn arb_step_key() -> impl Strategy<Value = String> {
        prop_oneof![
            (1u32..6).prop_map(|n| format!("Step {}", n)),
            (1u32..6, 1u32..3).prop_map(|(n, m)| format!("Step {}.{}", n, m)),
            (1u32..6).prop_map(|n| format!("Step {} - Detail", n)),
            "[A-Z][a-z]{2,6}",
        ]
    }

    fn arb_structure() -> impl Strategy<Value = StepMap> {
        prop::collection::vec(arb_step_key(), 1..8).prop_map(|keys| {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            steps(&keys)
        })
    }

    fn standard_numbers(structure: &StepMap) -> Vec<u32> {
        let mut numbers: Vec<u32> = structure
            .keys()
            .filter_map(StepKey::parse)
            .map(|key| key.number)
            .collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
    }

    proptest! {
        #[test]
        fn delete_step_keeps_numbers_contiguous(structure in arb_structure(), pick in any::<prop::sample::Index>()) {
            prop_assume!(structure.len() >= 2);
            let victim = structure.get_index(pick.index(structure.len())).unwrap().0.to_string();
            let mut expected_origins = origins(&structure);
            expected_origins.retain(|origin| origin != &victim);

            let mut edited = structure.clone();
            prop_assert!(delete_step(&mut edited, &victim));
            prop_assert_eq!(edited.len(), structure.len() - 1);

            let numbers = standard_numbers(&edited);
            let contiguous: Vec<u32> = (1..=numbers.len() as u32).collect();
            prop_assert_eq!(numbers, contiguous);
            prop_assert_eq!(origins(&edited), expected_origins);
        }

        #[test]
        fn delete_sole_step_is_noop(key in arb_step_key()) {
            let structure = steps(&[key.as_str()]);
            let mut edited = structure.clone();
            prop_assert!(!delete_step(&mut edited, &key));
            prop_assert_eq!(edited, structure);
        }

        #[test]
        fn add_step_grows_by_one_and_keeps_order(structure in arb_structure(), pick in any::<prop::sample::Index>()) {
            let after = structure.get_index(pick.index(structure.len())).unwrap().0.to_string();
            let mut edited = structure.clone();
            prop_assert!(add_step(&mut edited, &after));
            prop_assert_eq!(edited.len(), structure.len() + 1);

            let mut remaining = origins(&edited);
            remaining.retain(|origin| !origin.is_empty());
            prop_assert_eq!(remaining, origins(&structure));
        }

        #[test]
        fn structure_survives_json(structure in arb_structure()) {
            let json = serde_json::to_string(&structure).unwrap();
            prop_assert_eq!(parse_structure(&json).unwrap(), structure);
        }
    }
}
