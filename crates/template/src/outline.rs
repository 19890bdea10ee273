//! Plain-text outline of a template structure.

use autodpia_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

use crate::structure::entry_point;
use crate::types::StepMap;

const OUTLINE_TEMPLATE: &str = "# {{name}}\n\
{{#each steps}}\n[{{key}}]\n\
{{#each parts}}  - {{title}}{{#if entry}} (entry point){{/if}}{{#if source}} <- {{source}}{{/if}}\n\
{{#if content}}{{content}}\n{{/if}}\
{{/each}}\
{{else}}\n(no steps)\n\
{{/each}}";

#[derive(Serialize)]
struct OutlineView<'a> {
    name: &'a str,
    steps: Vec<OutlineStep<'a>>,
}

#[derive(Serialize)]
struct OutlineStep<'a> {
    key: &'a str,
    parts: Vec<OutlinePart<'a>>,
}

#[derive(Serialize)]
struct OutlinePart<'a> {
    title: &'a str,
    entry: bool,
    source: Option<String>,
    content: String,
}

/// Render a template as an indented outline of steps, parts and prompts.
pub fn render_outline(name: &str, structure: &StepMap) -> AppResult<String> {
    let entry = entry_point(structure);
    let steps = structure
        .iter()
        .map(|(key, parts)| OutlineStep {
            key,
            parts: parts
                .iter()
                .map(|(title, prompt)| OutlinePart {
                    title,
                    entry: Some((key, title)) == entry,
                    source: (!prompt.from.is_empty())
                        .then(|| format!("{} / {}", prompt.from.step, prompt.from.section)),
                    content: indent(&prompt.content, "      "),
                })
                .collect(),
        })
        .collect();

    render(&OutlineView { name, steps })
}

fn render(view: &OutlineView<'_>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("outline", OUTLINE_TEMPLATE)
        .map_err(|e| AppError::Template(format!("Failed to register outline template: {}", e)))?;

    handlebars
        .render("outline", view)
        .map_err(|e| AppError::Template(format!("Failed to render outline: {}", e)))
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}
