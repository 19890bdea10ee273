//! Template command handler.
//!
//! Every editing command opens the template, applies one change, and prints
//! the resulting outline. Changes are persisted by the editor as they are
//! made, and the working copy is kept in `.autodpia/working.json` so the next
//! command resumes from it instead of the stored template.

use autodpia_core::{config::AppConfig, AppError, AppResult};
use autodpia_template::local::LOCAL_OWNER_ID;
use autodpia_template::{
    parse_structure, render_outline, ExtractionRunner, LocalStorage, PromptSource, StepMap,
    TemplateEditor, WorkingCopyStore,
};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::open_backend;

/// List, inspect and edit templates
#[derive(Args, Debug)]
pub struct TemplateCommand {
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Subcommand, Debug)]
pub enum TemplateAction {
    /// List available templates
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a template's steps, parts and prompts
    Show {
        name: String,
        /// Output the structure as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a copy of an existing template under a new name
    Create {
        name: String,
        /// Template to copy
        #[arg(long)]
        from: String,
    },
    /// Delete a user-owned template
    Delete { name: String },
    /// Forget the kept working copy so the next command reloads the template
    Discard,
    /// Report prompt sources that will not resolve
    Check {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply one edit to a template
    Edit(EditCommand),
    /// Extract a new template from a document (Ctrl-C cancels)
    Extract {
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a template from a JSON structure file (local backend)
    Import {
        name: String,
        file: PathBuf,
        /// Mark the template as built-in (read-only)
        #[arg(long)]
        builtin: bool,
    },
}

/// Apply one edit to a template
#[derive(Args, Debug)]
pub struct EditCommand {
    /// Template to edit
    pub name: String,

    #[command(subcommand)]
    pub op: EditOp,
}

#[derive(Subcommand, Debug)]
pub enum EditOp {
    /// Insert a new step after the given one, shifting later steps down
    AddStep { after: String },
    /// Delete a step and renumber the rest
    DeleteStep { key: String },
    /// Rename a step key
    RenameStep { key: String, new_key: String },
    /// Insert a new part after the given one
    AddPart { step: String, after: String },
    /// Delete a part
    DeletePart { step: String, title: String },
    /// Rename a part title
    RenamePart {
        step: String,
        title: String,
        new_title: String,
    },
    /// Replace a prompt's text
    SetPrompt {
        step: String,
        title: String,
        /// New prompt text
        #[arg(required_unless_present = "file")]
        content: Option<String>,
        /// Read the prompt text from a file
        #[arg(long, conflicts_with = "content")]
        file: Option<PathBuf>,
    },
    /// Set or clear the step/part that feeds a prompt
    SetSource {
        step: String,
        title: String,
        /// Source step (omit both to clear)
        #[arg(long, default_value = "")]
        from_step: String,
        /// Source part title
        #[arg(long, default_value = "")]
        from_section: String,
    },
}

impl TemplateCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            TemplateAction::List { json } => list(config, *json).await,
            TemplateAction::Show { name, json } => show(config, name, *json).await,
            TemplateAction::Create { name, from } => create(config, name, from).await,
            TemplateAction::Delete { name } => delete(config, name).await,
            TemplateAction::Discard => discard(config),
            TemplateAction::Check { name, json } => check(config, name, *json).await,
            TemplateAction::Edit(cmd) => cmd.execute(config).await,
            TemplateAction::Extract { file, json } => extract(config, file, *json).await,
            TemplateAction::Import {
                name,
                file,
                builtin,
            } => import(config, name, file, *builtin),
        }
    }
}

fn editor(config: &AppConfig) -> AppResult<TemplateEditor> {
    Ok(TemplateEditor::new(open_backend(config)?.storage))
}

fn working_copy(config: &AppConfig) -> WorkingCopyStore {
    WorkingCopyStore::new(config.working_copy_path())
}

/// Open `name`, failing if the catalogue does not have it.
///
/// Resumes the kept working copy when it belongs to `name`; otherwise
/// selects the stored template and starts a new working copy.
async fn open(config: &AppConfig, name: &str) -> AppResult<TemplateEditor> {
    let mut editor = editor(config)?;
    if !editor.refresh().await.iter().any(|t| t.name == name) {
        return Err(AppError::NotFound(format!("Template '{}'", name)));
    }

    let store = working_copy(config);
    match store.load(name) {
        Some(structure) => editor.resume(name, structure).await,
        None => editor.select_template(name).await,
    }
    keep(&store, &editor)?;
    Ok(editor)
}

/// Store the editor's working copy for the next command.
fn keep(store: &WorkingCopyStore, editor: &TemplateEditor) -> AppResult<()> {
    if let (Some(name), Some(structure)) = (editor.selected(), editor.structure()) {
        store.save(name, structure)?;
    }
    Ok(())
}

fn print_outline(name: &str, structure: &StepMap) -> AppResult<()> {
    print!("{}", render_outline(name, structure)?);
    Ok(())
}

async fn list(config: &AppConfig, json: bool) -> AppResult<()> {
    tracing::info!("Executing template list command");
    let mut editor = editor(config)?;
    let templates = editor.refresh().await;

    if json {
        let output: Vec<_> = templates
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "builtin": t.is_builtin(),
                    "steps": parse_structure(&t.data).map(|s| s.len()).unwrap_or(0),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if templates.is_empty() {
        println!("No templates found");
    } else {
        for template in templates {
            let marker = if template.is_builtin() { " (built-in)" } else { "" };
            println!("{}{}", template.name, marker);
        }
    }
    Ok(())
}

async fn show(config: &AppConfig, name: &str, json: bool) -> AppResult<()> {
    tracing::info!("Executing template show command for '{}'", name);
    let editor = open(config, name).await?;
    let structure = editor.structure().cloned().unwrap_or_default();

    if json {
        println!("{}", serde_json::to_string_pretty(&structure)?);
    } else {
        print_outline(name, &structure)?;
    }
    Ok(())
}

async fn create(config: &AppConfig, name: &str, from: &str) -> AppResult<()> {
    tracing::info!("Executing template create command: '{}' from '{}'", name, from);
    let mut editor = open(config, from).await?;
    editor.create_template(name).await?;

    // Further edits continue on the new template
    if let Some(structure) = editor.structure() {
        working_copy(config).save(name.trim(), structure)?;
    }
    println!("Created template '{}' from '{}'", name.trim(), from);
    Ok(())
}

async fn delete(config: &AppConfig, name: &str) -> AppResult<()> {
    tracing::info!("Executing template delete command for '{}'", name);
    let mut editor = editor(config)?;
    editor.delete_template(name).await?;

    let store = working_copy(config);
    if store.current().as_deref() == Some(name) {
        store.clear()?;
    }
    println!("Deleted template '{}'", name);
    Ok(())
}

fn discard(config: &AppConfig) -> AppResult<()> {
    let store = working_copy(config);
    match store.current() {
        Some(name) => {
            store.clear()?;
            println!("Discarded working copy of '{}'", name);
        }
        None => println!("No working copy"),
    }
    Ok(())
}

async fn check(config: &AppConfig, name: &str, json: bool) -> AppResult<()> {
    tracing::info!("Executing template check command for '{}'", name);
    let editor = open(config, name).await?;
    let warnings = editor.check_sources()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&warnings)?);
    } else if warnings.is_empty() {
        println!("All prompt sources resolve");
    } else {
        for warning in &warnings {
            println!("{}", warning);
        }
    }
    Ok(())
}

impl EditCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing template edit command for '{}'", self.name);
        let mut editor = open(config, &self.name).await?;

        let changed = match &self.op {
            EditOp::AddStep { after } => editor.add_step(after).await?,
            EditOp::DeleteStep { key } => editor.delete_step(key).await?,
            EditOp::RenameStep { key, new_key } => editor.rename_step(key, new_key).await?,
            EditOp::AddPart { step, after } => match editor.add_part(step, after).await? {
                Some(title) => {
                    println!("Added part '{}'", title);
                    true
                }
                None => false,
            },
            EditOp::DeletePart { step, title } => editor.delete_part(step, title).await?,
            EditOp::RenamePart {
                step,
                title,
                new_title,
            } => editor.rename_part(step, title, new_title).await?,
            EditOp::SetPrompt {
                step,
                title,
                content,
                file,
            } => {
                let content = match (content, file) {
                    (_, Some(path)) => std::fs::read_to_string(path)?,
                    (Some(text), None) => text.clone(),
                    (None, None) => String::new(),
                };
                editor.set_prompt_content(step, title, &content).await?
            }
            EditOp::SetSource {
                step,
                title,
                from_step,
                from_section,
            } => {
                editor
                    .set_prompt_source(step, title, PromptSource::new(from_step, from_section))
                    .await?
            }
        };

        if changed {
            keep(&working_copy(config), &editor)?;
        } else {
            println!("No changes");
        }
        if let Some(structure) = editor.structure() {
            print_outline(&self.name, structure)?;
        }
        for warning in editor.check_sources()? {
            tracing::warn!("Unresolved source: {}", warning);
        }
        Ok(())
    }
}

async fn extract(config: &AppConfig, file: &Path, json: bool) -> AppResult<()> {
    tracing::info!("Executing template extract command for {:?}", file);
    let extractor = open_backend(config)?.extractor.ok_or_else(|| {
        AppError::Config(format!(
            "Template extraction is not available with the {} backend",
            config.backend
        ))
    })?;

    let runner = ExtractionRunner::new(Duration::from_millis(config.poll_interval_ms));
    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler; never cancel
            std::future::pending::<()>().await;
        }
    };

    eprintln!("Extracting template from {:?} (Ctrl-C to cancel)...", file);
    let outcome = runner.run(extractor.as_ref(), file, cancel).await?;

    match (outcome.structure(), json) {
        (Some(structure), true) => println!("{}", serde_json::to_string_pretty(&structure)?),
        (Some(structure), false) => print_outline("Extracted template", &structure)?,
        (None, true) => println!("{}", serde_json::to_string_pretty(&outcome.result)?),
        (None, false) => println!(
            "{}",
            outcome.message().unwrap_or("Extraction finished")
        ),
    }
    Ok(())
}

fn import(config: &AppConfig, name: &str, file: &Path, builtin: bool) -> AppResult<()> {
    tracing::info!("Executing template import command for '{}'", name);
    if config.backend != "local" {
        return Err(AppError::Config(
            "Importing is only supported with the local backend".to_string(),
        ));
    }

    let data = std::fs::read_to_string(file)?;
    let structure = parse_structure(&data)?;
    let owner = if builtin { 0 } else { LOCAL_OWNER_ID };

    LocalStorage::new(config.templates_dir()).import(name, Some(owner), structure)?;
    println!("Imported template '{}'", name);
    Ok(())
}
