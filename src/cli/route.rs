//! CLI route: run context and command dispatch.

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_config, format_panel_table, format_progress_line, format_snapshot_json,
};
use crate::config::{ConfigLoader, PanelforgeConfig};
use crate::error::ApiError;
use crate::orchestrator::{GenerationOrchestrator, GenerationOutcome};
use crate::state::StateSnapshot;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Runtime context for CLI execution: the resolved configuration.
pub struct RunContext {
    config: PanelforgeConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match config_path {
            Some(ref cfg_path) => ConfigLoader::load_from_file(cfg_path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        Ok(Self::with_config(config.validated()?))
    }

    pub fn with_config(config: PanelforgeConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Generate { prompt, format } => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .enable_all()
                    .build()?;
                runtime.block_on(self.handle_generate(prompt, format))
            }
            Commands::Config { format } => format_config(&self.config, format),
        }
    }

    async fn handle_generate(&self, prompt: &str, format: &str) -> Result<String, ApiError> {
        if format != "text" && format != "json" {
            return Err(ApiError::InvalidInput(format!(
                "Unknown output format '{}' (expected text or json)",
                format
            )));
        }
        self.check_prompt(prompt)?;

        let orchestrator = Arc::new(GenerationOrchestrator::from_config(&self.config)?);
        let mut snapshots = orchestrator.subscribe();
        let mut handle = orchestrator.start_generation(prompt);
        let show_progress = format == "text";

        let outcome = loop {
            tokio::select! {
                joined = &mut handle => {
                    break joined.map_err(|e| ApiError::TaskFailed(e.to_string()))?;
                }
                changed = snapshots.changed() => {
                    if changed.is_ok() && show_progress {
                        let snapshot = snapshots.borrow_and_update().clone();
                        eprintln!("{}", format_progress_line(&snapshot));
                    }
                }
            }
        };
        match outcome {
            GenerationOutcome::Halted { epoch, index } => {
                info!(epoch, index, "Generation halted before all panels were drawn");
            }
            ref other => info!(epoch = other.epoch(), "Generation finished"),
        }

        let snapshot = orchestrator.snapshot();
        let rendered = if show_progress {
            format_panel_table(&snapshot)
        } else {
            format_snapshot_json(&snapshot)?
        };
        finish(&snapshot, rendered)
    }

    /// Presentation-layer prompt ceiling.
    fn check_prompt(&self, prompt: &str) -> Result<(), ApiError> {
        let max = self.config.orchestration.max_prompt_chars;
        let length = prompt.chars().count();
        if length > max {
            return Err(ApiError::InvalidInput(format!(
                "Prompt is {} characters; the limit is {}",
                length, max
            )));
        }
        Ok(())
    }
}

/// Turn the final state into CLI output: the rendering on success, the
/// user-facing message when `last_error` is set.
fn finish(snapshot: &StateSnapshot, rendered: String) -> Result<String, ApiError> {
    if let Some(error) = &snapshot.last_error {
        if !snapshot.panels.is_empty() {
            eprintln!("{}", rendered);
        }
        return Err(ApiError::GenerationFailed(error.message.clone()));
    }
    Ok(rendered)
}
