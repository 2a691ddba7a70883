//! CLI presentation: progress lines, panel tables and machine-readable output.

use crate::config::PanelforgeConfig;
use crate::error::ApiError;
use crate::state::{GenerationPhase, StateSnapshot};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// One status line per published snapshot.
pub fn format_progress_line(snapshot: &StateSnapshot) -> String {
    let total = snapshot.panels.len();
    let done = snapshot.completed_panels();
    match snapshot.phase {
        GenerationPhase::Idle => "Idle".dimmed().to_string(),
        GenerationPhase::StoryLoading => format!("{} writing story...", "⋯".cyan()),
        GenerationPhase::PanelsReady => {
            format!("{} story ready: {} panel(s)", "✓".green(), total)
        }
        GenerationPhase::ImageLoading(index) => format!(
            "{} drawing panel {}/{} ({} done)",
            "⋯".cyan(),
            index + 1,
            total,
            done
        ),
        GenerationPhase::Complete => {
            format!("{} all {} panel(s) drawn", "✓".green(), total)
        }
        GenerationPhase::Halted(index) => format!(
            "{} image generation stopped at panel {}/{}",
            "!".yellow(),
            index + 1,
            total
        ),
        GenerationPhase::Failed => {
            let message = snapshot
                .last_error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("story generation failed");
            format!("{} {}", "✗".red(), message)
        }
    }
}

/// Panel table: index, caption and image reference (or pending marker).
pub fn format_panel_table(snapshot: &StateSnapshot) -> String {
    if snapshot.panels.is_empty() {
        return "No panels.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Caption", "Image"]);
    for (index, panel) in snapshot.panels.iter().enumerate() {
        let image = match (panel.image_ref(), snapshot.halted_at) {
            (Some(image_ref), _) => image_ref.to_string(),
            (None, Some(halted)) if index >= halted => "(not generated)".to_string(),
            (None, _) => "(pending)".to_string(),
        };
        table.add_row(vec![
            (index + 1).to_string(),
            panel.caption_text().to_string(),
            image,
        ]);
    }
    table.to_string()
}

pub fn format_snapshot_json(snapshot: &StateSnapshot) -> Result<String, ApiError> {
    serde_json::to_string_pretty(snapshot)
        .map_err(|e| ApiError::ConfigError(format!("Failed to serialize snapshot: {}", e)))
}

/// Effective configuration as `toml` or `json`.
pub fn format_config(config: &PanelforgeConfig, format: &str) -> Result<String, ApiError> {
    match format {
        "toml" => toml::to_string_pretty(config)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
        "json" => serde_json::to_string_pretty(config)
            .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
        other => Err(ApiError::InvalidInput(format!(
            "Unknown config format '{}' (expected toml or json)",
            other
        ))),
    }
}
