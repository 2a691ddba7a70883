//! Config loader facade: assembles sources in precedence order and deserializes.

use super::merge::builder_with_defaults;
use super::sources::{environment, global_file, workspace_file};
use super::PanelforgeConfig;
use config::{ConfigError, File};
use std::path::Path;

/// Loads [`PanelforgeConfig`] from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (highest last): defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{PANELFORGE_ENV}.toml`,
    /// `PANELFORGE__*` environment variables.
    pub fn load(workspace_root: &Path) -> Result<PanelforgeConfig, ConfigError> {
        let builder = builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Load configuration from one explicit file. Environment overrides still apply.
    pub fn load_from_file(path: &Path) -> Result<PanelforgeConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Message(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let builder = builder_with_defaults()?.add_source(File::from(path));
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }
}
