//! Merge rules: defaults, override order, conflict handling.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override earlier ones key by key: defaults, global file,
/// workspace files, then environment.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default(
            "services.story_url",
            "http://localhost:3000/api/generate/prompt",
        )?
        .set_default(
            "services.image_url",
            "http://localhost:3000/api/generate/image-gen",
        )?
        .set_default("services.connect_timeout_secs", 10)?
        .set_default("services.request_timeout_secs", 120)?
        .set_default("orchestration.surface_image_halt", false)?
        .set_default("orchestration.max_prompt_chars", 50)?
        .set_default("orchestration.retry.max_retries", 0)?
        .set_default("orchestration.retry.retry_delay_ms", 1000)
}
