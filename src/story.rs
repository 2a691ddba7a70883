//! Story generation: one request to the story service, validated into panels.

use crate::error::StoryError;
use crate::panel::Panel;
use crate::service::StoryService;
use std::sync::Arc;
use tracing::{debug, info};

pub struct StoryGenerator {
    service: Arc<dyn StoryService>,
}

impl StoryGenerator {
    pub fn new(service: Arc<dyn StoryService>) -> Self {
        Self { service }
    }

    /// Expand `prompt_text` into an ordered, non-empty panel list.
    ///
    /// Service order is preserved. Every panel starts without an image.
    pub async fn generate_story(&self, prompt_text: &str) -> Result<Vec<Panel>, StoryError> {
        if prompt_text.trim().is_empty() {
            return Err(StoryError::InvalidPrompt);
        }

        debug!(service = self.service.service_name(), "Issuing story request");
        let response = self.service.request_story(prompt_text).await?;

        let comics = match response.comics() {
            Some(comics) if !comics.is_empty() => comics,
            _ => return Err(StoryError::EmptyStory),
        };

        let panels: Vec<Panel> = comics
            .iter()
            .map(|entry| Panel::new(entry.prompt.clone(), entry.caption.clone()))
            .collect();
        info!(panel_count = panels.len(), "Story generated");
        Ok(panels)
    }
}
