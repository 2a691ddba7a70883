//! Panel data model and index-based merge utilities.

use serde::{Deserialize, Serialize};

/// One unit of a generated story.
///
/// `prompt_text` and `caption_text` are fixed at creation. `image_ref` starts
/// absent and may be set exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    prompt_text: String,
    caption_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_ref: Option<String>,
}

impl Panel {
    pub fn new(prompt_text: impl Into<String>, caption_text: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            caption_text: caption_text.into(),
            image_ref: None,
        }
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }

    pub fn caption_text(&self) -> &str {
        &self.caption_text
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn has_image(&self) -> bool {
        self.image_ref.is_some()
    }

    /// Attach the rendered image. Returns `false` and keeps the existing image
    /// if one was already attached.
    pub fn attach_image(&mut self, image_ref: impl Into<String>) -> bool {
        if self.image_ref.is_some() {
            return false;
        }
        self.image_ref = Some(image_ref.into());
        true
    }
}

/// Outcome of merging an image into a panel list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeResult {
    Merged,
    OutOfRange,
    AlreadySet,
}

/// Merge an image into `panels[index]` in place. Order, length and every other
/// field are left untouched.
pub fn merge_panel_image(panels: &mut [Panel], index: usize, image_ref: &str) -> MergeResult {
    match panels.get_mut(index) {
        None => MergeResult::OutOfRange,
        Some(panel) => {
            if panel.attach_image(image_ref) {
                MergeResult::Merged
            } else {
                MergeResult::AlreadySet
            }
        }
    }
}

/// Number of panels that already carry an image.
pub fn completed_count(panels: &[Panel]) -> usize {
    panels.iter().filter(|p| p.has_image()).count()
}
