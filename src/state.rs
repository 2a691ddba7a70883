//! Orchestration state store.
//!
//! All mutation of the shared generation state goes through the transition
//! functions below. Every transition except `reset` carries the epoch it was
//! produced for; a transition for any other epoch is reported as
//! [`Transition::Stale`] and leaves the state untouched.

use crate::error::{ImageError, StoryError};
use crate::panel::{completed_count, merge_panel_image, MergeResult, Panel};
use serde::{Deserialize, Serialize};

/// Per-epoch state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "index", rename_all = "snake_case")]
pub enum GenerationPhase {
    Idle,
    StoryLoading,
    Failed,
    PanelsReady,
    ImageLoading(usize),
    Complete,
    Halted(usize),
}

impl GenerationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GenerationPhase::Failed | GenerationPhase::Complete | GenerationPhase::Halted(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPrompt,
    EmptyStory,
    StoryService,
    ImageHalt,
}

/// User-facing error attached to the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&StoryError> for ErrorInfo {
    fn from(err: &StoryError) -> Self {
        let (kind, message) = match err {
            StoryError::InvalidPrompt => (
                ErrorKind::InvalidPrompt,
                "Please enter a prompt before generating a story.".to_string(),
            ),
            StoryError::EmptyStory => (
                ErrorKind::EmptyStory,
                "Sorry, no story could be generated for this prompt. Please try a different prompt."
                    .to_string(),
            ),
            StoryError::Service(_) => (
                ErrorKind::StoryService,
                "An error occurred while generating the story. Please try again.".to_string(),
            ),
        };
        Self { kind, message }
    }
}

impl ErrorInfo {
    pub fn image_halt(index: usize, reason: &ImageError) -> Self {
        Self {
            kind: ErrorKind::ImageHalt,
            message: format!("Image generation stopped at panel {}: {}", index + 1, reason),
        }
    }
}

/// Result of applying a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// The transition belongs to a superseded epoch and was discarded.
    Stale,
    /// The transition does not fit the current phase or panel list.
    Rejected,
}

impl Transition {
    pub fn is_applied(self) -> bool {
        self == Transition::Applied
    }
}

/// Read-only view handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub generation_epoch: u64,
    pub phase: GenerationPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub panels: Vec<Panel>,
    pub is_busy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<usize>,
}

impl StateSnapshot {
    pub fn completed_panels(&self) -> usize {
        completed_count(&self.panels)
    }
}

#[derive(Debug, Clone)]
pub struct OrchestrationState {
    panels: Vec<Panel>,
    is_busy: bool,
    last_error: Option<ErrorInfo>,
    generation_epoch: u64,
    phase: GenerationPhase,
    prompt: Option<String>,
    halted_at: Option<usize>,
}

impl Default for OrchestrationState {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestrationState {
    pub fn new() -> Self {
        Self {
            panels: Vec::new(),
            is_busy: false,
            last_error: None,
            generation_epoch: 0,
            phase: GenerationPhase::Idle,
            prompt: None,
            halted_at: None,
        }
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.generation_epoch == epoch
    }

    pub fn is_busy(&self) -> bool {
        self.is_busy
    }

    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// Start a new epoch and return it. Clears panels and errors of the previous one.
    pub fn reset(&mut self, prompt: impl Into<String>) -> u64 {
        self.generation_epoch += 1;
        self.panels.clear();
        self.last_error = None;
        self.halted_at = None;
        self.is_busy = true;
        self.phase = GenerationPhase::StoryLoading;
        self.prompt = Some(prompt.into());
        self.generation_epoch
    }

    pub fn apply_story_loaded(&mut self, epoch: u64, panels: Vec<Panel>) -> Transition {
        if !self.is_current(epoch) {
            return Transition::Stale;
        }
        if self.phase != GenerationPhase::StoryLoading || panels.is_empty() {
            return Transition::Rejected;
        }
        self.panels = panels;
        self.phase = GenerationPhase::PanelsReady;
        Transition::Applied
    }

    pub fn apply_story_failed(&mut self, epoch: u64, err: &StoryError) -> Transition {
        if !self.is_current(epoch) {
            return Transition::Stale;
        }
        if self.phase != GenerationPhase::StoryLoading {
            return Transition::Rejected;
        }
        self.panels.clear();
        self.last_error = Some(ErrorInfo::from(err));
        self.is_busy = false;
        self.phase = GenerationPhase::Failed;
        Transition::Applied
    }

    pub fn apply_image_started(&mut self, epoch: u64, index: usize) -> Transition {
        if !self.is_current(epoch) {
            return Transition::Stale;
        }
        let expected = match self.phase {
            GenerationPhase::PanelsReady => 0,
            GenerationPhase::ImageLoading(previous) => previous + 1,
            _ => return Transition::Rejected,
        };
        if index != expected || index >= self.panels.len() {
            return Transition::Rejected;
        }
        self.phase = GenerationPhase::ImageLoading(index);
        Transition::Applied
    }

    pub fn apply_panel_image(&mut self, epoch: u64, index: usize, image_ref: &str) -> Transition {
        if !self.is_current(epoch) {
            return Transition::Stale;
        }
        if self.phase != GenerationPhase::ImageLoading(index) {
            return Transition::Rejected;
        }
        match merge_panel_image(&mut self.panels, index, image_ref) {
            MergeResult::Merged => Transition::Applied,
            MergeResult::OutOfRange | MergeResult::AlreadySet => Transition::Rejected,
        }
    }

    /// Stop the sequence at `index`. With `surface` the halt also becomes the
    /// user-visible `last_error`.
    pub fn apply_halt(
        &mut self,
        epoch: u64,
        index: usize,
        reason: &ImageError,
        surface: bool,
    ) -> Transition {
        if !self.is_current(epoch) {
            return Transition::Stale;
        }
        if self.phase.is_terminal() || !self.is_busy {
            return Transition::Rejected;
        }
        self.is_busy = false;
        self.halted_at = Some(index);
        self.phase = GenerationPhase::Halted(index);
        if surface {
            self.last_error = Some(ErrorInfo::image_halt(index, reason));
        }
        Transition::Applied
    }

    pub fn apply_complete(&mut self, epoch: u64) -> Transition {
        if !self.is_current(epoch) {
            return Transition::Stale;
        }
        if self.phase.is_terminal() || !self.is_busy {
            return Transition::Rejected;
        }
        self.is_busy = false;
        self.phase = GenerationPhase::Complete;
        Transition::Applied
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            generation_epoch: self.generation_epoch,
            phase: self.phase,
            prompt: self.prompt.clone(),
            panels: self.panels.clone(),
            is_busy: self.is_busy,
            last_error: self.last_error.clone(),
            halted_at: self.halted_at,
        }
    }
}
