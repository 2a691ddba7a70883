//! Generation orchestrator: owns the shared state, runs the story stage, hands
//! the panels to the image sequencer and publishes a snapshot after every
//! applied transition.
//!
//! `begin_generation` bumps the epoch synchronously. Work for older epochs is
//! never aborted; its results are discarded when they arrive because every
//! mutation is checked against the current epoch under the state lock.

use crate::config::PanelforgeConfig;
use crate::error::{ApiError, ImageError, StoryError};
use crate::sequencer::{PanelImageSequencer, SequenceObserver, SequenceOutcome};
use crate::service::{ImageService, RetryConfig, ServiceFactory, StoryService};
use crate::state::{OrchestrationState, StateSnapshot, Transition};
use crate::story::StoryGenerator;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Orchestration behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Also report a mid-sequence image failure through `last_error`
    #[serde(default)]
    pub surface_image_halt: bool,

    /// Prompt length ceiling enforced by the rendering layer
    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    /// Retry policy applied around each service call
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_max_prompt_chars() -> usize {
    50
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            surface_image_halt: false,
            max_prompt_chars: default_max_prompt_chars(),
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestrationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_prompt_chars == 0 {
            return Err("max_prompt_chars must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// How one epoch ended, from the point of view of the task that drove it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed { epoch: u64, panels: usize },
    Halted { epoch: u64, index: usize },
    Failed { epoch: u64, error: StoryError },
    /// A newer generation started; nothing from this epoch was applied after that.
    Superseded { epoch: u64 },
}

impl GenerationOutcome {
    pub fn epoch(&self) -> u64 {
        match self {
            GenerationOutcome::Completed { epoch, .. }
            | GenerationOutcome::Halted { epoch, .. }
            | GenerationOutcome::Failed { epoch, .. }
            | GenerationOutcome::Superseded { epoch } => *epoch,
        }
    }
}

/// State plus the snapshot channel, shared by the orchestrator and its observer.
struct SharedState {
    state: Mutex<OrchestrationState>,
    snapshots: watch::Sender<StateSnapshot>,
}

impl SharedState {
    /// Apply a transition under the lock and publish when it changed state.
    fn apply<F>(&self, transition: F) -> Transition
    where
        F: FnOnce(&mut OrchestrationState) -> Transition,
    {
        let mut state = self.state.lock();
        let outcome = transition(&mut state);
        if outcome.is_applied() {
            self.snapshots.send_replace(state.snapshot());
        }
        outcome
    }
}

/// Sequencer callbacks bound to the shared state.
struct EpochObserver<'a> {
    shared: &'a SharedState,
    surface_image_halt: bool,
}

impl SequenceObserver for EpochObserver<'_> {
    fn on_image_started(&self, epoch: u64, index: usize) -> Transition {
        self.shared.apply(|state| state.apply_image_started(epoch, index))
    }

    fn on_panel_updated(&self, epoch: u64, index: usize, image_ref: &str) -> Transition {
        self.shared.apply(|state| state.apply_panel_image(epoch, index, image_ref))
    }

    fn on_halt(&self, epoch: u64, index: usize, reason: &ImageError) -> Transition {
        let surface = self.surface_image_halt;
        self.shared.apply(|state| state.apply_halt(epoch, index, reason, surface))
    }
}

pub struct GenerationOrchestrator {
    generator: StoryGenerator,
    sequencer: PanelImageSequencer,
    shared: SharedState,
    settings: OrchestrationConfig,
}

impl GenerationOrchestrator {
    pub fn new(
        story_service: Arc<dyn StoryService>,
        image_service: Arc<dyn ImageService>,
        settings: OrchestrationConfig,
    ) -> Self {
        let state = OrchestrationState::new();
        let (snapshots, _) = watch::channel(state.snapshot());
        Self {
            generator: StoryGenerator::new(story_service),
            sequencer: PanelImageSequencer::new(image_service),
            shared: SharedState {
                state: Mutex::new(state),
                snapshots,
            },
            settings,
        }
    }

    /// Build an orchestrator wired to the configured HTTP services.
    pub fn from_config(config: &PanelforgeConfig) -> Result<Self, ApiError> {
        let retry = &config.orchestration.retry;
        let story = ServiceFactory::create_story_service(&config.services, retry)?;
        let image = ServiceFactory::create_image_service(&config.services, retry)?;
        Ok(Self::new(story, image, config.orchestration.clone()))
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.shared.state.lock().snapshot()
    }

    /// Receive a snapshot after every applied transition.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Reset the state for a new generation and return its epoch.
    pub fn begin_generation(&self, prompt_text: &str) -> u64 {
        let mut state = self.shared.state.lock();
        let epoch = state.reset(prompt_text);
        self.shared.snapshots.send_replace(state.snapshot());
        info!(epoch, "Generation started");
        epoch
    }

    /// Run the story stage and the image sequence for `epoch`.
    pub async fn drive_generation(&self, epoch: u64, prompt_text: &str) -> GenerationOutcome {
        let panels = match self.generator.generate_story(prompt_text).await {
            Ok(panels) => panels,
            Err(error) => {
                return match self
                    .shared
                    .apply(|state| state.apply_story_failed(epoch, &error))
                {
                    Transition::Applied => {
                        warn!(epoch, error = %error, "Story generation failed");
                        GenerationOutcome::Failed { epoch, error }
                    }
                    _ => self.superseded(epoch),
                };
            }
        };

        let transition = self
            .shared
            .apply(|state| state.apply_story_loaded(epoch, panels.clone()));
        if !transition.is_applied() {
            return self.superseded(epoch);
        }

        let observer = EpochObserver {
            shared: &self.shared,
            surface_image_halt: self.settings.surface_image_halt,
        };
        match self.sequencer.run(&panels, epoch, &observer).await {
            SequenceOutcome::Complete { completed } => {
                match self.shared.apply(|state| state.apply_complete(epoch)) {
                    Transition::Applied => {
                        info!(epoch, panels = completed, "Generation complete");
                        GenerationOutcome::Completed {
                            epoch,
                            panels: completed,
                        }
                    }
                    _ => self.superseded(epoch),
                }
            }
            SequenceOutcome::Halted { index, .. } => GenerationOutcome::Halted { epoch, index },
            SequenceOutcome::Abandoned { .. } => self.superseded(epoch),
        }
    }

    /// Begin a generation and drive it on the current task.
    pub async fn generate(&self, prompt_text: &str) -> GenerationOutcome {
        let epoch = self.begin_generation(prompt_text);
        self.drive_generation(epoch, prompt_text).await
    }

    /// Begin a generation now and drive it on a spawned task. Safe to call while
    /// an earlier generation is still running.
    ///
    /// Must be called from within a tokio runtime; `tokio::spawn` panics otherwise.
    pub fn start_generation(
        self: &Arc<Self>,
        prompt_text: impl Into<String>,
    ) -> JoinHandle<GenerationOutcome> {
        let prompt_text = prompt_text.into();
        let epoch = self.begin_generation(&prompt_text);
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.drive_generation(epoch, &prompt_text).await })
    }

    fn superseded(&self, epoch: u64) -> GenerationOutcome {
        debug!(epoch, "Discarding results of superseded generation");
        GenerationOutcome::Superseded { epoch }
    }
}
