//! Panelforge: illustrated story generation pipeline
//!
//! Turns a short prompt into a multi-panel illustrated story by orchestrating a
//! story service and an image service. The orchestrator owns the generation
//! state, drives panel images strictly one at a time, and publishes snapshots
//! for a rendering layer to observe.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod panel;
pub mod sequencer;
pub mod service;
pub mod state;
pub mod story;

pub use error::{ApiError, ImageError, StoryError};
pub use orchestrator::{GenerationOrchestrator, GenerationOutcome, OrchestrationConfig};
pub use panel::Panel;
pub use sequencer::{PanelImageSequencer, SequenceObserver, SequenceOutcome};
pub use service::{ImageService, StoryService};
pub use state::{ErrorInfo, ErrorKind, GenerationPhase, StateSnapshot};
pub use story::StoryGenerator;
