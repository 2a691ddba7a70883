//! Panel image sequencer: one image request at a time, in panel order.
//!
//! The loop walks an index cursor from 0 to n-1. Every observer callback carries
//! the epoch; once one reports [`Transition::Stale`] the sequence stops without
//! touching state.

use crate::error::ImageError;
use crate::panel::Panel;
use crate::service::ImageService;
use crate::state::Transition;
use std::sync::Arc;
use tracing::{debug, warn};

/// Receiver of sequencer progress. Implementations own the shared state and
/// must re-check `epoch` atomically with any mutation.
pub trait SequenceObserver: Send + Sync {
    /// Called right before the request for `index` is issued.
    fn on_image_started(&self, epoch: u64, index: usize) -> Transition;

    /// Called with the image for `index`; fully applied before the next request.
    fn on_panel_updated(&self, epoch: u64, index: usize, image_ref: &str) -> Transition;

    /// Called once when the sequence stops on a failed request.
    fn on_halt(&self, epoch: u64, index: usize, reason: &ImageError) -> Transition;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// Every panel was processed.
    Complete { completed: usize },
    /// The request for `index` failed; later panels were not attempted.
    Halted { index: usize, reason: ImageError },
    /// The epoch was superseded before `index` could be applied.
    Abandoned { index: usize },
}

pub struct PanelImageSequencer {
    service: Arc<dyn ImageService>,
}

impl PanelImageSequencer {
    pub fn new(service: Arc<dyn ImageService>) -> Self {
        Self { service }
    }

    pub async fn run<O>(&self, panels: &[Panel], epoch: u64, observer: &O) -> SequenceOutcome
    where
        O: SequenceObserver + ?Sized,
    {
        let mut completed = 0usize;

        for (index, panel) in panels.iter().enumerate() {
            if observer.on_image_started(epoch, index) == Transition::Stale {
                debug!(epoch, index, "Epoch superseded, abandoning image sequence");
                return SequenceOutcome::Abandoned { index };
            }

            debug!(epoch, index, "Requesting panel image");
            match self.service.render_image(panel.prompt_text()).await {
                Ok(image_ref) => match observer.on_panel_updated(epoch, index, &image_ref) {
                    Transition::Applied => completed += 1,
                    Transition::Stale => {
                        debug!(epoch, index, "Discarding image for superseded epoch");
                        return SequenceOutcome::Abandoned { index };
                    }
                    Transition::Rejected => {
                        warn!(epoch, index, "Panel image was not applied");
                    }
                },
                Err(reason) => {
                    if observer.on_halt(epoch, index, &reason) == Transition::Stale {
                        debug!(epoch, index, "Discarding image failure for superseded epoch");
                        return SequenceOutcome::Abandoned { index };
                    }
                    warn!(
                        epoch,
                        index,
                        service = self.service.service_name(),
                        error = %reason,
                        "Image generation halted"
                    );
                    return SequenceOutcome::Halted { index, reason };
                }
            }
        }

        SequenceOutcome::Complete { completed }
    }
}
