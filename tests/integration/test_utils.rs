//! Shared test utilities for integration tests
//!
//! Scriptable story and image services. Responses are keyed by prompt and can be
//! held behind a gate (`tokio::sync::Notify`) so a test controls exactly when a
//! request resolves.

use async_trait::async_trait;
use panelforge::service::{ComicEntry, StoryResponse};
use panelforge::{ImageError, ImageService, StateSnapshot, StoryError, StoryService};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// Panel prompt produced by [`MockStoryService::with_panels`].
pub fn panel_prompt(story_prompt: &str, index: usize) -> String {
    format!("{story_prompt} #{index}")
}

/// Image reference produced by [`MockImageService`] for a panel prompt.
pub fn image_url(panel_prompt: &str) -> String {
    format!(
        "https://images.test/{}.png",
        panel_prompt.replace(' ', "-").replace('#', "")
    )
}

#[derive(Clone)]
struct Scripted<T> {
    response: T,
    gate: Option<Arc<Notify>>,
}

pub struct MockStoryService {
    scripts: Mutex<HashMap<String, Scripted<Result<StoryResponse, StoryError>>>>,
    requests: Mutex<Vec<String>>,
}

impl MockStoryService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Answer `prompt` with `count` panels named by [`panel_prompt`].
    pub fn with_panels(&self, prompt: &str, count: usize) {
        let comics = (0..count)
            .map(|i| ComicEntry {
                prompt: panel_prompt(prompt, i),
                caption: format!("{prompt} caption {i}"),
            })
            .collect();
        self.with_response(prompt, Ok(StoryResponse::from_comics(comics)));
    }

    pub fn with_response(&self, prompt: &str, response: Result<StoryResponse, StoryError>) {
        self.scripts.lock().insert(
            prompt.to_string(),
            Scripted {
                response,
                gate: None,
            },
        );
    }

    /// Hold the response for `prompt` until the returned gate is notified.
    pub fn gate(&self, prompt: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        if let Some(script) = self.scripts.lock().get_mut(prompt) {
            script.gate = Some(gate.clone());
        }
        gate
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl StoryService for MockStoryService {
    async fn request_story(&self, prompt: &str) -> Result<StoryResponse, StoryError> {
        self.requests.lock().push(prompt.to_string());
        let script = self.scripts.lock().get(prompt).cloned();
        let Some(script) = script else {
            return Err(StoryError::Service(format!("unscripted prompt '{prompt}'")));
        };
        if let Some(gate) = script.gate {
            gate.notified().await;
        }
        script.response
    }

    fn service_name(&self) -> &str {
        "mock-story"
    }
}

/// One image request as seen by the image service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRequest {
    pub prompt: String,
    /// Panels already carrying an image in the observed state when the request
    /// was issued.
    pub completed_at_issue: Option<usize>,
}

pub struct MockImageService {
    failures: Mutex<HashMap<String, ImageError>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    issued: Mutex<Vec<IssuedRequest>>,
    observed: Mutex<Option<watch::Receiver<StateSnapshot>>>,
}

impl MockImageService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            issued: Mutex::new(Vec::new()),
            observed: Mutex::new(None),
        })
    }

    pub fn fail(&self, panel_prompt: &str, error: ImageError) {
        self.failures.lock().insert(panel_prompt.to_string(), error);
    }

    pub fn gate(&self, panel_prompt: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .insert(panel_prompt.to_string(), gate.clone());
        gate
    }

    /// Record the orchestrator's published state alongside every request.
    pub fn observe(&self, receiver: watch::Receiver<StateSnapshot>) {
        *self.observed.lock() = Some(receiver);
    }

    pub fn issued(&self) -> Vec<IssuedRequest> {
        self.issued.lock().clone()
    }

    pub fn issued_prompts(&self) -> Vec<String> {
        self.issued.lock().iter().map(|r| r.prompt.clone()).collect()
    }

    /// Wait until a request for `panel_prompt` has been issued.
    pub async fn wait_for_request(&self, panel_prompt: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.issued.lock().iter().any(|r| r.prompt == panel_prompt) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("image request was never issued");
    }
}

#[async_trait]
impl ImageService for MockImageService {
    async fn render_image(&self, prompt: &str) -> Result<String, ImageError> {
        let completed_at_issue = self
            .observed
            .lock()
            .as_ref()
            .map(|rx| rx.borrow().completed_panels());
        self.issued.lock().push(IssuedRequest {
            prompt: prompt.to_string(),
            completed_at_issue,
        });

        let gate = self.gates.lock().get(prompt).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        match self.failures.lock().get(prompt) {
            Some(error) => Err(error.clone()),
            None => Ok(image_url(prompt)),
        }
    }

    fn service_name(&self) -> &str {
        "mock-image"
    }
}
