//! Retry decorators for the story and image service contracts.
//!
//! Retrying lives here, around a single call, so the sequencer keeps its
//! one-request-per-panel shape. Only transient failures are retried.

use crate::error::{ImageError, StoryError};
use crate::service::{ImageService, StoryResponse, StoryService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Retry settings. `max_retries = 0` disables retrying entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Additional attempts after the first failure
    #[serde(default)]
    pub max_retries: usize,

    /// Delay between attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    fn delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

pub struct RetryingStoryService<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: StoryService> RetryingStoryService<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<S: StoryService> StoryService for RetryingStoryService<S> {
    async fn request_story(&self, prompt: &str) -> Result<StoryResponse, StoryError> {
        let mut attempt = 0usize;
        loop {
            match self.inner.request_story(prompt).await {
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        service = self.inner.service_name(),
                        attempt,
                        error = %err,
                        "Story request failed, retrying"
                    );
                    sleep(self.config.delay()).await;
                }
                other => return other,
            }
        }
    }

    fn service_name(&self) -> &str {
        self.inner.service_name()
    }
}

pub struct RetryingImageService<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: ImageService> RetryingImageService<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<S: ImageService> ImageService for RetryingImageService<S> {
    async fn render_image(&self, prompt: &str) -> Result<String, ImageError> {
        let mut attempt = 0usize;
        loop {
            match self.inner.render_image(prompt).await {
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        service = self.inner.service_name(),
                        attempt,
                        error = %err,
                        "Image request failed, retrying"
                    );
                    sleep(self.config.delay()).await;
                }
                other => return other,
            }
        }
    }

    fn service_name(&self) -> &str {
        self.inner.service_name()
    }
}
