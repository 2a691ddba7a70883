//! Generation Service Clients
//!
//! Request/response boundary to the two external collaborators: the story service,
//! which expands a prompt into panel descriptions, and the image service, which
//! renders one image per panel prompt. Both speak JSON over HTTP POST. The traits
//! are the seam used by the generator and sequencer, so tests and decorators can
//! stand in for the HTTP clients.

use crate::error::{ApiError, ImageError, StoryError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub mod retry;

pub use retry::{RetryConfig, RetryingImageService, RetryingStoryService};

/// Request body shared by both services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptRequest {
    pub prompt: String,
}

/// One panel description as returned by the story service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComicEntry {
    pub prompt: String,
    pub caption: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryBody {
    #[serde(default)]
    pub comics: Option<Vec<ComicEntry>>,
}

/// Decoded story service response. `result` and `comics` are optional on the
/// wire; their absence means "no story", not a malformed body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryResponse {
    #[serde(default)]
    pub result: Option<StoryBody>,
}

impl StoryResponse {
    pub fn from_comics(comics: Vec<ComicEntry>) -> Self {
        Self {
            result: Some(StoryBody {
                comics: Some(comics),
            }),
        }
    }

    /// The comics list, if the service produced one.
    pub fn comics(&self) -> Option<&[ComicEntry]> {
        self.result.as_ref()?.comics.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ImageResponse {
    #[serde(rename = "imageUrl", default)]
    image_url: Option<String>,
}

/// Story service contract.
#[async_trait]
pub trait StoryService: Send + Sync {
    /// Issue one story request for `prompt`.
    async fn request_story(&self, prompt: &str) -> Result<StoryResponse, StoryError>;

    fn service_name(&self) -> &str;
}

/// Image service contract.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Render one image and return its reference (URL or data URI).
    async fn render_image(&self, prompt: &str) -> Result<String, ImageError>;

    fn service_name(&self) -> &str;
}

/// Endpoints and timeouts for both services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_story_url")]
    pub story_url: String,

    #[serde(default = "default_image_url")]
    pub image_url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

pub(crate) fn default_story_url() -> String {
    "http://localhost:3000/api/generate/prompt".to_string()
}

pub(crate) fn default_image_url() -> String {
    "http://localhost:3000/api/generate/image-gen".to_string()
}

pub(crate) fn default_connect_timeout_secs() -> u64 {
    10
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            story_url: default_story_url(),
            image_url: default_image_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServicesConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [("story_url", &self.story_url), ("image_url", &self.image_url)] {
            if url.trim().is_empty() {
                return Err(format!("{} cannot be empty", name));
            }
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("{} must be an http(s) URL, got '{}'", name, url));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Decode a story service body. Any JSON that fits the envelope decodes, even
/// without `result`; anything else is a service error.
pub fn decode_story_body(body: &str) -> Result<StoryResponse, StoryError> {
    serde_json::from_str(body)
        .map_err(|e| StoryError::Service(format!("Failed to parse story response: {}", e)))
}

/// Decode an image service body into the image reference.
pub fn decode_image_body(body: &str) -> Result<String, ImageError> {
    let parsed: ImageResponse = serde_json::from_str(body)
        .map_err(|e| ImageError::Malformed(format!("Failed to parse image response: {}", e)))?;
    match parsed.image_url {
        Some(url) if !url.trim().is_empty() => Ok(url),
        _ => Err(ImageError::MissingImageUrl),
    }
}

fn describe_http_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("Request timeout: {}", error)
    } else if error.is_connect() {
        format!("Connection error: {}", error)
    } else {
        format!("HTTP error: {}", error)
    }
}

fn build_http_client(config: &ServicesConfig) -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ApiError::ClientError(format!("Failed to create HTTP client: {}", e)))
}

/// POST `prompt` to `url` and return status plus raw body text.
async fn post_prompt(
    client: &Client,
    url: &str,
    prompt: &str,
) -> Result<(reqwest::StatusCode, String), reqwest::Error> {
    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(&PromptRequest {
            prompt: prompt.to_string(),
        })
        .send()
        .await?;
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

/// HTTP client for the story service.
pub struct HttpStoryService {
    client: Client,
    url: String,
}

impl HttpStoryService {
    pub fn new(config: &ServicesConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_http_client(config)?,
            url: config.story_url.clone(),
        })
    }
}

#[async_trait]
impl StoryService for HttpStoryService {
    async fn request_story(&self, prompt: &str) -> Result<StoryResponse, StoryError> {
        debug!(url = %self.url, "Requesting story");
        let (status, body) = post_prompt(&self.client, &self.url, prompt)
            .await
            .map_err(|e| StoryError::Service(describe_http_error(&e)))?;

        if !status.is_success() {
            return Err(StoryError::Service(format!(
                "Story request failed with status {}: {}",
                status, body
            )));
        }

        decode_story_body(&body)
    }

    fn service_name(&self) -> &str {
        "http-story"
    }
}

/// HTTP client for the image service.
pub struct HttpImageService {
    client: Client,
    url: String,
}

impl HttpImageService {
    pub fn new(config: &ServicesConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_http_client(config)?,
            url: config.image_url.clone(),
        })
    }
}

#[async_trait]
impl ImageService for HttpImageService {
    async fn render_image(&self, prompt: &str) -> Result<String, ImageError> {
        debug!(url = %self.url, "Requesting panel image");
        let (status, body) = post_prompt(&self.client, &self.url, prompt)
            .await
            .map_err(|e| ImageError::RequestFailed(describe_http_error(&e)))?;

        if !status.is_success() {
            return Err(ImageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        decode_image_body(&body)
    }

    fn service_name(&self) -> &str {
        "http-image"
    }
}

/// Builds the configured service pair, wrapping each in a retry decorator when
/// retries are enabled.
pub struct ServiceFactory;

impl ServiceFactory {
    pub fn create_story_service(
        config: &ServicesConfig,
        retry: &RetryConfig,
    ) -> Result<Arc<dyn StoryService>, ApiError> {
        let http = HttpStoryService::new(config)?;
        if retry.is_enabled() {
            Ok(Arc::new(RetryingStoryService::new(http, retry.clone())))
        } else {
            Ok(Arc::new(http))
        }
    }

    pub fn create_image_service(
        config: &ServicesConfig,
        retry: &RetryConfig,
    ) -> Result<Arc<dyn ImageService>, ApiError> {
        let http = HttpImageService::new(config)?;
        if retry.is_enabled() {
            Ok(Arc::new(RetryingImageService::new(http, retry.clone())))
        } else {
            Ok(Arc::new(http))
        }
    }
}
